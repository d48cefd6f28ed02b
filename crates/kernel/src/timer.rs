use std::time::Duration;

/// Rolling window of step durations.
#[derive(Debug, Clone)]
pub struct TickTimer {
    samples: Vec<Duration>,
    next: usize,
    wrapped: bool,
}

impl TickTimer {
    pub fn new(window: usize) -> Self {
        Self {
            samples: vec![Duration::ZERO; window.max(1)],
            next: 0,
            wrapped: false,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.samples[self.next] = elapsed;
        self.next = (self.next + 1) % self.samples.len();
        if self.next == 0 {
            self.wrapped = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        if self.wrapped {
            &self.samples
        } else {
            &self.samples[..self.next]
        }
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    pub fn average(&self) -> Duration {
        let recorded = self.recorded();
        if recorded.is_empty() {
            return Duration::ZERO;
        }
        recorded.iter().sum::<Duration>() / recorded.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or_default()
    }

    pub fn min(&self) -> Duration {
        self.recorded().iter().copied().min().unwrap_or_default()
    }

    /// True when the average step takes longer than `budget`.
    pub fn is_over(&self, budget: Duration) -> bool {
        self.average() > budget
    }
}
