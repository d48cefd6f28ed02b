use std::sync::mpsc;
use std::time::{Duration, Instant};
use voxelspace_common::{PlayerId, SessionId};

use crate::message::{BlockChange, GameEvent};

#[derive(Debug, thiserror::Error)]
#[error("peer is gone")]
pub struct Disconnected;

/// The write half of a connection. Framing and the socket itself belong to
/// the host.
pub trait Outbound {
    fn send_text(&mut self, text: String) -> Result<(), Disconnected>;
}

impl Outbound for mpsc::Sender<String> {
    fn send_text(&mut self, text: String) -> Result<(), Disconnected> {
        self.send(text).map_err(|_| Disconnected)
    }
}

/// Per-connection state.
#[derive(Debug)]
pub struct Session<O> {
    id: SessionId,
    outbound: O,
    player: Option<PlayerId>,
    last_update: Option<Instant>,
    pending_blocks: Vec<BlockChange>,
    pending_events: Vec<GameEvent>,
    closed: bool,
}

impl<O: Outbound> Session<O> {
    pub fn new(id: SessionId, outbound: O) -> Self {
        Self {
            id,
            outbound,
            player: None,
            last_update: None,
            pending_blocks: Vec::new(),
            pending_events: Vec::new(),
            closed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn player(&self) -> Option<&PlayerId> {
        self.player.as_ref()
    }

    pub fn is_joined(&self) -> bool {
        self.player.is_some()
    }

    pub(crate) fn bind(&mut self, player: PlayerId) {
        self.player = Some(player);
    }

    pub(crate) fn unbind(&mut self) -> Option<PlayerId> {
        self.player.take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queue one encoded message. A failed send closes the session; the hub
    /// prunes closed sessions.
    pub fn send(&mut self, text: String) {
        if self.closed {
            return;
        }
        if self.outbound.send_text(text).is_err() {
            tracing::debug!(session = %self.id, "outbound closed");
            self.closed = true;
        }
    }

    pub(crate) fn queue(&mut self, blocks: &[BlockChange], events: &[GameEvent]) {
        self.pending_blocks.extend_from_slice(blocks);
        self.pending_events.extend_from_slice(events);
    }

    pub(crate) fn take_pending(&mut self) -> (Vec<BlockChange>, Vec<GameEvent>) {
        (
            std::mem::take(&mut self.pending_blocks),
            std::mem::take(&mut self.pending_events),
        )
    }

    pub(crate) fn due_for_update(&self, now: Instant, interval: Duration) -> bool {
        self.last_update
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    pub(crate) fn mark_updated(&mut self, now: Instant) {
        self.last_update = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_send_closes_the_session() {
        let (tx, rx) = mpsc::channel();
        let mut session = Session::new(SessionId(1), tx);
        session.send("hello".into());
        assert_eq!(rx.try_recv().ok().as_deref(), Some("hello"));
        drop(rx);
        session.send("lost".into());
        assert!(session.is_closed());
    }

    #[test]
    fn updates_are_rate_limited() {
        let (tx, _rx) = mpsc::channel();
        let mut session = Session::new(SessionId(2), tx);
        let t0 = Instant::now();
        let interval = Duration::from_millis(50);
        assert!(session.due_for_update(t0, interval));
        session.mark_updated(t0);
        assert!(!session.due_for_update(t0 + Duration::from_millis(49), interval));
        assert!(session.due_for_update(t0 + Duration::from_millis(50), interval));
    }
}
