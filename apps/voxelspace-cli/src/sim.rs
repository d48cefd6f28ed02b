//! Scripted clients that drive a hub without a network.

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

use voxelspace_common::block::STONE;
use voxelspace_common::{Body, IVec3, PlayerId, SessionId, Vec3, block_of};
use voxelspace_kernel::{ChunkStorage, WorldError};
use voxelspace_net::{ClientMessage, Hub};

const ORBIT_RADIUS: f32 = 6.0;
const ORBIT_HEIGHT: f32 = 80.0;

struct Bot {
    session: SessionId,
    inbox: Receiver<String>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub collisions: usize,
    pub generated: usize,
    pub flushed: usize,
    pub flush_failures: usize,
    pub updates_sent: usize,
    /// Messages received by all bots, keyed by `type`.
    pub received: BTreeMap<String, usize>,
}

pub struct Simulation<S: ChunkStorage> {
    pub hub: Hub<S, Sender<String>>,
    bots: Vec<Bot>,
    clock: Instant,
}

impl<S: ChunkStorage> Simulation<S> {
    pub fn new(hub: Hub<S, Sender<String>>) -> Self {
        Self {
            hub,
            bots: Vec::new(),
            clock: Instant::now(),
        }
    }

    /// Connect and join `count` bots named `bot-0`, `bot-1`, ...
    pub async fn add_bots(&mut self, count: usize) {
        for i in 0..count {
            let (tx, rx) = mpsc::channel();
            let session = self.hub.connect(tx);
            let join = ClientMessage::Join {
                player_id: Some(PlayerId(format!("bot-{i}"))),
            };
            self.hub.handle(session, join).await;
            self.bots.push(Bot { session, inbox: rx });
        }
    }

    pub fn spawn_drones(&mut self, count: usize) -> Result<(), WorldError> {
        let spawn = self.hub.config().spawn_point;
        for i in 0..count {
            let offset = Vec3::new(i as f32 * 2.0, 20.0, 0.0);
            self.hub
                .world_mut()
                .spawn("drone", Body::at(spawn + offset, Vec3::ONE))?;
        }
        Ok(())
    }

    /// Advance `ticks` ticks on a simulated clock so update rate limiting
    /// behaves as it would in real time.
    pub async fn run(&mut self, ticks: u64) -> RunSummary {
        let interval = self.hub.world().settings().tick_interval();
        let mut summary = RunSummary::default();
        for _ in 0..ticks {
            let tick = self.hub.world().tick();
            self.script(tick).await;

            self.clock += interval;
            let report = self.hub.tick(self.clock).await;
            summary.ticks += 1;
            summary.collisions += report.step.collisions;
            summary.generated += report.step.generated + report.settle.generated;
            summary.flushed += report.settle.flush.saved;
            summary.flush_failures += report.settle.flush.failed;
            summary.updates_sent += report.updates_sent;
            self.collect(&mut summary.received);
        }
        summary
    }

    async fn script(&mut self, tick: u64) {
        let count = self.bots.len().max(1) as f32;
        let spawn = self.hub.config().spawn_point;
        let sessions: Vec<SessionId> = self.bots.iter().map(|b| b.session).collect();
        for (i, session) in sessions.into_iter().enumerate() {
            let angle = tick as f32 * 0.1 + i as f32 * TAU / count;
            let position = Vec3::new(
                spawn.x + ORBIT_RADIUS * angle.cos(),
                ORBIT_HEIGHT,
                spawn.z + ORBIT_RADIUS * angle.sin(),
            );
            let moved = ClientMessage::Move {
                position,
                rotation: Vec3::new(0.0, angle, 0.0),
                velocity: Vec3::ZERO,
            };
            self.hub.handle(session, moved).await;

            let below = block_of(position) - IVec3::new(0, 2, 0);
            let edit = match tick % 40 {
                0 => Some(ClientMessage::PlaceBlock {
                    x: below.x,
                    y: below.y,
                    z: below.z,
                    block_type: i64::from(STONE),
                }),
                20 => Some(ClientMessage::BreakBlock {
                    x: below.x,
                    y: below.y,
                    z: below.z,
                }),
                _ => None,
            };
            if let Some(edit) = edit {
                self.hub.handle(session, edit).await;
            }
            if tick % 100 == 0 && i == 0 {
                let chat = ClientMessage::Chat {
                    message: format!("tick {tick}"),
                };
                self.hub.handle(session, chat).await;
            }
        }
    }

    fn collect(&self, received: &mut BTreeMap<String, usize>) {
        for bot in &self.bots {
            for text in bot.inbox.try_iter() {
                let kind = serde_json::from_str::<serde_json::Value>(&text)
                    .ok()
                    .and_then(|v| v["type"].as_str().map(str::to_owned))
                    .unwrap_or_else(|| "unreadable".to_owned());
                *received.entry(kind).or_default() += 1;
            }
        }
    }
}
