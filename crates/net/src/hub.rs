use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use voxelspace_common::block::{self, AIR};
use voxelspace_common::{ChunkCoord, IVec3, PlayerId, SessionId, Vec3, Voxel, world_to_chunk};
use voxelspace_kernel::{
    ChunkStorage, Player, SettleReport, StepReport, StorageError, TickTimer, World, WorldError,
    WorldSnapshot,
};

use crate::error::ProtocolError;
use crate::message::{
    ChunkMap, ClientMessage, EntityView, Fanout, PlayerView, ServerMessage, WorldUpdates,
};
use crate::session::{Outbound, Session};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Where new players appear.
    #[serde(with = "voxelspace_common::xyz")]
    pub spawn_point: Vec3,
    /// Minimum spacing of `world_update` messages per session.
    pub update_interval_ms: u64,
    pub max_chunks_per_request: usize,
    /// Maximum distance from a player to the center of a block it edits.
    /// `None` disables the check.
    pub reach: Option<f32>,
    pub min_block_y: i32,
    pub max_block_y: i32,
    pub max_chat_len: usize,
    /// Number of tick durations kept for timing stats.
    pub timer_window: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            spawn_point: Vec3::new(0.0, 100.0, 0.0),
            update_interval_ms: 50,
            max_chunks_per_request: 64,
            reach: Some(8.0),
            min_block_y: -1024,
            max_block_y: 1023,
            max_chat_len: 256,
            timer_window: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub step: StepReport,
    pub settle: SettleReport,
    pub updates_sent: usize,
    pub elapsed: Duration,
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode server message");
            None
        }
    }
}

/// Owns the world, the storage backend and every session, and runs all of
/// them from one thread. Hosts feed inbound text to [`Hub::handle_text`] and
/// call [`Hub::tick`] at the world's tick rate.
pub struct Hub<S, O> {
    config: HubConfig,
    world: World,
    storage: S,
    sessions: BTreeMap<SessionId, Session<O>>,
    next_session: u64,
    timer: TickTimer,
}

impl<S: ChunkStorage, O: Outbound> Hub<S, O> {
    pub fn new(world: World, storage: S, config: HubConfig) -> Self {
        let timer = TickTimer::new(config.timer_window);
        Self {
            config,
            world,
            storage,
            sessions: BTreeMap::new(),
            next_session: 0,
            timer,
        }
    }

    /// Learn which chunks storage already holds so they are loaded rather
    /// than regenerated.
    pub async fn index_storage(&mut self) -> Result<usize, StorageError> {
        self.world
            .chunks_mut()
            .index_storage(&self.storage)
            .await
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: SessionId) -> Option<&Session<O>> {
        self.sessions.get(&id)
    }

    pub fn connect(&mut self, outbound: O) -> SessionId {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.sessions.insert(id, Session::new(id, outbound));
        tracing::info!(session = %id, "session connected");
        id
    }

    /// Close a session, removing its player and telling everyone else.
    pub fn disconnect(&mut self, session: SessionId) {
        let Some(mut removed) = self.sessions.remove(&session) else {
            return;
        };
        tracing::info!(%session, "session disconnected");
        if let Some(id) = removed.unbind() {
            self.world.remove_player(&id);
            self.broadcast(&ServerMessage::PlayerLeft { player_id: id }, None);
        }
    }

    pub async fn handle_text(&mut self, session: SessionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(session, message).await,
            Err(e) => {
                let error = ProtocolError::Malformed(e);
                tracing::warn!(%session, error = %error, "unreadable message");
                self.reply_error(session, &error);
                self.prune();
            }
        }
    }

    pub async fn handle(&mut self, session: SessionId, message: ClientMessage) {
        if !self.sessions.contains_key(&session) {
            tracing::debug!(%session, "message for a closed session dropped");
            return;
        }
        let name = message.name();
        let result = match message {
            ClientMessage::Join { player_id } => self.on_join(session, player_id).await,
            ClientMessage::Move {
                position,
                rotation,
                velocity,
            } => self.on_move(session, position, rotation, velocity),
            ClientMessage::PlaceBlock {
                x,
                y,
                z,
                block_type,
            } => {
                self.on_place(session, IVec3::new(x, y, z), block_type)
                    .await
            }
            ClientMessage::BreakBlock { x, y, z } => {
                self.on_break(session, IVec3::new(x, y, z)).await
            }
            ClientMessage::RequestChunks { chunks } => {
                self.on_request_chunks(session, chunks).await
            }
            ClientMessage::Chat { message } => self.on_chat(session, message),
            ClientMessage::Interact { kind, target } => self.on_interact(session, kind, target),
        };
        if let Err(e) = result {
            tracing::warn!(%session, kind = name, error = %e, "request rejected");
            self.reply_error(session, &e);
        }
        self.prune();
    }

    /// Step the world, settle storage and send due `world_update`s.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let started = Instant::now();
        let step = self.world.step();
        let settle = self.world.settle(&self.storage).await;
        self.fan_out_events();

        let interval = Duration::from_millis(self.config.update_interval_ms);
        let entities: Vec<EntityView> = self
            .world
            .entities()
            .values()
            .map(EntityView::from)
            .collect();
        let mut updates_sent = 0;
        for session in self.sessions.values_mut() {
            if !session.is_joined() || !session.due_for_update(now, interval) {
                continue;
            }
            let (blocks, events) = session.take_pending();
            let updates = WorldUpdates {
                entities: entities.clone(),
                blocks,
                events,
            };
            if updates.is_empty() {
                continue;
            }
            session.mark_updated(now);
            if let Some(text) = encode(&ServerMessage::WorldUpdate { updates }) {
                session.send(text);
                updates_sent += 1;
            }
        }
        self.prune();

        let elapsed = started.elapsed();
        self.timer.record(elapsed);
        if elapsed > self.world.settings().tick_interval() {
            tracing::warn!(?elapsed, tick = self.world.tick(), "tick overran its interval");
        }
        TickReport {
            step,
            settle,
            updates_sent,
            elapsed,
        }
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.save()
    }

    /// Replace the world from a snapshot. Joined sessions whose players are
    /// in the snapshot stay attached. The rest are told to join again and
    /// everyone else sees them leave.
    pub fn restore(&mut self, snapshot: WorldSnapshot) -> Result<(), WorldError> {
        self.world.load(snapshot)?;
        let mut dropped = Vec::new();
        for session in self.sessions.values_mut() {
            let Some(id) = session.player().cloned() else {
                continue;
            };
            match self.world.player_mut(&id) {
                Some(player) => player.session = Some(session.id()),
                None => {
                    session.unbind();
                    dropped.push((session.id(), id));
                }
            }
        }
        for (session, id) in dropped {
            tracing::info!(%session, player = %id, "player missing from restored world");
            self.reply_error(session, &ProtocolError::NotRestored(id.clone()));
            self.broadcast(&ServerMessage::PlayerLeft { player_id: id }, Some(session));
        }
        self.prune();
        Ok(())
    }

    fn joined(&self, session: SessionId, action: &'static str) -> Result<PlayerId, ProtocolError> {
        self.sessions
            .get(&session)
            .and_then(|s| s.player().cloned())
            .ok_or(ProtocolError::NotJoined(action))
    }

    async fn on_join(
        &mut self,
        session: SessionId,
        requested: Option<PlayerId>,
    ) -> Result<(), ProtocolError> {
        if let Some(current) = self.sessions.get(&session).and_then(|s| s.player()) {
            return Err(ProtocolError::AlreadyJoined(current.clone()));
        }
        let id = requested
            .filter(|id| !id.0.is_empty())
            .unwrap_or_else(PlayerId::generate);

        match self.world.player_mut(&id) {
            Some(player) if player.is_attached() => {
                return Err(ProtocolError::PlayerConnected(id));
            }
            Some(player) => {
                player.session = Some(session);
                tracing::info!(%session, player = %id, "player reattached");
            }
            None => {
                let mut player = Player::new(id.clone(), self.config.spawn_point);
                player.session = Some(session);
                self.world.add_player(player)?;
            }
        }
        if let Some(s) = self.sessions.get_mut(&session) {
            s.bind(id.clone());
        }

        let position = self
            .world
            .player(&id)
            .map_or(self.config.spawn_point, |p| p.body.position);
        let coords: Vec<ChunkCoord> = world_to_chunk(position)
            .neighborhood(self.world.settings().view_distance)
            .collect();
        let chunks = self.stream_chunks(&coords).await;
        let initial = ServerMessage::InitialState {
            player_id: id.clone(),
            chunks,
            players: self.world.players().values().map(PlayerView::from).collect(),
            settings: self.world.settings().into(),
        };
        self.send_to(session, &initial);

        if let Some(player) = self.world.player(&id) {
            let joined = ServerMessage::PlayerJoined {
                player: player.into(),
            };
            self.broadcast(&joined, Some(session));
        }
        Ok(())
    }

    /// Make each chunk resident and serialize the ones that made it.
    async fn stream_chunks(&mut self, coords: &[ChunkCoord]) -> ChunkMap {
        for &coord in coords {
            if let Err(e) = self.world.ensure_chunk(coord, &self.storage).await {
                tracing::warn!(%coord, error = %e, "chunk unavailable, skipped");
            }
        }
        coords
            .iter()
            .filter_map(|&coord| {
                self.world
                    .chunks()
                    .peek(coord)
                    .map(|chunk| (coord.key(), chunk.to_data()))
            })
            .collect()
    }

    fn on_move(
        &mut self,
        session: SessionId,
        position: Vec3,
        rotation: Vec3,
        velocity: Vec3,
    ) -> Result<(), ProtocolError> {
        let id = self.joined(session, "move")?;
        if !(position.is_finite() && rotation.is_finite() && velocity.is_finite()) {
            return Err(ProtocolError::NonFinite("move"));
        }
        let Some(player) = self.world.player_mut(&id) else {
            return Err(WorldError::UnknownPlayer(id).into());
        };
        // Client-authoritative: the reported state is taken as is.
        player.body.position = position;
        player.body.rotation = rotation;
        player.body.velocity = velocity;

        let moved = ServerMessage::PlayerMoved {
            player_id: id,
            position,
            rotation,
        };
        self.broadcast(&moved, Some(session));
        Ok(())
    }

    fn validate_edit(
        &self,
        session: SessionId,
        block: IVec3,
        action: &'static str,
    ) -> Result<(), ProtocolError> {
        let id = self.joined(session, action)?;
        let (min, max) = (self.config.min_block_y, self.config.max_block_y);
        if block.y < min || block.y > max {
            return Err(ProtocolError::OutOfBounds { y: block.y, min, max });
        }
        if let (Some(reach), Some(player)) = (self.config.reach, self.world.player(&id)) {
            let center = block.as_vec3() + Vec3::splat(0.5);
            let distance = player.body.position.distance(center);
            if distance > reach {
                return Err(ProtocolError::OutOfReach { distance, reach });
            }
        }
        Ok(())
    }

    async fn on_place(
        &mut self,
        session: SessionId,
        block: IVec3,
        block_type: i64,
    ) -> Result<(), ProtocolError> {
        self.validate_edit(session, block, "place_block")?;
        let voxel = Voxel::try_from(block_type)
            .ok()
            .filter(|v| block::is_known(*v))
            .ok_or(ProtocolError::UnknownBlock(block_type))?;
        self.apply_edit(block, voxel).await
    }

    async fn on_break(&mut self, session: SessionId, block: IVec3) -> Result<(), ProtocolError> {
        self.validate_edit(session, block, "break_block")?;
        self.apply_edit(block, AIR).await
    }

    async fn apply_edit(&mut self, block: IVec3, voxel: Voxel) -> Result<(), ProtocolError> {
        let written = self.world.place_voxel(block, voxel, &self.storage).await?;
        if written {
            let update = ServerMessage::BlockUpdate {
                position: block.into(),
                block_type: voxel,
            };
            self.broadcast(&update, None);
        }
        Ok(())
    }

    async fn on_request_chunks(
        &mut self,
        session: SessionId,
        coords: Vec<ChunkCoord>,
    ) -> Result<(), ProtocolError> {
        self.joined(session, "request_chunks")?;
        let unique: BTreeSet<ChunkCoord> = coords.into_iter().collect();
        let limit = self.config.max_chunks_per_request;
        if unique.len() > limit {
            return Err(ProtocolError::TooManyChunks {
                requested: unique.len(),
                limit,
            });
        }
        let coords: Vec<ChunkCoord> = unique.into_iter().collect();
        let chunks = self.stream_chunks(&coords).await;
        self.send_to(session, &ServerMessage::ChunkData { chunks });
        Ok(())
    }

    fn on_chat(&mut self, session: SessionId, message: String) -> Result<(), ProtocolError> {
        let id = self.joined(session, "chat")?;
        if message.chars().count() > self.config.max_chat_len {
            return Err(ProtocolError::ChatTooLong(self.config.max_chat_len));
        }
        self.broadcast(
            &ServerMessage::Chat {
                player_id: id,
                message,
            },
            None,
        );
        Ok(())
    }

    fn on_interact(
        &mut self,
        session: SessionId,
        kind: String,
        target: serde_json::Value,
    ) -> Result<(), ProtocolError> {
        let id = self.joined(session, "interact")?;
        self.world.record_interaction(&id, kind, target)?;
        Ok(())
    }

    /// Move drained world events into every joined session's pending lists.
    fn fan_out_events(&mut self) {
        let mut blocks = Vec::new();
        let mut events = Vec::new();
        for event in self.world.drain_events() {
            match Fanout::from(event) {
                Fanout::Block(change) => blocks.push(change),
                Fanout::Event(event) => events.push(event),
                Fanout::Skip => {}
            }
        }
        if blocks.is_empty() && events.is_empty() {
            return;
        }
        for session in self.sessions.values_mut().filter(|s| s.is_joined()) {
            session.queue(&blocks, &events);
        }
    }

    fn send_to(&mut self, session: SessionId, message: &ServerMessage) {
        let Some(text) = encode(message) else {
            return;
        };
        if let Some(s) = self.sessions.get_mut(&session) {
            s.send(text);
        }
    }

    /// Send to every joined session except `except`.
    fn broadcast(&mut self, message: &ServerMessage, except: Option<SessionId>) {
        let Some(text) = encode(message) else {
            return;
        };
        for session in self.sessions.values_mut() {
            if session.is_joined() && Some(session.id()) != except {
                session.send(text.clone());
            }
        }
    }

    fn reply_error(&mut self, session: SessionId, error: &ProtocolError) {
        let reply = ServerMessage::Error {
            message: error.to_string(),
        };
        self.send_to(session, &reply);
    }

    /// Disconnect every session whose outbound failed. Repeats because the
    /// resulting `player_left` broadcasts can close more sessions.
    fn prune(&mut self) {
        loop {
            let closed: Vec<SessionId> = self
                .sessions
                .values()
                .filter(|s| s.is_closed())
                .map(Session::id)
                .collect();
            if closed.is_empty() {
                break;
            }
            for id in closed {
                tracing::debug!(session = %id, "pruning closed session");
                self.disconnect(id);
            }
        }
    }
}
