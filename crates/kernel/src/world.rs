use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use voxelspace_common::{
    Aabb, Body, ChunkCoord, ChunkError, EntityId, IVec3, LocalCoord, PlayerId, Vec3, Voxel,
    world_to_chunk,
};
use voxelspace_terrain::TerrainGenerator;

use crate::chunk_manager::{
    ChunkManager, FlushReport, MAX_COLLISION_EXTENT, Saturated, SweepReport,
};
use crate::entity::{Entity, Player};
use crate::settings::{WorldConfig, WorldSettings};
use crate::snapshot::WorldSnapshot;
use crate::storage::{ChunkStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("world is full: {current} of {max} bodies")]
    Capacity { current: usize, max: usize },
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),
    #[error("player {0} already exists")]
    DuplicatePlayer(PlayerId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("invalid body: {0}")]
    InvalidBody(&'static str),
    #[error("snapshot holds {count} chunks, cap is {max}")]
    TooManyChunks { count: usize, max: usize },
    #[error("snapshot chunk rejected")]
    Snapshot(#[from] ChunkError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A record of one mutation, drained by whoever fans changes out to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorldEvent {
    EntitySpawned {
        id: EntityId,
        kind: String,
    },
    EntityDespawned {
        id: EntityId,
    },
    PlayerAdded {
        id: PlayerId,
    },
    PlayerRemoved {
        id: PlayerId,
    },
    BlockChanged {
        position: IVec3,
        voxel: Voxel,
    },
    Interaction {
        player: PlayerId,
        kind: String,
        target: serde_json::Value,
    },
    Stepped {
        tick: u64,
    },
}

/// How a chunk was made resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    AlreadyResident,
    Reclaimed,
    /// Storage holds it; it arrives on the next `settle`.
    Queued,
    Generated,
    /// Memory holds only unsaved chunks; retried once a flush frees room.
    Deferred,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub collisions: usize,
    pub generated: usize,
    pub queued: usize,
    pub deferred: usize,
    pub sweep: SweepReport,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SettleReport {
    pub flush: FlushReport,
    pub loaded: usize,
    pub generated: usize,
    /// Loads that failed and stay queued.
    pub failed: usize,
}

/// The authoritative world state.
///
/// Owns the chunk manager, the terrain generator and both body registries.
/// Registries are BTreeMaps so iteration, hashing and snapshots are ordered
/// the same way on every run.
#[derive(Debug)]
pub struct World {
    settings: WorldSettings,
    chunks: ChunkManager,
    terrain: TerrainGenerator,
    entities: BTreeMap<EntityId, Entity>,
    players: BTreeMap<PlayerId, Player>,
    tick: u64,
    /// Stored chunks wanted by streaming, waiting for `settle`.
    pending_loads: BTreeSet<ChunkCoord>,
    event_log: Vec<WorldEvent>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let WorldConfig {
            settings,
            chunks,
            terrain,
        } = config;
        if chunks.max_resident < settings.view_volume() {
            tracing::warn!(
                max_resident = chunks.max_resident,
                view_volume = settings.view_volume(),
                "chunk cap is smaller than one view neighborhood; chunks will churn"
            );
        }
        Self {
            settings,
            chunks: ChunkManager::new(chunks),
            terrain: TerrainGenerator::new(terrain),
            entities: BTreeMap::new(),
            players: BTreeMap::new(),
            tick: 0,
            pending_loads: BTreeSet::new(),
            event_log: Vec::new(),
        }
    }

    /// Default configuration with the given terrain seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(WorldConfig::with_seed(seed))
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.terrain.seed()
    }

    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut ChunkManager {
        &mut self.chunks
    }

    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, Entity> {
        &self.entities
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, Player> {
        &self.players
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn pending_loads(&self) -> usize {
        self.pending_loads.len()
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    fn check_capacity(&self) -> Result<(), WorldError> {
        let current = self.entities.len() + self.players.len();
        let max = self.settings.max_entities;
        if current >= max {
            return Err(WorldError::Capacity { current, max });
        }
        Ok(())
    }

    pub fn spawn(&mut self, kind: impl Into<String>, body: Body) -> Result<EntityId, WorldError> {
        self.add_entity(Entity::new(kind, body))
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, WorldError> {
        if self.entities.contains_key(&entity.id) {
            return Err(WorldError::DuplicateEntity(entity.id));
        }
        self.check_capacity()?;
        validate_body(&entity.body)?;
        let id = entity.id;
        self.event_log.push(WorldEvent::EntitySpawned {
            id,
            kind: entity.kind.clone(),
        });
        self.entities.insert(id, entity);
        Ok(id)
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            self.event_log.push(WorldEvent::EntityDespawned { id });
        }
        removed
    }

    pub fn add_player(&mut self, player: Player) -> Result<(), WorldError> {
        if self.players.contains_key(&player.id) {
            return Err(WorldError::DuplicatePlayer(player.id));
        }
        self.check_capacity()?;
        validate_body(&player.body)?;
        tracing::info!(player = %player.id, "player added");
        self.event_log.push(WorldEvent::PlayerAdded {
            id: player.id.clone(),
        });
        self.players.insert(player.id.clone(), player);
        Ok(())
    }

    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let removed = self.players.remove(id);
        if removed.is_some() {
            tracing::info!(player = %id, "player removed");
            self.event_log
                .push(WorldEvent::PlayerRemoved { id: id.clone() });
        }
        removed
    }

    pub fn record_interaction(
        &mut self,
        player: &PlayerId,
        kind: impl Into<String>,
        target: serde_json::Value,
    ) -> Result<(), WorldError> {
        if !self.players.contains_key(player) {
            return Err(WorldError::UnknownPlayer(player.clone()));
        }
        self.event_log.push(WorldEvent::Interaction {
            player: player.clone(),
            kind: kind.into(),
            target,
        });
        Ok(())
    }

    /// Voxel at a world block position; air when its chunk is not resident.
    pub fn voxel(&self, block: IVec3) -> Voxel {
        self.chunks
            .get_voxel(ChunkCoord::of_block(block), LocalCoord::of_block(block))
    }

    /// Write a voxel into a resident chunk. Returns `false` when the chunk is
    /// not resident.
    pub fn set_voxel(&mut self, block: IVec3, voxel: Voxel) -> bool {
        let written =
            self.chunks
                .set_voxel(ChunkCoord::of_block(block), LocalCoord::of_block(block), voxel);
        if written {
            self.event_log.push(WorldEvent::BlockChanged {
                position: block,
                voxel,
            });
        }
        written
    }

    /// Make the containing chunk resident, then write the voxel.
    pub async fn place_voxel<S: ChunkStorage>(
        &mut self,
        block: IVec3,
        voxel: Voxel,
        storage: &S,
    ) -> Result<bool, StorageError> {
        self.ensure_chunk(ChunkCoord::of_block(block), storage)
            .await?;
        Ok(self.set_voxel(block, voxel))
    }

    pub fn check_collision(&self, position: Vec3, bounds: Vec3) -> bool {
        self.chunks
            .check_collision(&Aabb::from_center(position, bounds))
    }

    fn generate_into(&mut self, coord: ChunkCoord) -> Result<(), Saturated> {
        self.chunks.check_room(coord)?;
        let chunk = self.terrain.generate(coord);
        self.chunks.set(coord, chunk)?;
        tracing::debug!(%coord, "chunk generated");
        Ok(())
    }

    /// Synchronous residency: reclaim, queue a storage load, or generate.
    pub fn make_resident(&mut self, coord: ChunkCoord) -> Residency {
        if self.chunks.get(coord).is_some() {
            return Residency::AlreadyResident;
        }
        if self.chunks.reclaim(coord) {
            return Residency::Reclaimed;
        }
        if self.chunks.is_stored(coord) {
            self.pending_loads.insert(coord);
            return Residency::Queued;
        }
        match self.generate_into(coord) {
            Ok(()) => Residency::Generated,
            Err(_) => Residency::Deferred,
        }
    }

    /// Make `coord` resident now, awaiting storage if it holds the chunk.
    pub async fn ensure_chunk<S: ChunkStorage>(
        &mut self,
        coord: ChunkCoord,
        storage: &S,
    ) -> Result<(), StorageError> {
        if self.chunks.is_stored(coord) || self.pending_loads.contains(&coord) {
            if self.chunks.load(coord, storage).await? {
                self.pending_loads.remove(&coord);
                return Ok(());
            }
        } else if self.chunks.get(coord).is_some() || self.chunks.reclaim(coord) {
            return Ok(());
        }
        self.pending_loads.remove(&coord);
        self.generate_into(coord)?;
        Ok(())
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) -> StepReport {
        let _span = tracing::info_span!("world_step", tick = self.tick + 1).entered();
        let dt = self.settings.dt();
        let gravity = self.settings.gravity;
        let mut report = StepReport::default();

        for entity in self.entities.values_mut() {
            if integrate(&mut entity.body, gravity, dt, &self.chunks) {
                report.collisions += 1;
            }
        }
        for player in self.players.values_mut() {
            if integrate(&mut player.body, gravity, dt, &self.chunks) {
                report.collisions += 1;
            }
        }

        let centers: BTreeSet<ChunkCoord> = self
            .players
            .values()
            .map(|p| world_to_chunk(p.body.position))
            .collect();
        let radius = self.settings.view_distance;
        for center in centers {
            for coord in center.neighborhood(radius) {
                match self.make_resident(coord) {
                    Residency::Generated => report.generated += 1,
                    Residency::Queued => report.queued += 1,
                    Residency::Deferred => report.deferred += 1,
                    Residency::AlreadyResident | Residency::Reclaimed => {}
                }
            }
        }

        report.sweep = self.chunks.sweep();
        self.tick += 1;
        self.event_log.push(WorldEvent::Stepped { tick: self.tick });
        report
    }

    /// Flush parked chunks, then resolve queued loads. Loads that fail stay
    /// queued rather than being generated over.
    pub async fn settle<S: ChunkStorage>(&mut self, storage: &S) -> SettleReport {
        let mut report = SettleReport {
            flush: self.chunks.flush(storage).await,
            ..SettleReport::default()
        };
        let queued = std::mem::take(&mut self.pending_loads);
        for coord in queued {
            match self.chunks.load(coord, storage).await {
                Ok(true) => report.loaded += 1,
                Ok(false) => match self.generate_into(coord) {
                    Ok(()) => report.generated += 1,
                    Err(e) => {
                        tracing::warn!(%coord, error = %e, "chunk generation deferred");
                        self.pending_loads.insert(coord);
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(%coord, error = %e, "chunk load failed, will retry");
                    self.pending_loads.insert(coord);
                    report.failed += 1;
                }
            }
        }
        if report != SettleReport::default() {
            tracing::debug!(
                saved = report.flush.saved,
                save_failures = report.flush.failed,
                loaded = report.loaded,
                generated = report.generated,
                load_failures = report.failed,
                "settled storage"
            );
        }
        report
    }

    pub fn save(&self) -> WorldSnapshot {
        WorldSnapshot {
            chunks: self.chunks.serialize(),
            entities: self
                .entities
                .iter()
                .map(|(id, e)| (*id, e.clone()))
                .collect(),
            players: self
                .players
                .iter()
                .map(|(id, p)| {
                    let mut p = p.clone();
                    p.session = None;
                    (id.clone(), p)
                })
                .collect(),
            settings: self.settings,
            seed: self.seed(),
            tick: self.tick,
        }
    }

    /// Replace the whole state with `snapshot`. On error nothing changes.
    /// Restored players are detached.
    ///
    /// The stored-chunk index is kept: storage still holds chunks flushed
    /// before the snapshot was taken, and a chunk the snapshot does not
    /// carry is rehydrated from there rather than regenerated. Chunks the
    /// snapshot carries win over their stored copies until evicted.
    pub fn load(&mut self, snapshot: WorldSnapshot) -> Result<(), WorldError> {
        let WorldSnapshot {
            chunks,
            entities,
            players,
            settings,
            seed,
            tick,
        } = snapshot;

        let bodies = entities.len() + players.len();
        if bodies > settings.max_entities {
            return Err(WorldError::Capacity {
                current: bodies,
                max: settings.max_entities,
            });
        }
        let max = self.chunks.config().max_resident;
        if chunks.len() > max {
            return Err(WorldError::TooManyChunks {
                count: chunks.len(),
                max,
            });
        }
        for (_, entity) in &entities {
            validate_body(&entity.body)?;
        }
        for (_, player) in &players {
            validate_body(&player.body)?;
        }
        self.chunks.deserialize(chunks)?;

        if seed != self.terrain.seed() {
            let mut config = self.terrain.config().clone();
            config.seed = seed;
            self.terrain = TerrainGenerator::new(config);
        }
        self.settings = settings;
        self.entities = entities
            .into_iter()
            .map(|(id, mut e)| {
                e.id = id;
                (id, e)
            })
            .collect();
        self.players = players
            .into_iter()
            .map(|(id, mut p)| {
                p.id = id.clone();
                p.session = None;
                (id, p)
            })
            .collect();
        self.tick = tick;
        self.pending_loads.clear();
        tracing::info!(
            tick,
            seed,
            chunks = self.chunks.len(),
            entities = self.entities.len(),
            players = self.players.len(),
            "world loaded"
        );
        Ok(())
    }

    /// FNV-1a digest over tick, seed, bodies and modified voxels, in
    /// canonical order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        let mix_body = |h: &mut u64, body: &Body| {
            for v in [body.position, body.rotation, body.velocity, body.bounds] {
                for c in v.to_array() {
                    mix(h, &c.to_le_bytes());
                }
            }
        };

        mix(&mut h, &self.tick.to_le_bytes());
        mix(&mut h, &self.seed().to_le_bytes());
        for (id, entity) in &self.entities {
            mix(&mut h, id.0.as_bytes());
            mix(&mut h, entity.kind.as_bytes());
            mix_body(&mut h, &entity.body);
        }
        for (id, player) in &self.players {
            mix(&mut h, id.0.as_bytes());
            mix_body(&mut h, &player.body);
        }
        for (key, data) in self.chunks.serialize() {
            mix(&mut h, key.to_string().as_bytes());
            mix(&mut h, &data.voxels);
        }
        h
    }
}

fn validate_body(body: &Body) -> Result<(), WorldError> {
    if !body.is_finite() {
        return Err(WorldError::InvalidBody("non-finite component"));
    }
    if body.bounds.min_element() <= 0.0 {
        return Err(WorldError::InvalidBody("bounds must be positive"));
    }
    if body.bounds.max_element() > MAX_COLLISION_EXTENT {
        return Err(WorldError::InvalidBody("bounds exceed collision limit"));
    }
    Ok(())
}

/// Semi-implicit Euler with a stop-on-contact response. Returns true when
/// the move was blocked.
fn integrate(body: &mut Body, gravity: f32, dt: f32, chunks: &ChunkManager) -> bool {
    body.velocity.y += gravity * dt;
    let next = body.position + body.velocity * dt;
    if chunks.check_collision(&body.aabb_at(next)) {
        body.velocity = Vec3::ZERO;
        true
    } else {
        body.position = next;
        false
    }
}
