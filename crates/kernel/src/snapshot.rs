use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use voxelspace_common::{ChunkData, ChunkKey, EntityId, PlayerId};

use crate::entity::{Entity, Player};
use crate::settings::WorldSettings;

/// The whole persisted world in one document.
///
/// Only modified chunks are included; everything else regenerates from the
/// seed. Registries serialize as `[id, value]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub chunks: BTreeMap<ChunkKey, ChunkData>,
    pub entities: Vec<(EntityId, Entity)>,
    pub players: Vec<(PlayerId, Player)>,
    pub settings: WorldSettings,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub tick: u64,
}

impl WorldSnapshot {
    pub fn body_count(&self) -> usize {
        self.entities.len() + self.players.len()
    }
}
