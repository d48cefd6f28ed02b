use serde::{Deserialize, Serialize};
use std::time::Duration;
use voxelspace_terrain::TerrainConfig;

use crate::chunk_manager::ChunkManagerConfig;

/// Simulation constants. Fixed when the world is built and carried in
/// snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldSettings {
    /// Vertical acceleration in blocks per second squared.
    pub gravity: f32,
    /// Shared cap on entities plus players.
    pub max_entities: usize,
    /// Chebyshev radius, in chunks, kept resident around each player.
    pub view_distance: i32,
    /// Steps per second.
    pub tick_rate: u32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            max_entities: 1000,
            view_distance: 3,
            tick_rate: 20,
        }
    }
}

impl WorldSettings {
    /// Seconds simulated by one step.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(self.dt())
    }

    /// Chunks in one player's view neighborhood.
    pub fn view_volume(&self) -> usize {
        let side = (2 * self.view_distance.max(0) + 1) as usize;
        side * side * side
    }
}

/// Everything needed to build a [`World`](crate::World).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub settings: WorldSettings,
    pub chunks: ChunkManagerConfig,
    pub terrain: TerrainConfig,
}

impl WorldConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            terrain: TerrainConfig::with_seed(seed),
            ..Self::default()
        }
    }
}
