//! Authoritative world state for voxelspace.
//!
//! # Invariants
//! - Resident and parked chunks together never exceed the chunk cap after an
//!   insertion returns; when only unsaved chunks remain, insertions are
//!   refused instead.
//! - A modified chunk leaves memory only after storage acknowledged it.
//! - Entities plus players never exceed `WorldSettings::max_entities`.
//! - All state mutations flow through explicit operations and are logged as
//!   [`WorldEvent`]s.

pub mod chunk_manager;
pub mod entity;
pub mod settings;
pub mod snapshot;
pub mod storage;
pub mod timer;
pub mod world;

pub use chunk_manager::{
    ChunkManager, ChunkManagerConfig, FlushReport, MAX_COLLISION_EXTENT, Saturated,
    SweepReport,
};
pub use entity::{Entity, Player};
pub use settings::{WorldConfig, WorldSettings};
pub use snapshot::WorldSnapshot;
pub use storage::{ChunkStorage, StorageError};
pub use timer::TickTimer;
pub use world::{Residency, SettleReport, StepReport, World, WorldError, WorldEvent};
