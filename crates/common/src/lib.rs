//! Shared types for the voxelspace engine.
//!
//! Vector math is glam's `Vec3`/`IVec3`; this crate adds the voxel-specific
//! coordinate decompositions and the chunk volume type.

pub mod block;
pub mod chunk;
pub mod coords;
pub mod types;
pub mod xyz;

pub use block::Voxel;
pub use chunk::{Chunk, ChunkData, ChunkError};
pub use coords::{
    Aabb, CHUNK_SIZE, CHUNK_VOLUME, ChunkCoord, ChunkKey, LocalCoord, ParseCoordError, block_of,
    world_to_chunk, world_to_local,
};
pub use glam::{IVec3, Vec3};
pub use types::{Body, EntityId, PlayerId, SessionId};
