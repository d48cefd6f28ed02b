//! Persistence backends for voxelspace.
//!
//! # Invariants
//! - A chunk write reports success only once the file is fully in place.
//! - Snapshots are hash-chained and verified before they are decoded.
//! - Unknown schema versions are refused, never guessed at.

pub mod chunk_dir;
pub mod codec;
pub mod memory;
pub mod store;

pub use chunk_dir::DirChunkStorage;
pub use codec::CodecError;
pub use memory::MemoryChunkStorage;
pub use store::{IntegrityManifest, ManifestEntry, SnapshotStore, StoreError, StoreMeta};
