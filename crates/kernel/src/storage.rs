//! Persistence hook: the async key/value sink chunks are saved to on eviction
//! and rehydrated from on first access.
//!
//! Backends live outside the kernel. Every method reports failure through its
//! `Result`; callers never treat an error as a completed write.

use std::future::Future;
use voxelspace_common::{ChunkCoord, ChunkData, ChunkError};

use crate::chunk_manager::Saturated;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode chunk {coord}: {message}")]
    Encode { coord: ChunkCoord, message: String },
    #[error("failed to decode chunk {coord}: {message}")]
    Decode { coord: ChunkCoord, message: String },
    #[error("stored chunk {coord} is malformed")]
    Malformed {
        coord: ChunkCoord,
        #[source]
        source: ChunkError,
    },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Saturated(#[from] Saturated),
}

/// Async chunk sink keyed by chunk coordinate.
pub trait ChunkStorage {
    /// Fetch a chunk, or `None` if it was never stored.
    fn get(
        &self,
        coord: ChunkCoord,
    ) -> impl Future<Output = Result<Option<ChunkData>, StorageError>>;

    /// Durably store a chunk. `Ok` means the data can be read back.
    fn put(
        &self,
        coord: ChunkCoord,
        data: ChunkData,
    ) -> impl Future<Output = Result<(), StorageError>>;

    /// Every coordinate currently stored.
    fn keys(&self) -> impl Future<Output = Result<Vec<ChunkCoord>, StorageError>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    /// In-memory storage with switchable failures.
    #[derive(Default)]
    pub(crate) struct ScriptedStorage {
        pub(crate) entries: RefCell<BTreeMap<ChunkCoord, ChunkData>>,
        pub(crate) fail_puts: Cell<bool>,
        pub(crate) fail_gets: Cell<bool>,
        pub(crate) puts: Cell<usize>,
    }

    impl ChunkStorage for ScriptedStorage {
        async fn get(&self, coord: ChunkCoord) -> Result<Option<ChunkData>, StorageError> {
            if self.fail_gets.get() {
                return Err(StorageError::Unavailable("scripted get failure".into()));
            }
            Ok(self.entries.borrow().get(&coord).cloned())
        }

        async fn put(&self, coord: ChunkCoord, data: ChunkData) -> Result<(), StorageError> {
            self.puts.set(self.puts.get() + 1);
            if self.fail_puts.get() {
                return Err(StorageError::Unavailable("scripted put failure".into()));
            }
            self.entries.borrow_mut().insert(coord, data);
            Ok(())
        }

        async fn keys(&self) -> Result<Vec<ChunkCoord>, StorageError> {
            Ok(self.entries.borrow().keys().copied().collect())
        }
    }
}
