use std::cell::RefCell;
use std::collections::BTreeMap;
use voxelspace_common::{ChunkCoord, ChunkData};
use voxelspace_kernel::{ChunkStorage, StorageError};

/// Process-local chunk storage. Lost on exit; useful for tests and
/// ephemeral servers.
#[derive(Debug, Default)]
pub struct MemoryChunkStorage {
    chunks: RefCell<BTreeMap<ChunkCoord, ChunkData>>,
}

impl MemoryChunkStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.borrow().is_empty()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.borrow().contains_key(&coord)
    }
}

impl ChunkStorage for MemoryChunkStorage {
    async fn get(&self, coord: ChunkCoord) -> Result<Option<ChunkData>, StorageError> {
        Ok(self.chunks.borrow().get(&coord).cloned())
    }

    async fn put(&self, coord: ChunkCoord, data: ChunkData) -> Result<(), StorageError> {
        self.chunks.borrow_mut().insert(coord, data);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<ChunkCoord>, StorageError> {
        Ok(self.chunks.borrow().keys().copied().collect())
    }
}
