use crate::block::{AIR, Voxel};
use crate::coords::{CHUNK_VOLUME, LocalCoord};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk voxel array has {actual} entries, expected {CHUNK_VOLUME}")]
    BadLength { actual: usize },
}

/// A CHUNK_SIZE³ block of voxels.
///
/// The voxel array length is fixed at construction and can never change.
#[derive(Debug, Clone)]
pub struct Chunk {
    voxels: Box<[Voxel]>,
    modified: bool,
    last_accessed: Instant,
}

impl Chunk {
    /// An all-air, unmodified chunk.
    pub fn empty() -> Self {
        Self {
            voxels: vec![AIR; CHUNK_VOLUME].into_boxed_slice(),
            modified: false,
            last_accessed: Instant::now(),
        }
    }

    pub fn from_voxels(voxels: Vec<Voxel>) -> Result<Self, ChunkError> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(ChunkError::BadLength {
                actual: voxels.len(),
            });
        }
        Ok(Self {
            voxels: voxels.into_boxed_slice(),
            modified: false,
            last_accessed: Instant::now(),
        })
    }

    /// Voxel at a local position; air when out of bounds.
    pub fn voxel(&self, at: LocalCoord) -> Voxel {
        at.index().map_or(AIR, |i| self.voxels[i])
    }

    /// Write a voxel and mark the chunk modified. Out-of-bounds writes return
    /// `false` and change nothing.
    pub fn set_voxel(&mut self, at: LocalCoord, voxel: Voxel) -> bool {
        match at.index() {
            Some(i) => {
                self.voxels[i] = voxel;
                self.modified = true;
                true
            }
            None => false,
        }
    }

    /// Write without touching the dirty flag. Used while generating terrain,
    /// where the result is reproducible and need not be persisted.
    pub fn fill_voxel(&mut self, at: LocalCoord, voxel: Voxel) -> bool {
        match at.index() {
            Some(i) => {
                self.voxels[i] = voxel;
                true
            }
            None => false,
        }
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }

    /// Number of non-air voxels.
    pub fn solid_count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v != AIR).count()
    }

    /// Wire/persisted form.
    pub fn to_data(&self) -> ChunkData {
        ChunkData {
            voxels: self.voxels.to_vec(),
            modified: self.modified,
        }
    }

    /// Rebuild from the wire form, keeping its dirty flag.
    pub fn from_data(data: ChunkData) -> Result<Self, ChunkError> {
        let modified = data.modified;
        let mut chunk = Self::from_voxels(data.voxels)?;
        chunk.modified = modified;
        Ok(chunk)
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::empty()
    }
}

/// Serialized chunk: `{voxels: [CHUNK_VOLUME ints], modified: bool}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    pub voxels: Vec<Voxel>,
    pub modified: bool,
}
