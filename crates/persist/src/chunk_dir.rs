//! One compressed file per chunk:
//! ```text
//! <root>/
//!   chunks/
//!     1_-2_3.chunk.cbor.zst
//! ```

use std::path::{Path, PathBuf};
use voxelspace_common::{ChunkCoord, ChunkData};
use voxelspace_kernel::{ChunkStorage, StorageError};

use crate::codec::{self, CodecError};

const SUFFIX: &str = ".chunk.cbor.zst";

/// Directory-backed chunk storage. I/O is synchronous inside the async
/// methods; the host drives them one at a time.
#[derive(Debug, Clone)]
pub struct DirChunkStorage {
    dir: PathBuf,
}

impl DirChunkStorage {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = root.as_ref().join("chunks");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, coord: ChunkCoord) -> PathBuf {
        self.dir
            .join(format!("{}_{}_{}{SUFFIX}", coord.x, coord.y, coord.z))
    }
}

fn parse_file_name(name: &str) -> Option<ChunkCoord> {
    let stem = name.strip_suffix(SUFFIX)?;
    stem.replace('_', ",").parse().ok()
}

fn codec_error(coord: ChunkCoord, e: CodecError) -> StorageError {
    match e {
        CodecError::Io(e) => StorageError::Io(e),
        CodecError::Encode(message) => StorageError::Encode { coord, message },
        CodecError::Decode(message) => StorageError::Decode { coord, message },
    }
}

impl ChunkStorage for DirChunkStorage {
    async fn get(&self, coord: ChunkCoord) -> Result<Option<ChunkData>, StorageError> {
        let bytes = match std::fs::read(self.path_of(coord)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        codec::unpack(&bytes)
            .map(Some)
            .map_err(|e| codec_error(coord, e))
    }

    async fn put(&self, coord: ChunkCoord, data: ChunkData) -> Result<(), StorageError> {
        let bytes = codec::pack(&data).map_err(|e| codec_error(coord, e))?;
        codec::write_atomic(&self.path_of(coord), &bytes)?;
        tracing::trace!(%coord, bytes = bytes.len(), "chunk file written");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<ChunkCoord>, StorageError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            match name.to_str().and_then(parse_file_name) {
                Some(coord) => keys.push(coord),
                None => tracing::debug!(?name, "ignoring unrecognized file in chunk dir"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
