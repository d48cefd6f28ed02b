//! CBOR + zstd framing shared by every on-disk format.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("compression error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    Encode(String),
    #[error("CBOR deserialization error: {0}")]
    Decode(String),
}

/// Serialize to CBOR and compress.
pub fn pack<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut cbor = Vec::new();
    ciborium::into_writer(value, &mut cbor).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut encoder = zstd::Encoder::new(Vec::new(), ZSTD_LEVEL)?;
    encoder.write_all(&cbor)?;
    Ok(encoder.finish()?)
}

pub fn unpack<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut cbor = Vec::new();
    decoder.read_to_end(&mut cbor)?;
    ciborium::from_reader(cbor.as_slice()).map_err(|e| CodecError::Decode(e.to_string()))
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Write through a sibling temp file so readers never see a partial file.
pub(crate) fn write_atomic(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelspace_common::{Chunk, ChunkData, LocalCoord};

    #[test]
    fn chunk_data_survives_packing() {
        let mut chunk = Chunk::empty();
        chunk.set_voxel(LocalCoord::new(4, 5, 6), 8);
        let packed = pack(&chunk.to_data()).unwrap();
        // An almost-empty 32 KiB chunk compresses to a tiny payload.
        assert!(packed.len() < 1024, "packed to {} bytes", packed.len());
        let data: ChunkData = unpack(&packed).unwrap();
        assert_eq!(data, chunk.to_data());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(unpack::<ChunkData>(b"definitely not zstd").is_err());
        let wrong_shape = pack(&"a string").unwrap();
        assert!(matches!(
            unpack::<ChunkData>(&wrong_shape),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn sha256_is_lowercase_hex() {
        let h = sha256_hex(b"abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
