//! File-backed world snapshots.
//!
//! Layout inside the store directory:
//! ```text
//! store.meta.json                - metadata and schema version
//! snapshots/
//!   000001.snapshot.cbor.zst     - CBOR+zstd compressed world snapshots
//! integrity/
//!   manifest.json                - hash chain manifest
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use voxelspace_kernel::WorldSnapshot;

use crate::codec::{self, CodecError, sha256_hex};

const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
const META_FILE: &str = "store.meta.json";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no snapshots found")]
    NoSnapshots,
    #[error("snapshot {0} does not exist")]
    UnknownSnapshot(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
    pub snapshot_count: u32,
    /// World tick of the newest snapshot.
    pub latest_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Hash chain over every snapshot file, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

impl IntegrityManifest {
    fn entry(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }
}

/// Versioned, hash-chained snapshot directory. Reads fail closed: a file
/// whose hash is missing from the manifest or differs from it is refused.
#[derive(Debug)]
pub struct SnapshotStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
}

impl SnapshotStore {
    /// Open or create a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("snapshots"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join(META_FILE);
        let manifest_path = root.join("integrity").join(MANIFEST_FILE);

        let store = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_slice(&std::fs::read(&meta_path)?)?;
            if meta.schema_version != SNAPSHOT_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: SNAPSHOT_SCHEMA_VERSION,
                });
            }
            let manifest = if manifest_path.exists() {
                serde_json::from_slice(&std::fs::read(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            Self {
                root,
                meta,
                manifest,
            }
        } else {
            let store = Self {
                root,
                meta: StoreMeta {
                    schema_version: SNAPSHOT_SCHEMA_VERSION,
                    snapshot_count: 0,
                    latest_tick: 0,
                },
                manifest: IntegrityManifest::default(),
            };
            store.save_meta()?;
            store.save_manifest()?;
            store
        };
        tracing::debug!(
            root = %store.root.display(),
            snapshots = store.meta.snapshot_count,
            "snapshot store opened"
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn manifest(&self) -> &IntegrityManifest {
        &self.manifest
    }

    fn file_name(index: u32) -> String {
        format!("{index:06}.snapshot.cbor.zst")
    }

    /// Write `snapshot` as the next file in the chain. Returns its index.
    pub fn save(&mut self, snapshot: &WorldSnapshot) -> Result<u32, StoreError> {
        let _span = tracing::info_span!("snapshot_save", tick = snapshot.tick).entered();
        let index = self.meta.snapshot_count + 1;
        let filename = Self::file_name(index);
        let compressed = codec::pack(snapshot)?;
        let sha256 = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        codec::write_atomic(&self.root.join("snapshots").join(&filename), &compressed)?;
        self.manifest.entries.push(ManifestEntry {
            filename,
            sha256,
            prev_hash,
        });
        self.meta.snapshot_count = index;
        self.meta.latest_tick = snapshot.tick;
        self.save_manifest()?;
        self.save_meta()?;

        tracing::info!(
            index,
            bytes = compressed.len(),
            chunks = snapshot.chunks.len(),
            bodies = snapshot.body_count(),
            "snapshot written"
        );
        Ok(index)
    }

    pub fn load_latest(&self) -> Result<WorldSnapshot, StoreError> {
        if self.meta.snapshot_count == 0 {
            return Err(StoreError::NoSnapshots);
        }
        self.load(self.meta.snapshot_count)
    }

    pub fn load(&self, index: u32) -> Result<WorldSnapshot, StoreError> {
        if index == 0 || index > self.meta.snapshot_count {
            return Err(StoreError::UnknownSnapshot(index));
        }
        let filename = Self::file_name(index);
        let compressed = std::fs::read(self.root.join("snapshots").join(&filename))?;
        self.verify_file_hash(&filename, &compressed)?;
        Ok(codec::unpack(&compressed)?)
    }

    /// Check the chain links and every file hash.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }
            let data = std::fs::read(self.root.join("snapshots").join(&entry.filename))?;
            let actual = sha256_hex(&data);
            if actual != entry.sha256 {
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), StoreError> {
        let actual = sha256_hex(data);
        match self.manifest.entry(filename) {
            Some(entry) if entry.sha256 == actual => Ok(()),
            Some(entry) => Err(StoreError::IntegrityMismatch {
                file: filename.to_string(),
                expected: entry.sha256.clone(),
                actual,
            }),
            None => Err(StoreError::IntegrityMismatch {
                file: filename.to_string(),
                expected: "a manifest entry".into(),
                actual,
            }),
        }
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.meta)?;
        codec::write_atomic(&self.root.join(META_FILE), &json)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.manifest)?;
        codec::write_atomic(&self.root.join("integrity").join(MANIFEST_FILE), &json)?;
        Ok(())
    }
}
