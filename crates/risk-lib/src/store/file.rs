//! Filesystem-backed model store
//!
//! Each key maps to one file under the root directory plus a `.sha256`
//! sidecar holding the hex digest of its contents. Writes go to a temp
//! file that is synced and renamed into place.

use super::ModelStore;
use crate::error::StoreError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Hex-encoded SHA-256 of `data`
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Stores each key as a file under `root`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains("..") || key.contains('\\') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key.replace('/', "__")))
    }

    fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            key: key.to_string(),
            source,
        }
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let temp_path = with_suffix(path, ".tmp");
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn sidecar(path: &Path) -> PathBuf {
    with_suffix(path, ".sha256")
}

#[async_trait]
impl ModelStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(key)(e)),
        };

        match tokio::fs::read_to_string(sidecar(&path)).await {
            Ok(expected) => {
                let expected = expected.trim().to_string();
                let actual = compute_checksum(&bytes);
                if expected != actual {
                    return Err(StoreError::Corrupt {
                        key: key.to_string(),
                        expected,
                        actual,
                    });
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key, "No checksum stored, skipping verification");
            }
            Err(e) => return Err(Self::io_error(key)(e)),
        }

        debug!(key, bytes = bytes.len(), "Read stored entry");
        Ok(Some(bytes))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(Self::io_error(key))?;

        let checksum = compute_checksum(&bytes);
        Self::write_atomic(&path, &bytes)
            .await
            .map_err(Self::io_error(key))?;
        Self::write_atomic(&sidecar(&path), checksum.as_bytes())
            .await
            .map_err(Self::io_error(key))?;

        debug!(key, bytes = bytes.len(), checksum = %checksum, "Stored entry");
        Ok(())
    }
}
