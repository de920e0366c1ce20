//! Durable key-value storage for trained models

mod file;

pub use file::{compute_checksum, FileStore};

use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Key under which serialized network weights are stored
pub const WEIGHTS_KEY: &str = "risk-model/weights";

/// Key under which model metadata is stored
pub const METADATA_KEY: &str = "risk-model/metadata";

/// Byte store for model weights and metadata
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Fetch the bytes stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the bytes stored under `key`
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

/// In-process store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(key).map(|(_, v)| v)
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }
}
