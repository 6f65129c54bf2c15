//! The storage contract and its required in-memory fallback. A durable
//! backend is an external collaborator — only the interface and a
//! process-local memory implementation live in this crate.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::error::{Error, Result};

/// The on-disk/at-rest shape of one persisted index: an
/// `{id, data: {documents, indexState, config}, timestamp}` record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub id: String,
    pub data: serde_json::Value,
    pub timestamp: u64,
}

/// A small, byte-addressable key-value contract. A durable implementation
/// (outside this crate's scope) and the in-memory fallback both satisfy it.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn initialize(&mut self) -> Result<()>;
    async fn store_index(&mut self, name: &str, blob: Vec<u8>) -> Result<()>;
    async fn get_index(&self, name: &str) -> Result<Option<Vec<u8>>>;
    async fn update_metadata(&mut self, config: &IndexConfig) -> Result<()>;
    async fn clear_indices(&mut self) -> Result<()>;
    async fn delete_index(&mut self, name: &str) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// In-process map-backed storage. Used both as the engine's fallback when a
/// configured durable backend fails to initialize, and directly when the
/// caller configures `StorageConfig::Memory`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    indices: HashMap<String, Vec<u8>>,
    metadata: HashMap<String, IndexConfig>,
    closed: bool,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::storage("storage handle is closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn initialize(&mut self) -> Result<()> {
        self.closed = false;
        Ok(())
    }

    async fn store_index(&mut self, name: &str, blob: Vec<u8>) -> Result<()> {
        self.check_open()?;
        self.indices.insert(name.to_string(), blob);
        Ok(())
    }

    async fn get_index(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.indices.get(name).cloned())
    }

    async fn update_metadata(&mut self, config: &IndexConfig) -> Result<()> {
        self.check_open()?;
        self.metadata.insert(config.name.clone(), config.clone());
        Ok(())
    }

    async fn clear_indices(&mut self) -> Result<()> {
        self.check_open()?;
        self.indices.clear();
        self.metadata.clear();
        Ok(())
    }

    async fn delete_index(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        self.indices.remove(name);
        self.metadata.remove(name);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
