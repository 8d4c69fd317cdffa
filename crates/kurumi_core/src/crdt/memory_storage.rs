//! In-memory storage implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::storage::{DocumentStorage, StorageResult};
use crate::error::KurumiError;

/// In-memory document storage.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// inspect what the store persisted. Data is lost when the last clone drops.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    /// Document snapshots (name -> binary state)
    docs: Arc<RwLock<HashMap<String, Vec<u8>>>>,

    /// Number of successful saves
    saves: Arc<RwLock<u64>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_doc` calls so far.
    pub fn save_count(&self) -> u64 {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }
}

fn poisoned() -> KurumiError {
    KurumiError::Storage("memory storage lock poisoned".to_string())
}

impl DocumentStorage for MemoryStorage {
    fn load_doc(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let docs = self.docs.read().map_err(|_| poisoned())?;
        Ok(docs.get(name).cloned())
    }

    fn save_doc(&self, name: &str, state: &[u8]) -> StorageResult<()> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.insert(name.to_string(), state.to_vec());
        let mut saves = self.saves.write().map_err(|_| poisoned())?;
        *saves += 1;
        Ok(())
    }

    fn delete_doc(&self, name: &str) -> StorageResult<()> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.remove(name);
        Ok(())
    }
}
