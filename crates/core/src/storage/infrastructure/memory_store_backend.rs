use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::shared::config_key::ConfigKey;
use crate::shared::error::Result;
use crate::storage::domain::representation::Representation;
use crate::storage::domain::store_backend::StoreBackend;

/// Volatile backend. Clones share the same partitions, which lets several
/// stores observe one another's writes.
#[derive(Clone, Default)]
pub struct MemoryStoreBackend {
    partitions: Arc<Mutex<HashMap<String, Vec<Representation>>>>,
}

impl MemoryStoreBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryStoreBackend {
    fn read(&self, key: &ConfigKey) -> Result<Option<Vec<Representation>>> {
        let partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.get(&key.store_name()).cloned())
    }

    fn write(&self, key: &ConfigKey, entries: &[Representation]) -> Result<()> {
        let mut partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        partitions.insert(key.store_name(), entries.to_vec());
        Ok(())
    }

    fn location(&self, key: &ConfigKey) -> PathBuf {
        PathBuf::from(format!("memory://{}", key.store_name()))
    }
}
