use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::shared::config_key::ConfigKey;
use crate::shared::error::{FaceIdError, Result};
use crate::storage::domain::representation::Representation;
use crate::storage::domain::store_backend::StoreBackend;

/// Immutable view of a partition at one point in time.
pub type Snapshot = Arc<Vec<Representation>>;

#[derive(Default)]
struct Partition {
    /// `None` until the partition is first read from the backend.
    entries: Option<Snapshot>,
}

/// Enrolled representations, partitioned by configuration key.
///
/// Each partition is cached in memory after its first load and guarded by
/// its own mutex; loads and appends for the same key are serialized while
/// different keys proceed independently. An append only becomes visible in
/// memory after the backend has durably written the new set.
pub struct RepresentationStore {
    backend: Box<dyn StoreBackend>,
    partitions: Mutex<HashMap<String, Arc<Mutex<Partition>>>>,
}

impl RepresentationStore {
    pub fn new(backend: Box<dyn StoreBackend>) -> Self {
        Self {
            backend,
            partitions: Mutex::new(HashMap::new()),
        }
    }

    /// All representations for `key`, in insertion order.
    ///
    /// An absent partition is created empty and persisted.
    pub fn load(&self, key: &ConfigKey) -> Result<Snapshot> {
        let partition = self.partition(key);
        let mut guard = lock(&partition);
        self.ensure_loaded(key, &mut guard)
    }

    /// Persists `representation` as the last entry of the partition.
    pub fn append(&self, representation: Representation, key: &ConfigKey) -> Result<()> {
        let partition = self.partition(key);
        let mut guard = lock(&partition);
        let current = self.ensure_loaded(key, &mut guard)?;

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(representation);
        validate(&next, Some(key.model.dimension()))?;

        self.backend.write(key, &next)?;
        log::info!(
            "Appended representation for {} to {} ({} entries)",
            next[next.len() - 1].identity,
            key,
            next.len()
        );
        guard.entries = Some(Arc::new(next));
        Ok(())
    }

    /// Distinct identities in order of first enrollment.
    pub fn identities(&self, key: &ConfigKey) -> Result<Vec<String>> {
        let snapshot = self.load(key)?;
        let mut seen = HashSet::new();
        Ok(snapshot
            .iter()
            .filter(|r| seen.insert(r.identity.as_str()))
            .map(|r| r.identity.clone())
            .collect())
    }

    pub fn len(&self, key: &ConfigKey) -> Result<usize> {
        Ok(self.load(key)?.len())
    }

    pub fn location(&self, key: &ConfigKey) -> PathBuf {
        self.backend.location(key)
    }

    fn partition(&self, key: &ConfigKey) -> Arc<Mutex<Partition>> {
        let mut partitions = lock(&self.partitions);
        Arc::clone(partitions.entry(key.store_name()).or_default())
    }

    fn ensure_loaded(&self, key: &ConfigKey, partition: &mut Partition) -> Result<Snapshot> {
        if let Some(entries) = &partition.entries {
            return Ok(Arc::clone(entries));
        }

        let entries = match self.backend.read(key)? {
            Some(entries) => {
                validate(&entries, Some(key.model.dimension()))?;
                entries
            }
            None => {
                self.backend.write(key, &[])?;
                log::info!("Created empty store at {}", self.location(key).display());
                Vec::new()
            }
        };

        let snapshot = Arc::new(entries);
        partition.entries = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Every embedding must share one dimension, equal to `expected` when given,
/// and contain only finite values.
pub fn validate(entries: &[Representation], expected: Option<usize>) -> Result<()> {
    let mut dimension = expected;
    for (i, entry) in entries.iter().enumerate() {
        let Some(embedding) = &entry.embedding else {
            continue;
        };
        match dimension {
            Some(d) if d != embedding.len() => {
                return Err(FaceIdError::configuration(format!(
                    "entry {i} ({}) has {} dimensions, expected {d}",
                    entry.identity,
                    embedding.len()
                )));
            }
            Some(_) => {}
            None => dimension = Some(embedding.len()),
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(FaceIdError::configuration(format!(
                "entry {i} ({}) has non-finite embedding values",
                entry.identity
            )));
        }
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Partition state is only replaced after a successful write, so a
    // panic while holding the lock cannot leave it half-updated.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
