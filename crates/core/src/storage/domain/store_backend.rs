use std::path::PathBuf;

use crate::shared::config_key::ConfigKey;
use crate::shared::error::Result;
use crate::storage::domain::representation::Representation;

/// Durable home of store partitions.
///
/// The whole partition is the unit of persistence: reads return every entry,
/// writes replace every entry. A write must be all-or-nothing so a crash
/// mid-write leaves the previous contents readable.
pub trait StoreBackend: Send + Sync {
    /// Returns `None` when the partition has never been persisted.
    fn read(&self, key: &ConfigKey) -> Result<Option<Vec<Representation>>>;

    fn write(&self, key: &ConfigKey, entries: &[Representation]) -> Result<()>;

    /// Human-readable location of the partition, for logs and error messages.
    fn location(&self, key: &ConfigKey) -> PathBuf;
}
