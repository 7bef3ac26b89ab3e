use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::shared::config_key::ConfigKey;
use crate::shared::constants::{APP_DIR_NAME, STORE_FILE_EXTENSION};
use crate::shared::error::{FaceIdError, Result};
use crate::storage::domain::representation::Representation;
use crate::storage::domain::store_backend::StoreBackend;
use crate::storage::infrastructure::store_file;

/// One JSON file per partition inside a directory.
///
/// Writes go to a temp file in the same directory, are fsynced, then renamed
/// over the old file, so readers only ever see a complete partition.
pub struct JsonStoreBackend {
    dir: PathBuf,
}

impl JsonStoreBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &ConfigKey) -> PathBuf {
        self.dir
            .join(format!("{}.{STORE_FILE_EXTENSION}", key.store_name()))
    }
}

/// Platform data directory for stores and face images.
///
/// - macOS: `~/Library/Application Support/faceid/`
/// - Linux: `$XDG_DATA_HOME/faceid/` or `~/.local/share/faceid/`
/// - Windows: `%APPDATA%/faceid/`
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME))
}

impl StoreBackend for JsonStoreBackend {
    fn read(&self, key: &ConfigKey) -> Result<Option<Vec<Representation>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| FaceIdError::StoreCorrupt {
            path: path.clone(),
            message: format!("unreadable: {e}"),
        })?;
        store_file::decode(&path, &bytes).map(Some)
    }

    fn write(&self, key: &ConfigKey, entries: &[Representation]) -> Result<()> {
        let path = self.path_for(key);
        let persistence = |source: std::io::Error| FaceIdError::Persistence {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(persistence)?;
        let bytes = store_file::encode(&path, entries)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(persistence)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writer.write_all(&bytes).map_err(persistence)?;
            writer.flush().map_err(persistence)?;
        }
        tmp.as_file().sync_all().map_err(persistence)?;
        tmp.persist(&path).map_err(|e| persistence(e.error))?;

        log::debug!("Persisted {} representations to {}", entries.len(), path.display());
        Ok(())
    }

    fn location(&self, key: &ConfigKey) -> PathBuf {
        self.path_for(key)
    }
}
