//! On-disk layout of a store partition.
//!
//! Current layout: `{"version": 1, "representations": [...]}`. A bare array
//! of entries (the layout before versioning) is still readable. Entries are
//! checked for required fields before being decoded, so a truncated record
//! is reported as corruption instead of silently defaulting.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::constants::STORE_FORMAT_VERSION;
use crate::shared::error::{FaceIdError, Result};
use crate::storage::domain::representation::Representation;

/// Each inner slice lists accepted spellings of one required field.
const REQUIRED_FIELDS: &[&[&str]] = &[
    &["identity"],
    &["embedding"],
    &["facial_area"],
    &["observation_count", "count"],
];

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    representations: &'a [Representation],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Versioned {
        version: u32,
        representations: Vec<Value>,
    },
    Legacy(Vec<Value>),
}

pub fn encode(path: &Path, entries: &[Representation]) -> Result<Vec<u8>> {
    serde_json::to_vec(&StoreFileRef {
        version: STORE_FORMAT_VERSION,
        representations: entries,
    })
    .map_err(|e| FaceIdError::Persistence {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

pub fn decode(path: &Path, bytes: &[u8]) -> Result<Vec<Representation>> {
    let corrupt = |message: String| FaceIdError::StoreCorrupt {
        path: path.to_path_buf(),
        message,
    };

    let file: StoreFile = serde_json::from_slice(bytes)
        .map_err(|e| corrupt(format!("unreadable store file: {e}")))?;

    let raw = match file {
        StoreFile::Versioned {
            version,
            representations,
        } => {
            if version != STORE_FORMAT_VERSION {
                return Err(corrupt(format!("unsupported store version {version}")));
            }
            representations
        }
        StoreFile::Legacy(representations) => representations,
    };

    raw.into_iter()
        .enumerate()
        .map(|(i, value)| {
            let missing = missing_fields(&value);
            if !missing.is_empty() {
                return Err(corrupt(format!(
                    "entry {i} is missing required fields {missing:?}; consider deleting {}",
                    path.display()
                )));
            }
            serde_json::from_value(value).map_err(|e| corrupt(format!("entry {i}: {e}")))
        })
        .collect()
}

fn missing_fields(value: &Value) -> Vec<&'static str> {
    let Some(object) = value.as_object() else {
        return REQUIRED_FIELDS.iter().map(|names| names[0]).collect();
    };
    REQUIRED_FIELDS
        .iter()
        .filter(|names| !names.iter().any(|name| object.contains_key(*name)))
        .map(|names| names[0])
        .collect()
}
