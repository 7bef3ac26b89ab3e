use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy for matching and enrollment.
///
/// Every variant is recoverable per message: a session that receives one
/// keeps running and the caller may resubmit.
#[derive(Error, Debug)]
pub enum FaceIdError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("store {path} is corrupt: {message}")]
    StoreCorrupt { path: PathBuf, message: String },
    #[error("embedding extraction failed: {0}")]
    Extraction(String),
    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image error: {0}")]
    Image(String),
}

impl FaceIdError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short machine-readable tag used in session responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::StoreCorrupt { .. } => "store_corrupt",
            Self::Extraction(_) => "extraction",
            Self::Persistence { .. } => "persistence",
            Self::Image(_) => "image",
        }
    }
}

pub type Result<T> = std::result::Result<T, FaceIdError>;
