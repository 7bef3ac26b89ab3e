//! Detections computed ahead of time by an external model.
//!
//! Each image `photo.jpg` may have a sidecar `photo.jpg.faces.json` holding a
//! JSON array of `{embedding, facial_area, confidence}` objects (the shape a
//! represent call of the usual face libraries returns). Frames are matched
//! to their detections by content fingerprint.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::enrollment::domain::embedding_provider::{Detection, EmbeddingProvider};
use crate::imaging::domain::image_reader::ImageReader;
use crate::shared::config_key::ConfigKey;
use crate::shared::constants::DETECTIONS_SIDECAR_SUFFIX;
use crate::shared::frame::Frame;

/// Detections for one frame content, and how many reads of it are still
/// waiting for a `represent` call.
struct Pending {
    detections: Vec<Detection>,
    reads: usize,
}

/// Serves detections registered for specific frames. Clones share the
/// registry.
///
/// Each `insert` is consumed by one `represent`; an entry is dropped once
/// every registration of its frame has been served.
#[derive(Clone, Default)]
pub struct PrecomputedEmbeddingProvider {
    detections: Arc<Mutex<HashMap<u64, Pending>>>,
}

impl PrecomputedEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, frame: &Frame, detections: Vec<Detection>) {
        let mut registry = self.detections.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = registry.entry(fingerprint(frame)).or_insert(Pending {
            detections: Vec::new(),
            reads: 0,
        });
        pending.detections = detections;
        pending.reads += 1;
    }

    /// Frames registered but not yet served.
    pub fn pending(&self) -> usize {
        self.detections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Registers the detections stored next to `image_path` for `frame`.
    pub fn load_sidecar(
        &self,
        image_path: &Path,
        frame: &Frame,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let path = sidecar_path(image_path);
        let bytes = std::fs::read(&path)
            .map_err(|e| format!("no detections at {}: {e}", path.display()))?;
        let detections: Vec<Detection> = serde_json::from_slice(&bytes)
            .map_err(|e| format!("invalid detections in {}: {e}", path.display()))?;
        let count = detections.len();
        self.insert(frame, detections);
        Ok(count)
    }
}

impl EmbeddingProvider for PrecomputedEmbeddingProvider {
    fn represent(
        &self,
        frame: &Frame,
        _key: &ConfigKey,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let key = fingerprint(frame);
        let mut registry = self.detections.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = registry
            .get_mut(&key)
            .ok_or("no precomputed detections for this image")?;
        pending.reads -= 1;
        if pending.reads > 0 {
            return Ok(pending.detections.clone());
        }
        let done = registry
            .remove(&key)
            .ok_or("no precomputed detections for this image")?;
        Ok(done.detections)
    }
}

/// Image reader that also loads each image's sidecar into a provider.
pub struct SidecarImageReader {
    inner: Box<dyn ImageReader>,
    provider: PrecomputedEmbeddingProvider,
}

impl SidecarImageReader {
    pub fn new(inner: Box<dyn ImageReader>, provider: PrecomputedEmbeddingProvider) -> Self {
        Self { inner, provider }
    }
}

impl ImageReader for SidecarImageReader {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let frame = self.inner.read(path)?;
        let count = self.provider.load_sidecar(path, &frame)?;
        log::debug!("Loaded {count} detections for {}", path.display());
        Ok(frame)
    }
}

pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let mut name = image_path.as_os_str().to_owned();
    name.push(".");
    name.push(DETECTIONS_SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn fingerprint(frame: &Frame) -> u64 {
    let mut hasher = DefaultHasher::new();
    (frame.width(), frame.height(), frame.channels()).hash(&mut hasher);
    frame.data().hash(&mut hasher);
    hasher.finish()
}
