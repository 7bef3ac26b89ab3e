use serde::{Deserialize, Serialize};

use crate::shared::config_key::ConfigKey;
use crate::shared::facial_area::FacialArea;
use crate::shared::frame::Frame;

/// One face found by the provider, with its embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub embedding: Vec<f32>,
    pub facial_area: FacialArea,
    #[serde(default, alias = "face_confidence")]
    pub confidence: f64,
}

/// Domain interface for face detection plus embedding extraction.
///
/// The detector and model named by `key` must be the ones that produced the
/// embeddings already stored under that key.
pub trait EmbeddingProvider: Send + Sync {
    fn represent(
        &self,
        frame: &Frame,
        key: &ConfigKey,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}

/// The detection with the largest box; the first one wins ties.
pub fn largest_face(detections: &[Detection]) -> Option<&Detection> {
    detections.iter().reduce(|best, d| {
        if d.facial_area.area() > best.facial_area.area() {
            d
        } else {
            best
        }
    })
}
