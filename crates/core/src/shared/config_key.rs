use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_DETECTOR, DEFAULT_NORMALIZATION};
use crate::shared::recognition_model::RecognitionModel;

/// Identifies one store partition: embeddings are only comparable when
/// produced by the same model, detector, alignment, normalization and
/// expansion settings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    pub model: RecognitionModel,
    pub detector: String,
    pub align: bool,
    pub normalization: String,
    pub expand_percentage: u32,
}

impl ConfigKey {
    pub fn new(
        model: RecognitionModel,
        detector: impl Into<String>,
        align: bool,
        normalization: impl Into<String>,
        expand_percentage: u32,
    ) -> Self {
        Self {
            model,
            detector: detector.into(),
            align,
            normalization: normalization.into(),
            expand_percentage,
        }
    }

    /// Deterministic partition name.
    ///
    /// Fixed field order, `_` separator, lower-case, hyphens removed:
    /// `ds_model_facenet_detector_retinaface_aligned_normalization_base_expand_0`.
    pub fn store_name(&self) -> String {
        let parts = [
            "ds",
            "model",
            self.model.name(),
            "detector",
            &self.detector,
            if self.align { "aligned" } else { "unaligned" },
            "normalization",
            &self.normalization,
            "expand",
            &self.expand_percentage.to_string(),
        ];
        parts.join("_").replace('-', "").to_lowercase()
    }
}

impl Default for ConfigKey {
    fn default() -> Self {
        Self::new(
            RecognitionModel::Facenet,
            DEFAULT_DETECTOR,
            true,
            DEFAULT_NORMALIZATION,
            0,
        )
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.store_name())
    }
}
