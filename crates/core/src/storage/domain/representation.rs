use serde::{Deserialize, Serialize};

use crate::shared::facial_area::FacialArea;

/// One enrolled face sample. Never modified after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub identity: String,
    /// `None` marks an entry whose embedding was lost; it never matches.
    pub embedding: Option<Vec<f32>>,
    pub facial_area: FacialArea,
    #[serde(alias = "count")]
    pub observation_count: u32,
}

impl Representation {
    pub fn new(identity: impl Into<String>, embedding: Vec<f32>, facial_area: FacialArea) -> Self {
        Self {
            identity: identity.into(),
            embedding: Some(embedding),
            facial_area,
            observation_count: 0,
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.embedding.as_ref().map(Vec::len)
    }
}
