use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::error::FaceIdError;

/// Facial recognition networks whose embeddings the engine knows how to
/// compare. Each has a fixed embedding length and a published threshold set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecognitionModel {
    VggFace,
    Facenet,
    Facenet512,
    OpenFace,
    DeepFace,
    DeepId,
    Dlib,
    ArcFace,
    SFace,
    GhostFaceNet,
}

impl RecognitionModel {
    pub const ALL: [RecognitionModel; 10] = [
        Self::VggFace,
        Self::Facenet,
        Self::Facenet512,
        Self::OpenFace,
        Self::DeepFace,
        Self::DeepId,
        Self::Dlib,
        Self::ArcFace,
        Self::SFace,
        Self::GhostFaceNet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::VggFace => "VGG-Face",
            Self::Facenet => "Facenet",
            Self::Facenet512 => "Facenet512",
            Self::OpenFace => "OpenFace",
            Self::DeepFace => "DeepFace",
            Self::DeepId => "DeepID",
            Self::Dlib => "Dlib",
            Self::ArcFace => "ArcFace",
            Self::SFace => "SFace",
            Self::GhostFaceNet => "GhostFaceNet",
        }
    }

    /// Embedding length produced by the network.
    pub fn dimension(&self) -> usize {
        match self {
            Self::VggFace | Self::DeepFace => 4096,
            Self::Facenet | Self::OpenFace | Self::Dlib | Self::SFace => 128,
            Self::Facenet512 | Self::ArcFace | Self::GhostFaceNet => 512,
            Self::DeepId => 160,
        }
    }
}

impl fmt::Display for RecognitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecognitionModel {
    type Err = FaceIdError;

    /// Case-insensitive; hyphens are ignored so `vggface` and `VGG-Face`
    /// name the same model.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold(s);
        Self::ALL
            .into_iter()
            .find(|m| fold(m.name()) == wanted)
            .ok_or_else(|| FaceIdError::configuration(format!("unsupported model '{s}'")))
    }
}

fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}
