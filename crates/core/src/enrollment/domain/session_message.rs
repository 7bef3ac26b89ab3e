use serde::{Deserialize, Serialize};

use crate::enrollment::domain::enrollment_session::RecognitionLevel;
use crate::matching::domain::match_resolver::MatchCandidate;
use crate::shared::error::FaceIdError;
use crate::shared::facial_area::FacialArea;
use crate::shared::frame::Frame;

/// One inbound session message.
///
/// `level` and `hint_identity`, when present, replace the session's policy
/// for this and later messages.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub frame: Frame,
    pub level: Option<RecognitionLevel>,
    pub hint_identity: Option<String>,
}

impl SessionRequest {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            level: None,
            hint_identity: None,
        }
    }

    pub fn with_level(mut self, level: RecognitionLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint_identity = Some(hint.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub identity: String,
    pub facial_area: FacialArea,
    pub distance: f64,
}

impl From<&MatchCandidate> for MatchSummary {
    fn from(c: &MatchCandidate) -> Self {
        Self {
            identity: c.identity.clone(),
            facial_area: c.facial_area,
            distance: c.distance,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionError {
    pub kind: String,
    pub message: String,
}

impl From<&FaceIdError> for SessionError {
    fn from(e: &FaceIdError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// One outbound session message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub matches: Vec<MatchSummary>,
    pub enrolled: bool,
    pub identity: Option<String>,
    pub error: Option<SessionError>,
    pub processing_time_ms: f64,
}

impl SessionResponse {
    pub fn failed(error: &FaceIdError) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
