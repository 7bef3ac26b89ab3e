use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::error::FaceIdError;

/// Session policy: whether an unknown face is registered automatically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionLevel {
    /// Only report existing identities.
    #[default]
    Strict,
    /// Register unknown faces under a fresh identity.
    AutoEnroll,
}

impl RecognitionLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::AutoEnroll => "auto_enroll",
        }
    }
}

impl fmt::Display for RecognitionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecognitionLevel {
    type Err = FaceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(Self::Strict),
            "auto_enroll" => Ok(Self::AutoEnroll),
            _ => Err(FaceIdError::configuration(format!(
                "unknown level '{s}' (expected strict or auto_enroll)"
            ))),
        }
    }
}

/// Where a session is in handling its current message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingImage,
    Matching,
    Matched,
    Unmatched,
    ResolvedExisting,
    ResolvedNew,
    ForcedReenroll,
    Persisted,
}

impl SessionState {
    /// Forward edges of the protocol. Any state may fall back to
    /// `AwaitingImage`, which is how both completion and failure end a step.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (_, AwaitingImage)
                | (AwaitingImage, Matching)
                | (Matching, Matched | Unmatched)
                | (Matched, ResolvedExisting | ForcedReenroll)
                | (Unmatched, ResolvedNew)
                | (ResolvedNew | ForcedReenroll, Persisted)
        )
    }
}

/// Transient per-connection state.
#[derive(Clone, Debug)]
pub struct EnrollmentSession {
    level: RecognitionLevel,
    identity_hint: Option<String>,
    state: SessionState,
}

impl EnrollmentSession {
    pub fn new(level: RecognitionLevel) -> Self {
        Self {
            level,
            identity_hint: None,
            state: SessionState::AwaitingImage,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.identity_hint = Some(hint.into());
        self
    }

    pub fn level(&self) -> RecognitionLevel {
        self.level
    }

    pub fn set_level(&mut self, level: RecognitionLevel) {
        self.level = level;
    }

    pub fn identity_hint(&self) -> Option<&str> {
        self.identity_hint.as_deref()
    }

    pub fn set_identity_hint(&mut self, hint: Option<String>) {
        self.identity_hint = hint;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {:?} -> {next:?}",
            self.state
        );
        log::trace!("session {:?} -> {next:?}", self.state);
        self.state = next;
    }

    pub(crate) fn reset(&mut self) {
        self.advance(SessionState::AwaitingImage);
    }
}

impl Default for EnrollmentSession {
    fn default() -> Self {
        Self::new(RecognitionLevel::default())
    }
}
