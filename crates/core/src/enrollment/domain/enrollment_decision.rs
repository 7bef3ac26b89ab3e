use crate::enrollment::domain::enrollment_session::RecognitionLevel;
use crate::matching::domain::match_resolver::MatchCandidate;

/// Result of matching one face against the store.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    /// Nearest candidate within threshold.
    Matched(MatchCandidate),
    Unmatched,
}

impl MatchOutcome {
    /// Candidates must already be ranked nearest first.
    pub fn from_candidates(candidates: &[MatchCandidate]) -> Self {
        match candidates.first() {
            Some(best) => Self::Matched(best.clone()),
            None => Self::Unmatched,
        }
    }
}

/// What the session does with a match outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Report an existing identity, no write.
    AdoptExisting { identity: String },
    /// Report nothing, no write.
    NoIdentity,
    /// Register the face under a fresh identity.
    EnrollNew,
    /// The caller already holds `matched`; register a fresh sample under a
    /// new identity distinct from it.
    ForceReenroll { matched: String },
}

impl Decision {
    pub fn writes(&self) -> bool {
        matches!(self, Self::EnrollNew | Self::ForceReenroll { .. })
    }
}

pub fn decide(outcome: &MatchOutcome, level: RecognitionLevel, hint: Option<&str>) -> Decision {
    match (level, outcome) {
        (RecognitionLevel::Strict, MatchOutcome::Matched(best)) => Decision::AdoptExisting {
            identity: best.identity.clone(),
        },
        (RecognitionLevel::Strict, MatchOutcome::Unmatched) => Decision::NoIdentity,
        (RecognitionLevel::AutoEnroll, MatchOutcome::Unmatched) => Decision::EnrollNew,
        (RecognitionLevel::AutoEnroll, MatchOutcome::Matched(best)) => {
            if hint == Some(best.identity.as_str()) {
                Decision::ForceReenroll {
                    matched: best.identity.clone(),
                }
            } else {
                Decision::AdoptExisting {
                    identity: best.identity.clone(),
                }
            }
        }
    }
}
