use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::enrollment::domain::embedding_provider::{largest_face, Detection, EmbeddingProvider};
use crate::enrollment::domain::enrollment_decision::{decide, Decision, MatchOutcome};
use crate::enrollment::domain::enrollment_session::{EnrollmentSession, SessionState};
use crate::enrollment::domain::identity_generator::{
    fresh_identity, IdentityGenerator, UuidIdentityGenerator,
};
use crate::enrollment::domain::match_settings::MatchSettings;
use crate::enrollment::domain::session_message::{MatchSummary, SessionRequest, SessionResponse};
use crate::enrollment::enrollment_logger::EnrollmentLogger;
use crate::imaging::face_image_archive::FaceImageArchive;
use crate::matching::domain::match_resolver::{resolve, resolve_batch, MatchCandidate};
use crate::shared::error::{FaceIdError, Result};
use crate::shared::facial_area::FacialArea;
use crate::shared::frame::Frame;
use crate::storage::domain::representation::Representation;
use crate::storage::representation_store::RepresentationStore;

/// Candidates for one detected face.
#[derive(Clone, Debug, Serialize)]
pub struct FaceMatches {
    pub facial_area: FacialArea,
    pub confidence: f64,
    pub candidates: Vec<MatchCandidate>,
}

/// Turns one image into a match-or-enroll decision and carries it out.
///
/// Shared by every session; per-session state lives in
/// [`EnrollmentSession`]. For a new identity the canonical face image is
/// written before the representation is appended, so a failed append never
/// leaves a representation without its image.
pub struct EnrollmentProtocol {
    store: Arc<RepresentationStore>,
    provider: Box<dyn EmbeddingProvider>,
    archive: FaceImageArchive,
    identities: Box<dyn IdentityGenerator>,
    settings: MatchSettings,
    threshold: f64,
}

impl EnrollmentProtocol {
    pub fn new(
        store: Arc<RepresentationStore>,
        provider: Box<dyn EmbeddingProvider>,
        archive: FaceImageArchive,
        settings: MatchSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let threshold = settings.threshold()?;
        Ok(Self {
            store,
            provider,
            archive,
            identities: Box::new(UuidIdentityGenerator),
            settings,
            threshold,
        })
    }

    pub fn with_identity_generator(mut self, identities: Box<dyn IdentityGenerator>) -> Self {
        self.identities = identities;
        self
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn store(&self) -> &RepresentationStore {
        &self.store
    }

    pub fn archive(&self) -> &FaceImageArchive {
        &self.archive
    }

    /// Handles one session message. Errors become error responses; the
    /// session is back in `AwaitingImage` either way.
    pub fn process(
        &self,
        session: &mut EnrollmentSession,
        request: &SessionRequest,
        logger: &mut dyn EnrollmentLogger,
    ) -> SessionResponse {
        let start = Instant::now();
        if let Some(level) = request.level {
            session.set_level(level);
        }
        if request.hint_identity.is_some() {
            session.set_identity_hint(request.hint_identity.clone());
        }

        session.advance(SessionState::Matching);
        let mut response = match self.step(session, &request.frame, logger) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Session message failed: {e}");
                logger.outcome("error");
                SessionResponse::failed(&e)
            }
        };
        session.reset();

        response.processing_time_ms = elapsed_ms(start);
        response
    }

    /// Matches every face in `frame` without touching the store.
    pub fn find(&self, frame: &Frame, logger: &mut dyn EnrollmentLogger) -> Result<Vec<FaceMatches>> {
        let detections = self.detect(frame, logger)?;
        if detections.is_empty() {
            return Err(FaceIdError::Extraction("no face detected".into()));
        }

        let t = Instant::now();
        let entries = self.store.load(&self.settings.key)?;
        let queries: Vec<Vec<f32>> = detections.iter().map(|d| d.embedding.clone()).collect();
        let thresholds = vec![self.threshold; queries.len()];
        let results = resolve_batch(&queries, &entries, self.settings.metric, &thresholds)?;
        logger.timing("match", elapsed_ms(t));

        Ok(detections
            .into_iter()
            .zip(results)
            .map(|(d, candidates)| FaceMatches {
                facial_area: d.facial_area,
                confidence: d.confidence,
                candidates,
            })
            .collect())
    }

    /// Adds the largest face in `frame` under a caller-chosen identity.
    pub fn enroll_as(
        &self,
        identity: &str,
        frame: &Frame,
        logger: &mut dyn EnrollmentLogger,
    ) -> Result<Representation> {
        // Extract first: a provider may hold per-frame state until it is asked.
        let face = self.extract(frame, logger)?;
        self.archive.path_for(identity)?;
        let representation = self.persist(identity, frame, face, logger)?;
        logger.outcome("enrolled_as");
        Ok(representation)
    }

    fn step(
        &self,
        session: &mut EnrollmentSession,
        frame: &Frame,
        logger: &mut dyn EnrollmentLogger,
    ) -> Result<SessionResponse> {
        let face = self.extract(frame, logger)?;

        let t = Instant::now();
        let entries = self.store.load(&self.settings.key)?;
        let candidates = resolve(&face.embedding, &entries, self.settings.metric, self.threshold)?;
        logger.timing("match", elapsed_ms(t));
        logger.metric("candidates", candidates.len() as f64);
        log::debug!(
            "{} of {} representations within {:.3} ({})",
            candidates.len(),
            entries.len(),
            self.threshold,
            self.settings.metric
        );

        let outcome = MatchOutcome::from_candidates(&candidates);
        session.advance(match outcome {
            MatchOutcome::Matched(_) => SessionState::Matched,
            MatchOutcome::Unmatched => SessionState::Unmatched,
        });

        let mut response = SessionResponse {
            matches: candidates.iter().map(MatchSummary::from).collect(),
            ..Default::default()
        };

        match decide(&outcome, session.level(), session.identity_hint()) {
            Decision::AdoptExisting { identity } => {
                session.advance(SessionState::ResolvedExisting);
                logger.outcome("resolved_existing");
                response.identity = Some(identity);
            }
            Decision::NoIdentity => {
                logger.outcome("no_identity");
            }
            Decision::EnrollNew => {
                session.advance(SessionState::ResolvedNew);
                let hint = session.identity_hint().map(str::to_owned);
                let identity = self.enroll_fresh(frame, face, hint.as_deref(), logger)?;
                session.advance(SessionState::Persisted);
                logger.outcome("resolved_new");
                response.identity = Some(identity);
                response.enrolled = true;
            }
            Decision::ForceReenroll { matched } => {
                session.advance(SessionState::ForcedReenroll);
                let identity = self.enroll_fresh(frame, face, Some(&matched), logger)?;
                session.advance(SessionState::Persisted);
                logger.outcome("forced_reenroll");
                log::info!("Re-enrolled face previously matched as {matched} under {identity}");
                response.identity = Some(identity);
                response.enrolled = true;
            }
        }

        Ok(response)
    }

    fn detect(&self, frame: &Frame, logger: &mut dyn EnrollmentLogger) -> Result<Vec<Detection>> {
        let t = Instant::now();
        let detections = self
            .provider
            .represent(frame, &self.settings.key)
            .map_err(|e| FaceIdError::Extraction(e.to_string()))?;
        logger.timing("extract", elapsed_ms(t));
        logger.metric("faces", detections.len() as f64);

        if let Some(d) = detections.iter().find(|d| d.embedding.is_empty()) {
            return Err(FaceIdError::Extraction(format!(
                "provider returned an empty embedding for {:?}",
                d.facial_area
            )));
        }
        Ok(detections)
    }

    fn extract(&self, frame: &Frame, logger: &mut dyn EnrollmentLogger) -> Result<Detection> {
        let detections = self.detect(frame, logger)?;
        largest_face(&detections)
            .cloned()
            .ok_or_else(|| FaceIdError::Extraction("no face detected".into()))
    }

    fn enroll_fresh(
        &self,
        frame: &Frame,
        face: Detection,
        hint: Option<&str>,
        logger: &mut dyn EnrollmentLogger,
    ) -> Result<String> {
        let taken: HashSet<String> = self
            .store
            .identities(&self.settings.key)?
            .into_iter()
            .collect();
        let identity = fresh_identity(&*self.identities, &taken, hint)?;
        self.persist(&identity, frame, face, logger)?;
        Ok(identity)
    }

    fn persist(
        &self,
        identity: &str,
        frame: &Frame,
        face: Detection,
        logger: &mut dyn EnrollmentLogger,
    ) -> Result<Representation> {
        let t = Instant::now();
        self.archive
            .save(identity, frame, &face.facial_area, self.settings.crop_padding)?;

        let representation = Representation::new(identity, face.embedding, face.facial_area);
        self.store
            .append(representation.clone(), &self.settings.key)?;
        logger.timing("persist", elapsed_ms(t));
        Ok(representation)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
