use crate::matching::domain::distance_metric::DistanceMetric;
use crate::shared::error::{FaceIdError, Result};
use crate::shared::recognition_model::RecognitionModel;

/// Published per-model tuning: the largest distance at which two embeddings
/// are still considered the same person.
pub fn default_threshold(model: RecognitionModel, metric: DistanceMetric) -> f64 {
    let (cosine, euclidean, euclidean_l2) = match model {
        RecognitionModel::VggFace => (0.68, 1.17, 1.17),
        RecognitionModel::Facenet => (0.40, 10.0, 0.80),
        RecognitionModel::Facenet512 => (0.30, 23.56, 1.04),
        RecognitionModel::OpenFace => (0.10, 0.55, 0.55),
        RecognitionModel::DeepFace => (0.23, 64.0, 0.64),
        RecognitionModel::DeepId => (0.015, 45.0, 0.17),
        RecognitionModel::Dlib => (0.07, 0.6, 0.4),
        RecognitionModel::ArcFace => (0.68, 4.15, 1.13),
        RecognitionModel::SFace => (0.593, 10.734, 1.055),
        RecognitionModel::GhostFaceNet => (0.65, 35.71, 1.10),
    };
    match metric {
        DistanceMetric::Cosine => cosine,
        DistanceMetric::Euclidean => euclidean,
        DistanceMetric::EuclideanL2 => euclidean_l2,
    }
}

/// Caller override wins when present; zero is a legal (exact-match) override.
pub fn resolve_threshold(
    model: RecognitionModel,
    metric: DistanceMetric,
    threshold_override: Option<f64>,
) -> Result<f64> {
    match threshold_override {
        Some(t) if t.is_nan() || t < 0.0 => Err(FaceIdError::configuration(format!(
            "threshold must be non-negative, got {t}"
        ))),
        Some(t) => Ok(t),
        None => Ok(default_threshold(model, metric)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(RecognitionModel::Facenet, DistanceMetric::Cosine, 0.40)]
    #[case(RecognitionModel::Facenet512, DistanceMetric::Cosine, 0.30)]
    #[case(RecognitionModel::VggFace, DistanceMetric::EuclideanL2, 1.17)]
    #[case(RecognitionModel::ArcFace, DistanceMetric::Euclidean, 4.15)]
    #[case(RecognitionModel::DeepId, DistanceMetric::Cosine, 0.015)]
    fn test_default_threshold(
        #[case] model: RecognitionModel,
        #[case] metric: DistanceMetric,
        #[case] expected: f64,
    ) {
        assert_relative_eq!(default_threshold(model, metric), expected);
    }

    #[test]
    fn test_every_default_is_positive() {
        for model in RecognitionModel::ALL {
            for metric in DistanceMetric::ALL {
                assert!(default_threshold(model, metric) > 0.0, "{model} {metric}");
            }
        }
    }

    #[test]
    fn test_override_wins() {
        let t = resolve_threshold(RecognitionModel::Facenet, DistanceMetric::Cosine, Some(0.3));
        assert_relative_eq!(t.unwrap(), 0.3);
    }

    #[test]
    fn test_zero_override_is_honored() {
        let t = resolve_threshold(RecognitionModel::Facenet, DistanceMetric::Cosine, Some(0.0));
        assert_relative_eq!(t.unwrap(), 0.0);
    }

    #[test]
    fn test_missing_override_uses_default() {
        let t = resolve_threshold(RecognitionModel::Facenet, DistanceMetric::EuclideanL2, None);
        assert_relative_eq!(t.unwrap(), 0.80);
    }

    #[rstest]
    #[case(-0.1)]
    #[case(f64::NAN)]
    fn test_invalid_override_is_configuration_error(#[case] value: f64) {
        let err = resolve_threshold(RecognitionModel::Facenet, DistanceMetric::Cosine, Some(value))
            .unwrap_err();
        assert!(matches!(err, FaceIdError::Configuration(_)));
    }
}
