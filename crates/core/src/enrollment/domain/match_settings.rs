use serde::{Deserialize, Serialize};

use crate::matching::domain::distance_metric::DistanceMetric;
use crate::matching::domain::threshold_policy::resolve_threshold;
use crate::shared::config_key::ConfigKey;
use crate::shared::constants::DEFAULT_CROP_PADDING;
use crate::shared::error::{FaceIdError, Result};

/// Everything that steers a match: which partition, how to measure, how
/// close is close enough, and how much context to keep around saved faces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSettings {
    pub key: ConfigKey,
    pub metric: DistanceMetric,
    pub threshold_override: Option<f64>,
    pub crop_padding: f64,
}

impl MatchSettings {
    /// Effective threshold for these settings.
    pub fn threshold(&self) -> Result<f64> {
        resolve_threshold(self.key.model, self.metric, self.threshold_override)
    }

    pub fn validate(&self) -> Result<()> {
        self.threshold()?;
        if !(0.0..=1.0).contains(&self.crop_padding) {
            return Err(FaceIdError::configuration(format!(
                "crop padding must be between 0.0 and 1.0, got {}",
                self.crop_padding
            )));
        }
        Ok(())
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            key: ConfigKey::default(),
            metric: DistanceMetric::default(),
            threshold_override: None,
            crop_padding: DEFAULT_CROP_PADDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let settings = MatchSettings::default();
        assert!(settings.validate().is_ok());
        assert_relative_eq!(settings.threshold().unwrap(), 0.40);
    }

    #[test]
    fn test_override_wins() {
        let settings = MatchSettings {
            threshold_override: Some(0.3),
            ..Default::default()
        };
        assert_relative_eq!(settings.threshold().unwrap(), 0.3);
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn test_rejects_bad_padding(#[case] padding: f64) {
        let settings = MatchSettings {
            crop_padding: padding,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let settings = MatchSettings {
            threshold_override: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate().unwrap_err(),
            FaceIdError::Configuration(_)
        ));
    }
}
