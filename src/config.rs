//! Harness-wide configuration loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bias::{FormatBiasConfig, LengthBiasConfig};
use crate::consistency::ConsistencyConfig;
use crate::judge::JudgeSettings;
use crate::pairwise::PairwiseConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub judge: JudgeSettings,
    pub length_bias: LengthBiasConfig,
    pub format_bias: FormatBiasConfig,
    pub pairwise: PairwiseConfig,
    pub consistency: ConsistencyConfig,
}

impl HarnessConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("length_bias.detection_threshold", self.length_bias.detection_threshold)?;
        unit_interval("format_bias.detection_threshold", self.format_bias.detection_threshold)?;
        unit_interval("pairwise.confidence_gap", self.pairwise.confidence_gap)?;

        if self.consistency.repetitions == 0 {
            return Err(ConfigError::Invalid(
                "consistency.repetitions must be at least 1".into(),
            ));
        }
        if self.judge.model.trim().is_empty() {
            return Err(ConfigError::Invalid("judge.model must not be empty".into()));
        }
        let t = self.judge.temperature;
        if !(0.0..=2.0).contains(&t) {
            return Err(ConfigError::Invalid(format!(
                "judge.temperature must be in [0, 2], got {t}"
            )));
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}
