use crate::classify::outcome::Decision;
use crate::error::SiraError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a missing disc zone diameter is surfaced under the DISC method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// Same ambiguous code used for a missing MIC value.
    #[default]
    Ambiguous,
    /// Distinct "send for human review" code.
    Review,
}

impl MissingValuePolicy {
    pub fn decision(&self) -> Decision {
        match self {
            MissingValuePolicy::Ambiguous => Decision::Ambiguous,
            MissingValuePolicy::Review => Decision::Review,
        }
    }
}

/// What to do with feature flag names that are not a known phenotype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFlagPolicy {
    /// Drop the flag and log a warning.
    #[default]
    Warn,
    /// Refuse the measurement.
    Reject,
}

/// Engine behaviour switches. Everything else is fixed by the rule set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub missing_disc: MissingValuePolicy,
    pub unknown_flags: UnknownFlagPolicy,
}

impl EngineOptions {
    /// Load options from a JSON or YAML file (chosen by extension).
    pub fn load(path: &Path) -> Result<EngineOptions, SiraError> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        if is_yaml {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }
}
