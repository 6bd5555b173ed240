use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum SiraError {
    #[error("failed to read rule document {source_name}: {reason}")]
    RulesetRead { source_name: String, reason: String },

    #[error("failed to parse rule document {source_name}: {reason}")]
    RulesetParse { source_name: String, reason: String },

    #[error(transparent)]
    Validation(#[from] RuleValidationError),

    #[error("unknown preset '{name}'. Available: {available}")]
    UnknownPreset { name: String, available: String },

    #[error("unrecognized feature flag '{0}'")]
    UnrecognizedFlag(String),

    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A single problem found while validating a rule document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Position of the offending field, e.g. `rules[3].antibiotic.name`.
    pub path: String,
    pub problem: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problem)
    }
}

/// A rule document was readable but not acceptable. Carries every issue
/// found, in document order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rule document {source_name}: {}", render_issues(.issues))]
pub struct RuleValidationError {
    pub source_name: String,
    pub issues: Vec<ValidationIssue>,
}

impl RuleValidationError {
    /// True if any issue is located inside the rule at `index`.
    pub fn mentions_rule(&self, index: usize) -> bool {
        let prefix = format!("rules[{index}]");
        self.issues.iter().any(|i| i.path.starts_with(&prefix))
    }
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
