use crate::model::{MethodTag, Phenotype};
use crate::trace::TraceStep;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clinical category assigned to a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "I")]
    Intermediate,
    #[serde(rename = "R")]
    Resistant,
    /// Not enough data to decide (missing value, value between bands).
    #[serde(rename = "AMBIGUOUS")]
    Ambiguous,
    /// A human must decide.
    #[serde(rename = "REVIEW")]
    Review,
}

impl Decision {
    pub fn code(&self) -> &'static str {
        match self {
            Decision::Susceptible => "S",
            Decision::Intermediate => "I",
            Decision::Resistant => "R",
            Decision::Ambiguous => "AMBIGUOUS",
            Decision::Review => "REVIEW",
        }
    }

    /// True for both codes that need a person to look at the case.
    pub fn is_review_category(&self) -> bool {
        matches!(self, Decision::Ambiguous | Decision::Review)
    }

    /// Parse one of the three clinical categories (`S`, `I`, `R`).
    pub fn category_from_str(s: &str) -> Option<Decision> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" | "SUSCEPTIBLE" => Some(Decision::Susceptible),
            "I" | "INTERMEDIATE" => Some(Decision::Intermediate),
            "R" | "RESISTANT" => Some(Decision::Resistant),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The numeric input that decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UsedValue {
    Mic(Decimal),
    DiscZoneMm(Decimal),
}

impl fmt::Display for UsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsedValue::Mic(v) => write!(f, "MIC {v}"),
            UsedValue::DiscZoneMm(v) => write!(f, "zone {v} mm"),
        }
    }
}

/// Outcome of classifying one measurement. Owned by the caller; holds no
/// reference back to the rule set that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub organism: String,
    pub antibiotic: String,
    pub method: Option<MethodTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specimen_id: Option<String>,
    /// Numeric input that drove the decision; `None` when an override or an
    /// early check decided without it.
    pub value_used: Option<UsedValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Phenotype>,
    pub decision: Decision,
    pub reason: String,
    pub ruleset_version: String,
    /// Position of the matched rule in the rule document.
    pub rule_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceStep>,
}
