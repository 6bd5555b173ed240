//! Raw shape of a rule-definition document, as read from JSON or YAML.
//!
//! Every field is optional here so that validation can report all missing
//! fields with their positions instead of stopping at the first serde error.
//! A field holding the wrong type is reported at its path while decoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A breakpoint table: one standard/edition worth of rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetDef {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Named drug classes that override entries may target.
    #[serde(default)]
    pub drug_classes: BTreeMap<String, Vec<String>>,
    /// Cross-cutting override table, consulted after per-rule exceptions.
    #[serde(default)]
    pub overrides: Vec<OverrideDef>,
    #[serde(default)]
    pub rules: Vec<BreakpointRuleDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedDef {
    #[serde(default)]
    pub name: Option<String>,
}

/// One organism/antibiotic/method breakpoint entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakpointRuleDef {
    #[serde(default)]
    pub organism: Option<NamedDef>,
    #[serde(default)]
    pub antibiotic: Option<NamedDef>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub mic: Option<MicBlockDef>,
    #[serde(default)]
    pub disc: Option<DiscBlockDef>,
    #[serde(default)]
    pub exceptions: Vec<OverrideDef>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MicBlockDef {
    #[serde(default)]
    pub susceptible_max: Option<NumberDef>,
    #[serde(default)]
    pub intermediate_range: Option<RangeDef>,
    #[serde(default)]
    pub resistant_min: Option<NumberDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscBlockDef {
    #[serde(default)]
    pub susceptible_min: Option<NumberDef>,
    #[serde(default)]
    pub intermediate_range: Option<RangeDef>,
    #[serde(default)]
    pub resistant_max: Option<NumberDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeDef {
    #[serde(default)]
    pub low: Option<NumberDef>,
    #[serde(default)]
    pub high: Option<NumberDef>,
}

/// A numeric field, written either as a bare number or as a quoted
/// decimal string (`"0.25"`) for exact precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberDef {
    Number(f64),
    Text(String),
}

impl fmt::Display for NumberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberDef::Number(n) => write!(f, "{n}"),
            NumberDef::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// An override entry, either per-rule (`exceptions`) or global (`overrides`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverrideDef {
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub antibiotic: Option<String>,
    #[serde(default)]
    pub drug_class: Option<String>,
    #[serde(default)]
    pub exempt: Vec<String>,
    /// `force` or `review`.
    #[serde(default)]
    pub outcome: Option<String>,
    /// Forced category (`S`, `I` or `R`) when `outcome` is `force`.
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}
