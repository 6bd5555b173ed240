use crate::error::SiraError;
use crate::rules::ruleset::RuleSet;
use crate::rules::{parse_ruleset, DocumentFormat};

const DEMO_JSON: &str = include_str!("../../../../rules/demo.json");

/// Available predefined rulesets.
pub const PRESETS: &[&str] = &["demo"];

/// Raw document text of a preset.
pub fn preset_text(name: &str) -> Result<&'static str, SiraError> {
    match name {
        "demo" => Ok(DEMO_JSON),
        _ => Err(SiraError::UnknownPreset {
            name: name.to_string(),
            available: PRESETS.join(", "),
        }),
    }
}

/// Load and validate a predefined ruleset by name.
pub fn load_preset(name: &str) -> Result<RuleSet, SiraError> {
    let text = preset_text(name)?;
    parse_ruleset(text, DocumentFormat::Json, &format!("preset:{name}"))
}
