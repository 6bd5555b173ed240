pub mod builtin;
pub mod ruleset;
pub mod schema;
pub mod store;

use crate::classify::outcome::Decision;
use crate::error::{RuleValidationError, SiraError, ValidationIssue};
use crate::model::{Method, Phenotype};
use rust_decimal::Decimal;
use ruleset::{
    Breakpoints, DiscBreakpoints, MicBreakpoints, OverrideEntry, OverrideOutcome, OverrideScope,
    Range, Rule, RuleSet,
};
use schema::{BreakpointRuleDef, NamedDef, NumberDef, OverrideDef, RangeDef, RuleSetDef};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Serialization format of a rule document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml`/`.yml` are YAML, anything else is JSON.
    pub fn from_path(path: &Path) -> DocumentFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

/// Load and validate a rule set from a JSON or YAML file.
pub fn load_ruleset(path: &Path) -> Result<RuleSet, SiraError> {
    let source_name = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| SiraError::RulesetRead {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;
    parse_ruleset(&content, DocumentFormat::from_path(path), &source_name)
}

/// Parse and validate a rule set from document text.
pub fn parse_ruleset(
    text: &str,
    format: DocumentFormat,
    source_name: &str,
) -> Result<RuleSet, SiraError> {
    let def = decode(text, format).map_err(|failure| match failure {
        DecodeFailure::Syntax(reason) => SiraError::RulesetParse {
            source_name: source_name.to_string(),
            reason,
        },
        DecodeFailure::Field(issue) => SiraError::Validation(RuleValidationError {
            source_name: source_name.to_string(),
            issues: vec![issue],
        }),
    })?;
    Ok(validate_ruleset(&def, source_name)?)
}

enum DecodeFailure {
    /// The text is not a well-formed document.
    Syntax(String),
    /// A field holds a value of the wrong type.
    Field(ValidationIssue),
}

fn decode(text: &str, format: DocumentFormat) -> Result<RuleSetDef, DecodeFailure> {
    match format {
        DocumentFormat::Json => {
            let mut de = serde_json::Deserializer::from_str(text);
            let def = serde_path_to_error::deserialize(&mut de).map_err(|err| {
                let is_data = err.inner().classify() == serde_json::error::Category::Data;
                decode_failure(err.path(), is_data, err.inner().to_string())
            })?;
            de.end().map_err(|e| DecodeFailure::Syntax(e.to_string()))?;
            Ok(def)
        }
        DocumentFormat::Yaml => {
            serde_path_to_error::deserialize(serde_yaml::Deserializer::from_str(text))
                .map_err(|err| decode_failure(err.path(), true, err.inner().to_string()))
        }
    }
}

fn decode_failure(path: &serde_path_to_error::Path, is_data: bool, reason: String) -> DecodeFailure {
    if is_data && path.iter().next().is_some() {
        DecodeFailure::Field(ValidationIssue {
            path: path.to_string(),
            problem: format!("wrong type ({reason})"),
        })
    } else {
        DecodeFailure::Syntax(reason)
    }
}

/// Parse a JSON rule set with no file context.
pub fn parse_ruleset_str(json: &str) -> Result<RuleSet, SiraError> {
    parse_ruleset(json, DocumentFormat::Json, "<inline>")
}

/// Check a raw document and build the immutable rule set from it.
///
/// Every issue is collected; nothing is built unless there are none.
pub fn validate_ruleset(def: &RuleSetDef, source_name: &str) -> Result<RuleSet, RuleValidationError> {
    let mut v = Validator::default();

    let version = v.required_text("version", def.version.as_ref());

    let mut drug_classes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (class, members) in &def.drug_classes {
        if class.trim().is_empty() {
            v.issue("drug_classes", "class name must not be empty");
            continue;
        }
        if members.is_empty() {
            v.issue(format!("drug_classes.{class}"), "class must list at least one antibiotic");
        }
        let members: BTreeSet<String> = members
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                v.required_text(&format!("drug_classes.{class}[{i}]"), Some(name))
            })
            .collect();
        drug_classes.insert(class.clone(), members);
    }

    let overrides: Vec<OverrideEntry> = def
        .overrides
        .iter()
        .enumerate()
        .filter_map(|(i, o)| v.override_entry(&format!("overrides[{i}]"), o, &drug_classes))
        .collect();

    if def.rules.is_empty() {
        v.issue("rules", "must contain at least one rule");
    }

    let mut rules = Vec::with_capacity(def.rules.len());
    let mut seen: HashSet<(String, String, Method)> = HashSet::new();
    for (i, rule_def) in def.rules.iter().enumerate() {
        let path = format!("rules[{i}]");
        if let Some(rule) = v.rule(&path, rule_def, &drug_classes) {
            let key = (rule.organism.clone(), rule.antibiotic.clone(), rule.method());
            if !seen.insert(key) {
                v.issue(
                    path,
                    format!(
                        "duplicate rule for {}/{}/{}",
                        rule.organism,
                        rule.antibiotic,
                        rule.method()
                    ),
                );
                continue;
            }
            rules.push(rule);
        }
    }

    match version {
        Some(version) if v.issues.is_empty() => Ok(RuleSet::new(
            version,
            def.name.clone(),
            def.description.clone(),
            rules,
            overrides,
            drug_classes,
            source_name.to_string(),
        )),
        _ => Err(RuleValidationError {
            source_name: source_name.to_string(),
            issues: v.issues,
        }),
    }
}

#[derive(Default)]
struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    fn issue(&mut self, path: impl Into<String>, problem: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            problem: problem.into(),
        });
    }

    fn required_text(&mut self, path: &str, value: Option<&String>) -> Option<String> {
        match value.map(|s| s.trim()) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            Some(_) => {
                self.issue(path, "must not be empty");
                None
            }
            None => {
                self.issue(path, "missing");
                None
            }
        }
    }

    fn required_name(&mut self, path: &str, value: Option<&NamedDef>) -> Option<String> {
        match value {
            Some(named) => self.required_text(&format!("{path}.name"), named.name.as_ref()),
            None => {
                self.issue(path, "missing");
                None
            }
        }
    }

    fn number(&mut self, path: &str, value: Option<&NumberDef>) -> Option<Decimal> {
        let Some(value) = value else {
            self.issue(path, "missing");
            return None;
        };
        let parsed = match value {
            NumberDef::Number(n) if !n.is_finite() => {
                self.issue(path, format!("{value} is not a finite number"));
                return None;
            }
            // f64 Display is the shortest round-trip form and never uses an exponent
            NumberDef::Number(n) => n.to_string().parse::<Decimal>(),
            NumberDef::Text(s) => s.trim().parse::<Decimal>(),
        };
        match parsed {
            Ok(d) => Some(d),
            Err(e) => {
                self.issue(path, format!("{value} is not a valid decimal ({e})"));
                None
            }
        }
    }

    fn range(&mut self, path: &str, value: Option<&RangeDef>) -> Option<Option<Range>> {
        let Some(range) = value else {
            return Some(None);
        };
        let low = self.number(&format!("{path}.low"), range.low.as_ref());
        let high = self.number(&format!("{path}.high"), range.high.as_ref());
        let (low, high) = (low?, high?);
        if low > high {
            self.issue(path, format!("low {low} is greater than high {high}"));
            return None;
        }
        Some(Some(Range { low, high }))
    }

    fn rule(
        &mut self,
        path: &str,
        def: &BreakpointRuleDef,
        classes: &BTreeMap<String, BTreeSet<String>>,
    ) -> Option<Rule> {
        let organism = self.required_name(&format!("{path}.organism"), def.organism.as_ref());
        let antibiotic = self.required_name(&format!("{path}.antibiotic"), def.antibiotic.as_ref());
        let method = self.method(&format!("{path}.method"), def.method.as_ref());
        let breakpoints = method.and_then(|m| self.breakpoints(path, m, def));

        let exceptions: Vec<OverrideEntry> = def
            .exceptions
            .iter()
            .enumerate()
            .filter_map(|(i, o)| self.override_entry(&format!("{path}.exceptions[{i}]"), o, classes))
            .collect();
        if exceptions.len() != def.exceptions.len() {
            return None;
        }

        Some(Rule {
            organism: organism?,
            antibiotic: antibiotic?,
            breakpoints: breakpoints?,
            exceptions,
            note: def.note.clone(),
        })
    }

    fn method(&mut self, path: &str, value: Option<&String>) -> Option<Method> {
        let text = self.required_text(path, value)?;
        let method = Method::from_str_loose(&text);
        if method.is_none() {
            self.issue(path, format!("unsupported method '{text}' (expected MIC or DISC)"));
        }
        method
    }

    fn breakpoints(
        &mut self,
        path: &str,
        method: Method,
        def: &BreakpointRuleDef,
    ) -> Option<Breakpoints> {
        match method {
            Method::Mic => {
                if def.disc.is_some() {
                    self.issue(format!("{path}.disc"), "not allowed for method MIC");
                }
                let Some(block) = def.mic.as_ref() else {
                    self.issue(format!("{path}.mic"), "missing breakpoint block for method MIC");
                    return None;
                };
                let s = self.number(&format!("{path}.mic.susceptible_max"), block.susceptible_max.as_ref());
                let i = self.range(&format!("{path}.mic.intermediate_range"), block.intermediate_range.as_ref());
                let r = self.number(&format!("{path}.mic.resistant_min"), block.resistant_min.as_ref());
                let (s, i, r) = (s?, i?, r?);
                if s >= r {
                    self.issue(
                        format!("{path}.mic"),
                        format!("susceptible_max {s} must be below resistant_min {r}"),
                    );
                    return None;
                }
                if let Some(band) = i {
                    // some value strictly between S and R must fall in the band
                    if band.high <= s || band.low >= r {
                        self.issue(
                            format!("{path}.mic.intermediate_range"),
                            format!(
                                "{}..={} is never reached between susceptible_max {s} and resistant_min {r}",
                                band.low, band.high
                            ),
                        );
                        return None;
                    }
                }
                Some(Breakpoints::Mic(MicBreakpoints {
                    susceptible_max: s,
                    intermediate_range: i,
                    resistant_min: r,
                }))
            }
            Method::Disc => {
                if def.mic.is_some() {
                    self.issue(format!("{path}.mic"), "not allowed for method DISC");
                }
                let Some(block) = def.disc.as_ref() else {
                    self.issue(format!("{path}.disc"), "missing breakpoint block for method DISC");
                    return None;
                };
                let s = self.number(&format!("{path}.disc.susceptible_min"), block.susceptible_min.as_ref());
                let i = self.range(&format!("{path}.disc.intermediate_range"), block.intermediate_range.as_ref());
                let r = self.number(&format!("{path}.disc.resistant_max"), block.resistant_max.as_ref());
                let (s, i, r) = (s?, i?, r?);
                if s <= r {
                    self.issue(
                        format!("{path}.disc"),
                        format!("susceptible_min {s} must be above resistant_max {r}"),
                    );
                    return None;
                }
                if let Some(band) = i {
                    if band.high <= r || band.low >= s {
                        self.issue(
                            format!("{path}.disc.intermediate_range"),
                            format!(
                                "{}..={} is never reached between resistant_max {r} and susceptible_min {s}",
                                band.low, band.high
                            ),
                        );
                        return None;
                    }
                }
                Some(Breakpoints::Disc(DiscBreakpoints {
                    susceptible_min: s,
                    intermediate_range: i,
                    resistant_max: r,
                }))
            }
        }
    }

    fn override_entry(
        &mut self,
        path: &str,
        def: &OverrideDef,
        classes: &BTreeMap<String, BTreeSet<String>>,
    ) -> Option<OverrideEntry> {
        let flag = self
            .required_text(&format!("{path}.flag"), def.flag.as_ref())
            .and_then(|name| {
                let flag = Phenotype::from_str_loose(&name);
                if flag.is_none() {
                    self.issue(format!("{path}.flag"), format!("unrecognized feature flag '{name}'"));
                }
                flag
            });

        let scope = match (&def.antibiotic, &def.drug_class) {
            (Some(ab), None) if !ab.trim().is_empty() => Some(OverrideScope::Antibiotic(ab.trim().to_string())),
            (None, Some(class)) => {
                if classes.contains_key(class.as_str()) {
                    Some(OverrideScope::DrugClass(class.clone()))
                } else {
                    self.issue(format!("{path}.drug_class"), format!("undeclared drug class '{class}'"));
                    None
                }
            }
            (Some(_), Some(_)) => {
                self.issue(path, "set either antibiotic or drug_class, not both");
                None
            }
            _ => {
                self.issue(path, "missing antibiotic or drug_class scope");
                None
            }
        };

        let outcome = self.outcome(path, def);
        let rationale = self.required_text(&format!("{path}.rationale"), def.rationale.as_ref());

        Some(OverrideEntry {
            flag: flag?,
            scope: scope?,
            exempt: def.exempt.iter().map(|s| s.trim().to_string()).collect(),
            outcome: outcome?,
            rationale: rationale?,
        })
    }

    fn outcome(&mut self, path: &str, def: &OverrideDef) -> Option<OverrideOutcome> {
        let kind = self.required_text(&format!("{path}.outcome"), def.outcome.as_ref())?;
        match kind.to_ascii_lowercase().as_str() {
            "force" => {
                let text = self.required_text(&format!("{path}.decision"), def.decision.as_ref())?;
                match Decision::category_from_str(&text) {
                    Some(d) => Some(OverrideOutcome::ForceDecision(d)),
                    None => {
                        self.issue(
                            format!("{path}.decision"),
                            format!("forced decision must be S, I or R (got '{text}')"),
                        );
                        None
                    }
                }
            }
            "review" => {
                if def.decision.is_some() {
                    self.issue(format!("{path}.decision"), "not allowed when outcome is review");
                    return None;
                }
                Some(OverrideOutcome::ForceReview)
            }
            other => {
                self.issue(
                    format!("{path}.outcome"),
                    format!("unknown outcome '{other}' (expected force or review)"),
                );
                None
            }
        }
    }
}
