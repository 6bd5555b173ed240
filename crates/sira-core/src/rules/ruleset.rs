use crate::classify::outcome::Decision;
use crate::model::{Method, Phenotype};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A validated, immutable breakpoint table.
///
/// Only produced by [`crate::rules::validate_ruleset`]; once published it is
/// shared behind an `Arc` and never edited. A reload builds a new one.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    version: String,
    name: Option<String>,
    description: Option<String>,
    rules: Vec<Rule>,
    overrides: Vec<OverrideEntry>,
    drug_classes: BTreeMap<String, BTreeSet<String>>,
    provenance: Provenance,
    #[serde(skip)]
    index: RuleIndex,
}

/// organism -> antibiotic -> method -> position in `rules`.
type RuleIndex = HashMap<String, HashMap<String, HashMap<Method, usize>>>;

/// Where a rule set came from and when it was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
}

impl RuleSet {
    pub(crate) fn new(
        version: String,
        name: Option<String>,
        description: Option<String>,
        rules: Vec<Rule>,
        overrides: Vec<OverrideEntry>,
        drug_classes: BTreeMap<String, BTreeSet<String>>,
        source: String,
    ) -> RuleSet {
        let mut index = RuleIndex::new();
        for (i, r) in rules.iter().enumerate() {
            index
                .entry(r.organism.clone())
                .or_default()
                .entry(r.antibiotic.clone())
                .or_default()
                .insert(r.method(), i);
        }

        RuleSet {
            version,
            name,
            description,
            rules,
            overrides,
            drug_classes,
            provenance: Provenance {
                source,
                loaded_at: Utc::now(),
            },
            index,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Global override table.
    pub fn overrides(&self) -> &[OverrideEntry] {
        &self.overrides
    }

    pub fn drug_classes(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.drug_classes
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Exact-match lookup. Returns the rule and its position in the document.
    pub fn find_rule(
        &self,
        organism: &str,
        antibiotic: &str,
        method: Method,
    ) -> Option<(usize, &Rule)> {
        let i = *self.index.get(organism)?.get(antibiotic)?.get(&method)?;
        Some((i, &self.rules[i]))
    }

    /// True if `antibiotic` is listed in the named drug class.
    pub fn class_contains(&self, class: &str, antibiotic: &str) -> bool {
        self.drug_classes
            .get(class)
            .map(|members| members.contains(antibiotic))
            .unwrap_or(false)
    }
}

/// One organism/antibiotic/method breakpoint definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub organism: String,
    pub antibiotic: String,
    pub breakpoints: Breakpoints,
    pub exceptions: Vec<OverrideEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Rule {
    pub fn method(&self) -> Method {
        self.breakpoints.method()
    }
}

/// Method-specific thresholds. The variant is the rule's method, so a rule
/// cannot carry a block that disagrees with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum Breakpoints {
    Mic(MicBreakpoints),
    Disc(DiscBreakpoints),
}

impl Breakpoints {
    pub fn method(&self) -> Method {
        match self {
            Breakpoints::Mic(_) => Method::Mic,
            Breakpoints::Disc(_) => Method::Disc,
        }
    }
}

/// MIC thresholds: low concentrations are susceptible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicBreakpoints {
    pub susceptible_max: Decimal,
    pub intermediate_range: Option<Range>,
    pub resistant_min: Decimal,
}

/// Disc diffusion thresholds in mm: large zones are susceptible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscBreakpoints {
    pub susceptible_min: Decimal,
    pub intermediate_range: Option<Range>,
    pub resistant_max: Decimal,
}

/// Closed interval, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub low: Decimal,
    pub high: Decimal,
}

impl Range {
    pub fn contains(&self, value: Decimal) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Which antibiotics an override entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideScope {
    Antibiotic(String),
    DrugClass(String),
}

/// What an override does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideOutcome {
    /// Report this category regardless of the measured value.
    ForceDecision(Decision),
    /// Send the case to a human even if the value is unambiguous.
    ForceReview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideEntry {
    pub flag: Phenotype,
    pub scope: OverrideScope,
    pub exempt: BTreeSet<String>,
    pub outcome: OverrideOutcome,
    /// May contain `{flag}` and `{antibiotic}` placeholders.
    pub rationale: String,
}

impl OverrideEntry {
    pub fn render_rationale(&self, antibiotic: &str) -> String {
        self.rationale
            .replace("{flag}", &self.flag.to_string())
            .replace("{antibiotic}", antibiotic)
    }
}
