use crate::model::{FeatureFlags, Phenotype};
use crate::rules::ruleset::{OverrideEntry, OverrideScope, Rule, RuleSet};
use crate::trace::{Trace, TraceStepType};
use std::fmt;

/// Which table an override came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideLayer {
    Rule,
    Global,
}

impl fmt::Display for OverrideLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideLayer::Rule => write!(f, "rule exception"),
            OverrideLayer::Global => write!(f, "global override"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FiredOverride<'a> {
    pub flag: Phenotype,
    pub entry: &'a OverrideEntry,
    pub layer: OverrideLayer,
}

enum Coverage {
    Covered,
    Exempt,
    OutOfScope,
}

fn coverage(entry: &OverrideEntry, antibiotic: &str, ruleset: &RuleSet) -> Coverage {
    let in_scope = match &entry.scope {
        OverrideScope::Antibiotic(name) => name == antibiotic,
        OverrideScope::DrugClass(class) => ruleset.class_contains(class, antibiotic),
    };
    if !in_scope {
        Coverage::OutOfScope
    } else if entry.exempt.contains(antibiotic) {
        Coverage::Exempt
    } else {
        Coverage::Covered
    }
}

/// Find the first override that fires for the set flags.
///
/// Flags are taken in phenotype order; for each flag the rule's own
/// exceptions are searched before the global table.
pub(crate) fn find_override<'a>(
    flags: &FeatureFlags,
    antibiotic: &str,
    rule: &'a Rule,
    ruleset: &'a RuleSet,
    trace: &mut Trace,
) -> Option<FiredOverride<'a>> {
    for flag in flags.iter() {
        let layers = [
            (OverrideLayer::Rule, rule.exceptions.as_slice()),
            (OverrideLayer::Global, ruleset.overrides()),
        ];
        for (layer, entries) in layers {
            for entry in entries.iter().filter(|e| e.flag == flag) {
                match coverage(entry, antibiotic, ruleset) {
                    Coverage::Covered => {
                        trace.step(
                            TraceStepType::OverrideCheck,
                            format!("{flag} {layer} applies to {antibiotic}"),
                        );
                        return Some(FiredOverride { flag, entry, layer });
                    }
                    Coverage::Exempt => trace.step(
                        TraceStepType::OverrideCheck,
                        format!("{antibiotic} is exempt from {flag} {layer}"),
                    ),
                    Coverage::OutOfScope => {}
                }
            }
        }
        trace.step(
            TraceStepType::OverrideCheck,
            format!("no {flag} override for {antibiotic}"),
        );
    }
    None
}
