use crate::classify::outcome::{ClassificationResult, Decision, UsedValue};
use crate::classify::overrides::{self, FiredOverride};
use crate::config::EngineOptions;
use crate::model::{Measurement, MethodTag};
use crate::rules::ruleset::{
    Breakpoints, DiscBreakpoints, MicBreakpoints, OverrideOutcome, Rule, RuleSet,
};
use crate::trace::{Trace, TraceStepType};
use rust_decimal::Decimal;

/// Classify one measurement against a rule set snapshot.
///
/// Total and pure: ambiguity is reported through the decision, never as an
/// error, and the same inputs always give the same result.
pub fn classify(
    measurement: &Measurement,
    ruleset: &RuleSet,
    options: &EngineOptions,
) -> ClassificationResult {
    let mut trace = Trace::default();
    let verdict = evaluate(measurement, ruleset, options, &mut trace);

    ClassificationResult {
        organism: measurement.organism.clone(),
        antibiotic: measurement.antibiotic.clone(),
        method: measurement.method.clone(),
        specimen_id: measurement.specimen_id.clone(),
        value_used: verdict.value_used,
        flags: measurement.flags.iter().collect(),
        decision: verdict.decision,
        reason: verdict.reason,
        ruleset_version: ruleset.version().to_string(),
        rule_index: verdict.rule_index,
        trace: trace.into_steps(),
    }
}

/// Classify a batch against one snapshot.
pub fn classify_all(
    measurements: &[Measurement],
    ruleset: &RuleSet,
    options: &EngineOptions,
) -> Vec<ClassificationResult> {
    measurements
        .iter()
        .map(|m| classify(m, ruleset, options))
        .collect()
}

struct Verdict {
    decision: Decision,
    reason: String,
    value_used: Option<UsedValue>,
    rule_index: Option<usize>,
}

impl Verdict {
    fn new(decision: Decision, reason: String) -> Self {
        Verdict {
            decision,
            reason,
            value_used: None,
            rule_index: None,
        }
    }
}

fn evaluate(
    m: &Measurement,
    ruleset: &RuleSet,
    options: &EngineOptions,
    trace: &mut Trace,
) -> Verdict {
    let method = match &m.method {
        Some(MethodTag::Known(method)) => *method,
        Some(MethodTag::Unrecognized(tag)) => {
            trace.step(TraceStepType::MethodCheck, format!("method '{tag}' not recognized"));
            return Verdict::new(Decision::Review, format!("Unsupported method '{tag}'"));
        }
        None => {
            trace.step(TraceStepType::MethodCheck, "no method given");
            return Verdict::new(
                Decision::Review,
                "Unsupported method: no method given".to_string(),
            );
        }
    };
    trace.step(TraceStepType::MethodCheck, format!("method {method}"));

    let Some((index, rule)) = ruleset.find_rule(&m.organism, &m.antibiotic, method) else {
        tracing::debug!(
            organism = %m.organism,
            antibiotic = %m.antibiotic,
            %method,
            version = ruleset.version(),
            "no matching breakpoint rule"
        );
        trace.step(TraceStepType::RuleLookup, "no rule matched");
        return Verdict::new(
            Decision::Review,
            format!("No matching rule for {}/{}/{}", m.organism, m.antibiotic, method),
        );
    };
    trace.step(
        TraceStepType::RuleLookup,
        format!("matched rules[{index}] {}/{}/{}", rule.organism, rule.antibiotic, method),
    );

    let mut verdict =
        match overrides::find_override(&m.flags, &m.antibiotic, rule, ruleset, trace) {
            Some(fired) => apply_override(fired, &m.antibiotic),
            None => evaluate_breakpoints(m, rule, index, options, trace),
        };
    verdict.rule_index = Some(index);
    verdict
}

fn apply_override(fired: FiredOverride<'_>, antibiotic: &str) -> Verdict {
    let FiredOverride { flag, entry, layer } = fired;
    let rationale = entry.render_rationale(antibiotic);
    tracing::debug!(%flag, %antibiotic, %layer, "override fired");
    match entry.outcome {
        OverrideOutcome::ForceDecision(decision) => Verdict::new(
            decision,
            format!("{flag} flag: {layer} forces {decision} for {antibiotic} ({rationale})"),
        ),
        OverrideOutcome::ForceReview => Verdict::new(
            Decision::Review,
            format!("{flag} flag: {layer} requires review for {antibiotic} ({rationale})"),
        ),
    }
}

fn evaluate_breakpoints(
    m: &Measurement,
    rule: &Rule,
    index: usize,
    options: &EngineOptions,
    trace: &mut Trace,
) -> Verdict {
    let rule_label = format!("rules[{index}] {}/{}/{}", rule.organism, rule.antibiotic, rule.method());

    let (value, outcome) = match &rule.breakpoints {
        Breakpoints::Mic(bp) => {
            let Some(v) = m.mic_value else {
                trace.step(TraceStepType::ValueCheck, "MIC value missing");
                return Verdict::new(
                    Decision::Ambiguous,
                    format!("MIC value missing for {rule_label}"),
                );
            };
            (UsedValue::Mic(v), compare_mic(v, bp))
        }
        Breakpoints::Disc(bp) => {
            let Some(v) = m.disc_zone_mm else {
                trace.step(TraceStepType::ValueCheck, "disc zone diameter missing");
                let decision = options.missing_disc.decision();
                let reason = match decision {
                    Decision::Review => format!(
                        "Disc zone diameter missing for {rule_label}; sent for human review"
                    ),
                    _ => format!("Disc zone diameter missing for {rule_label}"),
                };
                return Verdict::new(decision, reason);
            };
            (UsedValue::DiscZoneMm(v), compare_disc(v, bp))
        }
    };

    let (decision, detail) = outcome;
    trace.step(TraceStepType::ThresholdCompare, detail.clone());
    Verdict {
        decision,
        reason: format!("{detail} ({rule_label})"),
        value_used: Some(value),
        rule_index: Some(index),
    }
}

/// Low MICs are susceptible. The S and R thresholds are checked before the
/// intermediate band so they win when a value sits on a shared edge.
fn compare_mic(v: Decimal, bp: &MicBreakpoints) -> (Decision, String) {
    if v <= bp.susceptible_max {
        return (
            Decision::Susceptible,
            format!("MIC {v} <= susceptible_max {}", bp.susceptible_max),
        );
    }
    if v >= bp.resistant_min {
        return (
            Decision::Resistant,
            format!("MIC {v} >= resistant_min {}", bp.resistant_min),
        );
    }
    match bp.intermediate_range {
        Some(range) if range.contains(v) => (
            Decision::Intermediate,
            format!(
                "MIC {v} within intermediate_range {}..={}",
                range.low, range.high
            ),
        ),
        _ => (
            Decision::Ambiguous,
            format!(
                "MIC {v} is above susceptible_max {} and below resistant_min {} but outside any intermediate_range",
                bp.susceptible_max, bp.resistant_min
            ),
        ),
    }
}

/// Large zones are susceptible; same precedence as [`compare_mic`].
fn compare_disc(v: Decimal, bp: &DiscBreakpoints) -> (Decision, String) {
    if v >= bp.susceptible_min {
        return (
            Decision::Susceptible,
            format!("zone {v} mm >= susceptible_min {}", bp.susceptible_min),
        );
    }
    if v <= bp.resistant_max {
        return (
            Decision::Resistant,
            format!("zone {v} mm <= resistant_max {}", bp.resistant_max),
        );
    }
    match bp.intermediate_range {
        Some(range) if range.contains(v) => (
            Decision::Intermediate,
            format!(
                "zone {v} mm within intermediate_range {}..={}",
                range.low, range.high
            ),
        ),
        _ => (
            Decision::Ambiguous,
            format!(
                "zone {v} mm is below susceptible_min {} and above resistant_max {} but outside any intermediate_range",
                bp.susceptible_min, bp.resistant_max
            ),
        ),
    }
}
