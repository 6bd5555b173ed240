use sira_core::error::SiraError;
use sira_core::rules::builtin;
use sira_core::rules::ruleset::{
    Breakpoints, OverrideEntry, OverrideOutcome, OverrideScope, Range, RuleSet,
};
use std::path::Path;

pub fn list() -> Result<(), SiraError> {
    println!("Available predefined rulesets:\n");
    for name in builtin::PRESETS {
        let rs = builtin::load_preset(name)?;
        println!(
            "  {:<8} {} ({})",
            name,
            rs.name().unwrap_or("unnamed"),
            rs.version()
        );
        if let Some(desc) = rs.description() {
            println!("           {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn explain(preset: &str) -> Result<(), SiraError> {
    let rs = builtin::load_preset(preset)?;

    println!("{} (version {})\n", rs.name().unwrap_or(preset), rs.version());
    if let Some(desc) = rs.description() {
        println!("{}\n", desc);
    }

    println!("Breakpoints ({} rules):\n", rs.rules().len());
    print_breakpoints(&rs);

    if !rs.drug_classes().is_empty() {
        println!("Drug classes:\n");
        for (class, members) in rs.drug_classes() {
            let names: Vec<&str> = members.iter().map(|s| s.as_str()).collect();
            println!("  {:<32} {}", class, names.join(", "));
        }
        println!();
    }

    if !rs.overrides().is_empty() {
        println!("Global overrides (checked after rule exceptions):\n");
        for entry in rs.overrides() {
            println!("  {}", describe_override(entry));
        }
        println!();
    }

    let exceptions: Vec<_> = rs
        .rules()
        .iter()
        .flat_map(|r| r.exceptions.iter().map(move |e| (r, e)))
        .collect();
    if !exceptions.is_empty() {
        println!("Rule exceptions:\n");
        for (rule, entry) in exceptions {
            println!(
                "  {}/{}/{}: {}",
                rule.organism,
                rule.antibiotic,
                rule.method(),
                describe_override(entry)
            );
        }
        println!();
    }

    Ok(())
}

fn print_breakpoints(rs: &RuleSet) {
    let label = |r: &sira_core::rules::ruleset::Rule| format!("{} / {}", r.organism, r.antibiotic);
    let width = rs.rules().iter().map(|r| label(r).len()).max().unwrap_or(20);

    println!(
        "  {:<width$}  {:<6}  {:<10}  {:<12}  {:<10}",
        "Organism / Antibiotic", "Method", "S", "I", "R",
        width = width
    );
    println!("  {}", "-".repeat(width + 48));

    for rule in rs.rules() {
        let (s, i, r) = match &rule.breakpoints {
            Breakpoints::Mic(bp) => (
                format!("<= {}", bp.susceptible_max),
                fmt_range(bp.intermediate_range),
                format!(">= {}", bp.resistant_min),
            ),
            Breakpoints::Disc(bp) => (
                format!(">= {}", bp.susceptible_min),
                fmt_range(bp.intermediate_range),
                format!("<= {}", bp.resistant_max),
            ),
        };
        println!(
            "  {:<width$}  {:<6}  {:<10}  {:<12}  {:<10}",
            label(rule),
            rule.method().to_string(),
            s,
            i,
            r,
            width = width
        );
    }
    println!();
}

fn fmt_range(range: Option<Range>) -> String {
    match range {
        Some(r) if r.low == r.high => r.low.to_string(),
        Some(r) => format!("{}-{}", r.low, r.high),
        None => "-".to_string(),
    }
}

fn describe_override(entry: &OverrideEntry) -> String {
    let scope = match &entry.scope {
        OverrideScope::Antibiotic(name) => name.clone(),
        OverrideScope::DrugClass(class) => format!("class {class}"),
    };
    let outcome = match entry.outcome {
        OverrideOutcome::ForceDecision(d) => format!("force {d}"),
        OverrideOutcome::ForceReview => "send to review".to_string(),
    };
    let exempt = if entry.exempt.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = entry.exempt.iter().map(|s| s.as_str()).collect();
        format!(" (except {})", names.join(", "))
    };
    format!("{} on {}{} -> {}", entry.flag, scope, exempt, outcome)
}

pub fn schema() -> Result<(), SiraError> {
    print!(
        r#"Rule Document Schema
====================

A rule document is a breakpoint table in JSON or YAML (chosen by file
extension: .yaml/.yml is YAML, anything else JSON). Each measurement is
matched exactly on organism, antibiotic and method.

Top-level fields:
  version       (string, required)  Standard and edition, e.g. "EUCAST-2024".
                                    Echoed on every classification result.
  name          (string, optional)  Human-readable name
  description   (string, optional)  What this table is for
  drug_classes  (object, optional)  Map of class name to antibiotic names,
                                    for override entries scoped to a class
  overrides     (array, optional)   Global override entries (see below)
  rules         (array, required)   Breakpoint rules (see below)

Each rule in the "rules" array:
  organism.name    (string, required)  Exact, pre-normalized organism name
  antibiotic.name  (string, required)  Exact, pre-normalized antibiotic name
  method           (string, required)  "MIC" or "DISC"
  mic              (object)            Required for MIC, forbidden for DISC:
                     susceptible_max      value <= this is S
                     intermediate_range   optional {{ low, high }}, inclusive: I
                     resistant_min        value >= this is R
  disc             (object)            Required for DISC, forbidden for MIC (mm):
                     susceptible_min      zone >= this is S
                     intermediate_range   optional {{ low, high }}, inclusive: I
                     resistant_max        zone <= this is R
  exceptions       (array, optional)   Override entries for this rule only;
                                       checked before the global table
  note             (string, optional)

Numbers may be bare (0.25) or quoted decimals ("0.25"). The S and R
thresholds win when a value also touches the intermediate range, and the
range must reach at least one value strictly between them. A value in no
band is reported as AMBIGUOUS.

Override entries:
  flag          (string, required)  esbl, ampc, carbapenemase, mrsa or vre
  antibiotic    (string)            Single antibiotic scope, or
  drug_class    (string)            a class declared in drug_classes
  exempt        (array, optional)   Antibiotics the entry never applies to
  outcome       (string, required)  "force" or "review"
  decision      (string)            S, I or R; required for "force" only
  rationale     (string, required)  Reason text; {{flag}} and {{antibiotic}}
                                    are substituted

Example:
{{
  "version": "LOCAL-2024.1",
  "drug_classes": {{ "fluoroquinolones": ["Ciprofloxacin", "Levofloxacin"] }},
  "overrides": [
    {{ "flag": "esbl", "drug_class": "fluoroquinolones", "outcome": "review",
      "rationale": "co-resistance common in {{flag}} producers" }}
  ],
  "rules": [
    {{
      "organism": {{ "name": "Escherichia coli" }},
      "antibiotic": {{ "name": "Ciprofloxacin" }},
      "method": "MIC",
      "mic": {{
        "susceptible_max": "0.25",
        "intermediate_range": {{ "low": "0.5", "high": "1" }},
        "resistant_min": "2"
      }}
    }}
  ]
}}
"#
    );
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), SiraError> {
    let rs = sira_core::rules::load_ruleset(file)?;

    println!("Ruleset '{}' is valid.", rs.version());
    println!("  Rules: {}", rs.rules().len());
    println!("  Global overrides: {}", rs.overrides().len());
    println!("  Drug classes: {}", rs.drug_classes().len());

    // Things that are legal but often unintended
    let mut warnings = Vec::new();
    for (i, rule) in rs.rules().iter().enumerate() {
        let has_intermediate = match &rule.breakpoints {
            Breakpoints::Mic(bp) => bp.intermediate_range.is_some(),
            Breakpoints::Disc(bp) => bp.intermediate_range.is_some(),
        };
        if !has_intermediate {
            warnings.push(format!(
                "rules[{i}] {}/{} has no intermediate_range; values between S and R will be AMBIGUOUS",
                rule.organism, rule.antibiotic
            ));
        }
    }
    for entry in rs
        .overrides()
        .iter()
        .chain(rs.rules().iter().flat_map(|r| r.exceptions.iter()))
    {
        if let OverrideScope::DrugClass(class) = &entry.scope {
            for name in &entry.exempt {
                if !rs.class_contains(class, name) {
                    warnings.push(format!(
                        "{} override exempts '{}', which is not in class '{}'",
                        entry.flag, name, class
                    ));
                }
            }
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}
