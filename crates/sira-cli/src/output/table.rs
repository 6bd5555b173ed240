use sira_core::classify::{ClassificationResult, Decision};
use sira_core::rules::ruleset::RuleSet;

pub fn print(results: &[ClassificationResult], ruleset: &RuleSet, explain: bool) {
    println!(
        "=== {} ({}) ===\n",
        ruleset.name().unwrap_or("Rule set"),
        ruleset.version()
    );

    if results.is_empty() {
        println!("  No measurements.");
        return;
    }

    let label = |r: &ClassificationResult| {
        let specimen = r
            .specimen_id
            .as_deref()
            .map(|s| format!("[{s}] "))
            .unwrap_or_default();
        format!("{specimen}{} / {}", r.organism, r.antibiotic)
    };
    let width = results.iter().map(|r| label(r).len()).max().unwrap_or(20);

    for r in results {
        let method = r
            .method
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".into());
        let value = r
            .value_used
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".into());
        let marker = if r.decision.is_review_category() { " (!)" } else { "" };
        println!(
            "  {:<width$}  {:<6}  {:<14}  -> {}{}",
            label(r),
            method,
            value,
            r.decision,
            marker,
            width = width
        );
        println!("    {}", r.reason);
        if explain {
            for step in &r.trace {
                println!("      - {}", step.message);
            }
        }
    }

    let count = |d: Decision| results.iter().filter(|r| r.decision == d).count();
    let review = results
        .iter()
        .filter(|r| r.decision.is_review_category())
        .count();
    println!(
        "\n  S: {}  I: {}  R: {}  needs review: {}",
        count(Decision::Susceptible),
        count(Decision::Intermediate),
        count(Decision::Resistant),
        review
    );
}
