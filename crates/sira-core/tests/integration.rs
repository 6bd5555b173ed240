//! End-to-end tests through the rule store: built-in preset, rule files on
//! disk, hot reload and concurrent classification during reloads.

use rust_decimal_macros::dec;
use sira_core::classify::{classify, Decision};
use sira_core::config::{EngineOptions, UnknownFlagPolicy};
use sira_core::error::SiraError;
use sira_core::model::{Measurement, MeasurementRecord, MethodTag, Phenotype};
use sira_core::rules::store::{RuleSource, RuleStore};
use sira_core::{classify_current, classify_records};
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn demo_store() -> RuleStore {
    RuleStore::open(&RuleSource::Preset("demo".into())).unwrap()
}

fn decide(store: &RuleStore, m: &Measurement) -> Decision {
    classify_current(store, m, &EngineOptions::default()).decision
}

/// Rule document with a single E. coli / ciprofloxacin MIC rule.
fn cipro_doc(version: &str, susceptible_max: &str) -> String {
    format!(
        r#"{{
  "version": "{version}",
  "rules": [
    {{
      "organism": {{ "name": "Escherichia coli" }},
      "antibiotic": {{ "name": "Ciprofloxacin" }},
      "method": "MIC",
      "mic": {{ "susceptible_max": "{susceptible_max}",
                "intermediate_range": {{ "low": "0.5", "high": "1" }},
                "resistant_min": "2" }}
    }}
  ]
}}"#
    )
}

fn write(path: &Path, text: &str) {
    std::fs::write(path, text).unwrap();
}

// ---------------------------------------------------------------------------
// Breakpoint vectors against the demo preset
// ---------------------------------------------------------------------------
#[test]
fn ecoli_ciprofloxacin_mic_vectors() {
    let store = demo_store();
    let cases = [
        (dec!(0.25), Decision::Susceptible),
        (dec!(0.5), Decision::Intermediate),
        (dec!(1.0), Decision::Intermediate),
        (dec!(2.0), Decision::Resistant),
    ];
    for (value, expected) in cases {
        let m = Measurement::mic("Escherichia coli", "Ciprofloxacin", value);
        assert_eq!(decide(&store, &m), expected, "MIC {value}");
    }
}

#[test]
fn paeruginosa_piperacillin_tazobactam_disc_vectors() {
    let store = demo_store();
    let cases = [
        (dec!(21), Decision::Susceptible),
        (dec!(18), Decision::Intermediate),
        (dec!(17), Decision::Resistant),
    ];
    for (zone, expected) in cases {
        let m = Measurement::disc("Pseudomonas aeruginosa", "Piperacillin-tazobactam", zone);
        assert_eq!(decide(&store, &m), expected, "zone {zone}");
    }
}

#[test]
fn every_rule_honours_inclusive_thresholds() {
    use sira_core::rules::ruleset::Breakpoints;

    let store = demo_store();
    let rs = store.current();
    let opts = EngineOptions::default();
    for rule in rs.rules() {
        let (at_s, at_r) = match &rule.breakpoints {
            Breakpoints::Mic(bp) => (
                Measurement::mic(&rule.organism, &rule.antibiotic, bp.susceptible_max),
                Measurement::mic(&rule.organism, &rule.antibiotic, bp.resistant_min),
            ),
            Breakpoints::Disc(bp) => (
                Measurement::disc(&rule.organism, &rule.antibiotic, bp.susceptible_min),
                Measurement::disc(&rule.organism, &rule.antibiotic, bp.resistant_max),
            ),
        };
        assert_eq!(classify(&at_s, &rs, &opts).decision, Decision::Susceptible);
        assert_eq!(classify(&at_r, &rs, &opts).decision, Decision::Resistant);
    }
}

// ---------------------------------------------------------------------------
// Review outcomes
// ---------------------------------------------------------------------------
#[test]
fn unknown_pair_needs_review() {
    let store = demo_store();
    let m = Measurement::mic("Acinetobacter baumannii", "Colistin", dec!(1));
    let r = classify_current(&store, &m, &EngineOptions::default());
    assert!(r.decision.is_review_category());
    assert!(r.reason.contains("No matching rule"));
}

#[test]
fn absent_method_needs_review() {
    let store = demo_store();
    let mut m = Measurement::mic("Escherichia coli", "Ciprofloxacin", dec!(0.25));
    m.method = None;
    let r = classify_current(&store, &m, &EngineOptions::default());
    assert!(r.decision.is_review_category());
    assert!(r.reason.contains("Unsupported method"));
}

// ---------------------------------------------------------------------------
// Phenotype overrides
// ---------------------------------------------------------------------------
#[test]
fn mrsa_forces_resistance_on_first_generation_beta_lactams() {
    let store = demo_store();
    for antibiotic in ["Penicillin", "Amoxicillin", "Cephalexin"] {
        let m = Measurement::mic("Staphylococcus aureus", antibiotic, dec!(0.06))
            .with_flag(Phenotype::Mrsa);
        assert_eq!(decide(&store, &m), Decision::Resistant, "{antibiotic}");
    }
}

#[test]
fn mrsa_leaves_exempt_agents_to_breakpoints() {
    let store = demo_store();
    for antibiotic in ["Vancomycin", "Clindamycin", "Ceftaroline"] {
        let m = Measurement::mic("Staphylococcus aureus", antibiotic, dec!(0.25))
            .with_flag(Phenotype::Mrsa);
        let r = classify_current(&store, &m, &EngineOptions::default());
        assert_eq!(r.decision, Decision::Susceptible, "{antibiotic}");
        assert!(r.reason.contains("susceptible_max"));
    }
}

#[test]
fn esbl_sends_susceptible_fluoroquinolone_to_review() {
    let store = demo_store();
    let m = Measurement::mic("Escherichia coli", "Ciprofloxacin", dec!(0.06))
        .with_flag(Phenotype::Esbl);
    let r = classify_current(&store, &m, &EngineOptions::default());
    assert_eq!(r.decision, Decision::Review);
    assert!(r.reason.contains("ESBL"));
}

// ---------------------------------------------------------------------------
// Hot reload from files
// ---------------------------------------------------------------------------
#[test]
fn reload_swaps_rules_and_rejects_bad_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("breakpoints.json");
    write(&path, &cipro_doc("v1", "0.25"));

    let source = RuleSource::File(path.clone());
    let store = RuleStore::open(&source).unwrap();
    let m = Measurement::mic("Escherichia coli", "Ciprofloxacin", dec!(0.5));
    assert_eq!(decide(&store, &m), Decision::Intermediate);

    // organism missing on rule 0
    write(
        &path,
        r#"{ "version": "broken", "rules": [ { "antibiotic": { "name": "Ciprofloxacin" },
             "method": "MIC", "mic": { "susceptible_max": 1, "resistant_min": 2 } } ] }"#,
    );
    match store.reload(&source) {
        Err(SiraError::Validation(e)) => {
            assert!(e.mentions_rule(0));
            assert!(e.to_string().contains("rules[0].organism"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    let r = classify_current(&store, &m, &EngineOptions::default());
    assert_eq!(r.decision, Decision::Intermediate);
    assert_eq!(r.ruleset_version, "v1");

    write(&path, &cipro_doc("v2", "0.5"));
    let published = store.reload(&source).unwrap();
    assert_eq!(published.version(), "v2");
    let r = classify_current(&store, &m, &EngineOptions::default());
    assert_eq!(r.decision, Decision::Susceptible);
    assert_eq!(r.ruleset_version, "v2");
}

#[test]
fn reload_of_missing_file_keeps_snapshot() {
    let store = demo_store();
    let err = store
        .reload(&RuleSource::File("/nonexistent/rules.json".into()))
        .unwrap_err();
    assert!(matches!(err, SiraError::RulesetRead { .. }));
    assert_eq!(store.current().version(), "SIRA-DEMO-2024");
}

#[test]
fn yaml_rule_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("breakpoints.yaml");
    write(
        &path,
        r#"
version: YAML-1
drug_classes:
  fluoroquinolones: [Ciprofloxacin]
overrides:
  - flag: esbl
    drug_class: fluoroquinolones
    outcome: review
    rationale: check co-resistance
rules:
  - organism: { name: Escherichia coli }
    antibiotic: { name: Ciprofloxacin }
    method: disc
    disc:
      susceptible_min: 26
      intermediate_range: { low: 22, high: 25 }
      resistant_max: 21
"#,
    );
    let store = RuleStore::open(&RuleSource::File(path)).unwrap();
    let m = Measurement::disc("Escherichia coli", "Ciprofloxacin", dec!(23));
    assert_eq!(decide(&store, &m), Decision::Intermediate);
    assert_eq!(store.current().version(), "YAML-1");
}

#[test]
fn snapshot_held_across_reload_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("breakpoints.json");
    write(&path, &cipro_doc("v1", "0.25"));
    let source = RuleSource::File(path.clone());
    let store = RuleStore::open(&source).unwrap();

    let held = store.current();
    write(&path, &cipro_doc("v2", "0.5"));
    store.reload(&source).unwrap();

    let m = Measurement::mic("Escherichia coli", "Ciprofloxacin", dec!(0.5));
    let r = classify(&m, &held, &EngineOptions::default());
    assert_eq!(r.ruleset_version, "v1");
    assert_eq!(r.decision, Decision::Intermediate);
}

#[test]
fn concurrent_classification_never_sees_a_mixed_table() {
    let v1 = RuleSource::Inline {
        name: "v1".into(),
        format: sira_core::rules::DocumentFormat::Json,
        text: cipro_doc("v1", "0.25"),
    };
    let v2 = RuleSource::Inline {
        name: "v2".into(),
        format: sira_core::rules::DocumentFormat::Json,
        text: cipro_doc("v2", "0.5"),
    };
    let store = Arc::new(RuleStore::open(&v1).unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let m = Measurement::mic("Escherichia coli", "Ciprofloxacin", dec!(0.5));
                for _ in 0..500 {
                    let r = classify_current(&store, &m, &EngineOptions::default());
                    match r.ruleset_version.as_str() {
                        "v1" => assert_eq!(r.decision, Decision::Intermediate),
                        "v2" => assert_eq!(r.decision, Decision::Susceptible),
                        other => panic!("unexpected version {other}"),
                    }
                }
            })
        })
        .collect();

    for i in 0..100 {
        let source = if i % 2 == 0 { &v2 } else { &v1 };
        store.reload(source).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}

// ---------------------------------------------------------------------------
// Batch entry point
// ---------------------------------------------------------------------------
#[test]
fn classify_records_batch() {
    let store = demo_store();
    let records: Vec<MeasurementRecord> = serde_json::from_str(
        r#"[
            { "organism": "Escherichia coli", "antibiotic": "Ciprofloxacin",
              "method": "MIC", "mic_value": 0.25, "specimen_id": "SP-1" },
            { "organism": "Pseudomonas aeruginosa", "antibiotic": "Piperacillin-tazobactam",
              "method": "DISC", "disc_zone_mm": 17 },
            { "organism": "Escherichia coli", "antibiotic": "Ciprofloxacin",
              "method": "ETEST", "mic_value": 0.25 }
        ]"#,
    )
    .unwrap();
    let results = classify_records(records, &store, &EngineOptions::default()).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].decision, Decision::Susceptible);
    assert_eq!(results[0].specimen_id.as_deref(), Some("SP-1"));
    assert_eq!(results[1].decision, Decision::Resistant);
    assert_eq!(results[2].decision, Decision::Review);
    assert_eq!(results[2].method, Some(MethodTag::Unrecognized("ETEST".into())));
}

#[test]
fn classify_records_strict_flags() {
    let store = demo_store();
    let record = MeasurementRecord {
        organism: "Escherichia coli".into(),
        antibiotic: "Ciprofloxacin".into(),
        method: Some("MIC".into()),
        mic_value: Some(dec!(0.25)),
        flags: [("kpc".to_string(), true)].into_iter().collect(),
        ..Default::default()
    };

    let lenient = classify_records(vec![record.clone()], &store, &EngineOptions::default());
    assert_eq!(lenient.unwrap()[0].decision, Decision::Susceptible);

    let strict = EngineOptions {
        unknown_flags: UnknownFlagPolicy::Reject,
        ..EngineOptions::default()
    };
    let err = classify_records(vec![record], &store, &strict).unwrap_err();
    assert!(err.to_string().contains("kpc"));
}

#[test]
fn classification_is_idempotent() {
    let store = demo_store();
    let m = Measurement::mic("Staphylococcus aureus", "Penicillin", dec!(0.06))
        .with_flag(Phenotype::Mrsa)
        .with_specimen("SP-9");
    let a = classify_current(&store, &m, &EngineOptions::default());
    let b = classify_current(&store, &m, &EngineOptions::default());
    assert_eq!(a, b);
}
