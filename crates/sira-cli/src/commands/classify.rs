use serde::Deserialize;
use sira_core::config::EngineOptions;
use sira_core::error::SiraError;
use sira_core::model::MeasurementRecord;
use sira_core::rules::store::{RuleSource, RuleStore};
use std::path::Path;

use crate::output;

/// Input files may hold a single record or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordInput {
    Many(Vec<MeasurementRecord>),
    One(MeasurementRecord),
}

pub fn run(
    input_file: &Path,
    source: &RuleSource,
    options: &EngineOptions,
    output_format: &str,
    explain: bool,
) -> Result<(), SiraError> {
    let store = RuleStore::open(source)?;

    let json_bytes = std::fs::read(input_file)?;
    let records = match serde_json::from_slice::<RecordInput>(&json_bytes)? {
        RecordInput::Many(records) => records,
        RecordInput::One(record) => vec![record],
    };

    let results = sira_core::classify_records(records, &store, options)?;

    match output_format {
        "json" => output::json::print(&results)?,
        _ => output::table::print(&results, &store.current(), explain),
    }

    Ok(())
}
