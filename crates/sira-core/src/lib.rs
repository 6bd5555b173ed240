pub mod classify;
pub mod config;
pub mod error;
pub mod model;
pub mod rules;
pub mod trace;

use classify::outcome::ClassificationResult;
use config::EngineOptions;
use error::SiraError;
use model::{Measurement, MeasurementRecord};
use rules::store::RuleStore;

/// Classify one measurement against whatever rule set is published now.
pub fn classify_current(
    store: &RuleStore,
    measurement: &Measurement,
    options: &EngineOptions,
) -> ClassificationResult {
    let snapshot = store.current();
    classify::classify(measurement, &snapshot, options)
}

/// Main API entry point: classify upstream records as one batch.
///
/// The whole batch is evaluated against a single snapshot, so a reload that
/// lands mid-batch does not mix rule set versions in the output. Records are
/// converted first; the first record that cannot be converted fails the
/// batch with its position.
pub fn classify_records(
    records: Vec<MeasurementRecord>,
    store: &RuleStore,
    options: &EngineOptions,
) -> Result<Vec<ClassificationResult>, SiraError> {
    let measurements = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            record
                .into_measurement(options.unknown_flags)
                .map_err(|e| SiraError::InvalidMeasurement(format!("record {i}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let snapshot = store.current();
    Ok(classify::classify_all(&measurements, &snapshot, options))
}
