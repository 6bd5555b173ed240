use sira_core::config::EngineOptions;
use sira_core::error::SiraError;
use sira_core::model::MeasurementRecord;
use sira_core::rules::store::{RuleSource, RuleStore};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Serve JSON-lines classification on stdin/stdout.
///
/// Before each record the rule file's modification time is checked; a change
/// triggers a reload. A rejected reload is logged and the previous rule set
/// keeps serving.
pub fn run(rules: PathBuf, options: &EngineOptions) -> Result<(), SiraError> {
    let store = RuleStore::open(&RuleSource::File(rules.clone()))?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(stdin.lock(), stdout.lock(), &store, &rules, options)
}

/// One response line per non-blank input line. A line that cannot be read as
/// a record gets an `{"error": ...}` line and the loop carries on.
fn serve(
    mut input: impl BufRead,
    mut out: impl Write,
    store: &RuleStore,
    rules: &Path,
    options: &EngineOptions,
) -> Result<(), SiraError> {
    let source = RuleSource::File(rules.to_path_buf());
    let mut last_modified = modified(rules);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let current_modified = modified(rules);
                if current_modified != last_modified {
                    last_modified = current_modified;
                    if let Err(e) = store.reload(&source) {
                        tracing::error!(error = %e, "rule file changed but could not be reloaded");
                    }
                }
                classify_line(line, store, options)
            }
            Err(e) => Err(SiraError::InvalidMeasurement(format!(
                "input line is not valid UTF-8 ({e})"
            ))),
        };

        let json = match response {
            Ok(result) => serde_json::to_string(&result)?,
            Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
        };
        writeln!(out, "{json}")?;
        out.flush()?;
    }

    Ok(())
}

fn classify_line(
    line: &str,
    store: &RuleStore,
    options: &EngineOptions,
) -> Result<sira_core::classify::ClassificationResult, SiraError> {
    let record: MeasurementRecord = serde_json::from_str(line)?;
    let m = record.into_measurement(options.unknown_flags)?;
    Ok(sira_core::classify_current(store, &m, options))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
