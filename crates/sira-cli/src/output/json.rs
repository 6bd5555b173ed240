use sira_core::classify::ClassificationResult;
use sira_core::error::SiraError;

pub fn print(results: &[ClassificationResult]) -> Result<(), SiraError> {
    let json = serde_json::to_string_pretty(results)?;
    println!("{json}");
    Ok(())
}
