pub mod engine;
pub mod outcome;
pub mod overrides;

pub use engine::{classify, classify_all};
pub use outcome::{ClassificationResult, Decision, UsedValue};
