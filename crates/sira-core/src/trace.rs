use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    MethodCheck,
    RuleLookup,
    OverrideCheck,
    ValueCheck,
    ThresholdCompare,
}

/// One step of a classification, in the order it was evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_type: TraceStepType,
    pub message: String,
}

/// Ordered step log collected while classifying one measurement.
#[derive(Debug, Default)]
pub(crate) struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    pub(crate) fn step(&mut self, step_type: TraceStepType, message: impl Into<String>) {
        self.steps.push(TraceStep {
            step_type,
            message: message.into(),
        });
    }

    pub(crate) fn into_steps(self) -> Vec<TraceStep> {
        self.steps
    }
}
