use imvu_types::ErrorKind;
use thiserror::Error;

use crate::gate::{GateId, GateVerdict};

/// One or more gates failed.
///
/// Carries every verdict of the evaluation, passed and failed, so callers can
/// show the whole picture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("action {action_class} denied by gates [{}]", failed_list(.verdicts))]
pub struct ComplianceError {
    pub action_class: String,
    pub verdicts: Vec<GateVerdict>,
}

impl ComplianceError {
    pub fn failed(&self) -> impl Iterator<Item = &GateVerdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }

    pub fn failed_gates(&self) -> Vec<GateId> {
        self.failed().map(|v| v.gate.clone()).collect()
    }

    pub fn verdict(&self, gate: &GateId) -> Option<&GateVerdict> {
        self.verdicts.iter().find(|v| &v.gate == gate)
    }
}

fn failed_list(verdicts: &[GateVerdict]) -> String {
    verdicts
        .iter()
        .filter(|v| !v.passed)
        .map(|v| v.gate.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from the gate engine.
#[derive(Error, Debug, Clone)]
pub enum GateError {
    #[error(transparent)]
    Compliance(#[from] ComplianceError),

    #[error("unknown action class: {0}")]
    UnknownActionClass(String),

    /// The table names a gate nobody registered. A configuration defect.
    #[error("action class {action_class} requires unregistered gate {gate}")]
    UnregisteredGate { action_class: String, gate: GateId },

    #[error("invalid action class table: {0}")]
    Config(String),
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::Compliance(_) => ErrorKind::Compliance,
            GateError::UnknownActionClass(_) | GateError::Config(_) => ErrorKind::Validation,
            GateError::UnregisteredGate { .. } => ErrorKind::Invariant,
        }
    }
}
