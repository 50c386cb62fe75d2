use imvu_ledger::LedgerError;
use imvu_types::{ErrorKind, EventId};
use thiserror::Error;

pub type RevenueResult<T> = Result<T, RevenueError>;

/// Errors from pricing, splitting and summarizing.
#[derive(Error, Debug, Clone)]
pub enum RevenueError {
    #[error("invalid revenue input: {0}")]
    Validation(String),

    /// Arithmetic post-condition failed. Always a defect.
    #[error("revenue invariant violated: {0}")]
    Invariant(String),

    #[error("usage event {event_id} is malformed: {reason}")]
    MalformedUsage { event_id: EventId, reason: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl RevenueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RevenueError::Validation(_) => ErrorKind::Validation,
            RevenueError::Invariant(_) | RevenueError::MalformedUsage { .. } => {
                ErrorKind::Invariant
            }
            RevenueError::Ledger(e) => e.kind(),
        }
    }
}
