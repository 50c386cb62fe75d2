use imvu_identity::IdentityError;
use imvu_types::{ErrorKind, TenantId};
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger errors.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("invalid ledger append: {0}")]
    Validation(String),

    /// Another writer extended the chain between head read and append.
    #[error("stale chain head for tenant {tenant_id}: expected {expected}, found {actual}")]
    StaleHead {
        tenant_id: TenantId,
        expected: String,
        actual: String,
    },

    #[error("platform signing failed: {0}")]
    Signing(#[from] IdentityError),

    #[error("ledger backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::StaleHead { .. } => ErrorKind::Integrity,
            LedgerError::Signing(_) | LedgerError::Serialization(_) => ErrorKind::Invariant,
            LedgerError::Backend(_) => ErrorKind::Collaborator,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
