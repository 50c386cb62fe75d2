use serde::{Deserialize, Serialize};

/// Platform-wide error taxonomy.
///
/// Every crate keeps its own error enum; each of them classifies itself into
/// one of these kinds so callers can decide what to do without matching on
/// crate-specific variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input. The caller must fix the request.
    Validation,
    /// One or more compliance gates failed.
    Compliance,
    /// Hash-chain or signature mismatch in the ledger.
    Integrity,
    /// An internal invariant was violated. Always a defect.
    Invariant,
    /// An external system call failed.
    Collaborator,
}

impl ErrorKind {
    /// Only collaborator failures may be retried by the caller as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Collaborator)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Compliance => "compliance",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Invariant => "invariant",
            ErrorKind::Collaborator => "collaborator",
        };
        f.write_str(s)
    }
}
