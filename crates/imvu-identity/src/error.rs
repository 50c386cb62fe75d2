use imvu_types::{ErrorKind, IdentityId};
use thiserror::Error;

/// Errors from identity issuance, signing and rotation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity not found: {0}")]
    NotFound(IdentityId),

    #[error("identity already exists with a different key: {0}")]
    AlreadyExists(IdentityId),

    #[error("invalid identity request: {0}")]
    Validation(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// The key changed after a rotation was prepared.
    #[error("identity {id} was rotated concurrently (prepared from key version {expected}, now {actual})")]
    RotationConflict { id: IdentityId, expected: u32, actual: u32 },
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::NotFound(_)
            | IdentityError::AlreadyExists(_)
            | IdentityError::Validation(_)
            | IdentityError::RotationConflict { .. } => ErrorKind::Validation,
            IdentityError::MalformedSignature(_) => ErrorKind::Integrity,
        }
    }
}
