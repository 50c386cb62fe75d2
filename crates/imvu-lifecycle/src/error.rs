use std::path::PathBuf;
use std::time::Duration;

use imvu_gate::{ComplianceError, GateError};
use imvu_identity::IdentityError;
use imvu_ledger::{ChainVerification, LedgerError};
use imvu_revenue::RevenueError;
use imvu_types::{ErrorKind, TenantId};
use thiserror::Error;

use crate::collaborator::ResourceKind;
use crate::status::{TenantStatus, Transition};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// An external collaborator call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{resource} {operation} failed: {message}")]
    Failed {
        resource: ResourceKind,
        operation: String,
        message: String,
    },

    #[error("{resource} {operation} timed out after {after:?}")]
    Timeout {
        resource: ResourceKind,
        operation: String,
        after: Duration,
    },
}

impl CollaboratorError {
    pub fn failed(
        resource: ResourceKind,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CollaboratorError::Failed {
            resource,
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn resource(&self) -> ResourceKind {
        match self {
            CollaboratorError::Failed { resource, .. } | CollaboratorError::Timeout { resource, .. } => {
                *resource
            }
        }
    }
}

/// Export bundle staging, publishing or verification failed.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export serialization error: {0}")]
    Serialization(String),

    #[error("invalid artifact name: {0}")]
    InvalidArtifact(String),

    #[error("bundle {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::Io(_) => ErrorKind::Collaborator,
            ExportError::Serialization(_) | ExportError::InvalidArtifact(_) => ErrorKind::Invariant,
            ExportError::Corrupt { .. } => ErrorKind::Integrity,
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Serialization(e.to_string())
    }
}

/// Errors returned by [`TenantManager`](crate::TenantManager).
///
/// Lower-layer errors are carried unmodified; a [`ComplianceError`] in
/// particular comes back exactly as the gate engine produced it.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("tenant not found: {0}")]
    TenantNotFound(TenantId),

    #[error("tenant {tenant_id} cannot {transition} from {from}")]
    IllegalTransition {
        tenant_id: TenantId,
        from: TenantStatus,
        transition: Transition,
    },

    #[error("tenant {tenant_id} is {status}; {action} needs an active tenant")]
    NotOperational {
        tenant_id: TenantId,
        status: TenantStatus,
        action: String,
    },

    /// Another transition committed between snapshot and commit.
    #[error("tenant {tenant_id} changed concurrently (expected version {expected}, found {actual})")]
    Conflict {
        tenant_id: TenantId,
        expected: u64,
        actual: u64,
    },

    /// Events were appended to the tenant chain after an export read it.
    #[error("ledger head of tenant {tenant_id} moved during export (exported {expected}, found {actual})")]
    ChainMoved {
        tenant_id: TenantId,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Compliance(ComplianceError),

    #[error("gate engine error: {0}")]
    Gate(GateError),

    #[error("ledger chain for tenant {} is broken", .verification.tenant_id)]
    Integrity { verification: ChainVerification },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("revenue error: {0}")]
    Revenue(#[from] RevenueError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// A detached continuation of this operation panicked or was aborted.
    #[error("operation task failed: {0}")]
    Task(String),
}

impl From<GateError> for LifecycleError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Compliance(denied) => LifecycleError::Compliance(denied),
            other => LifecycleError::Gate(other),
        }
    }
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation(_)
            | LifecycleError::TenantNotFound(_)
            | LifecycleError::IllegalTransition { .. }
            | LifecycleError::NotOperational { .. }
            | LifecycleError::Conflict { .. }
            | LifecycleError::ChainMoved { .. } => ErrorKind::Validation,
            LifecycleError::Compliance(_) => ErrorKind::Compliance,
            LifecycleError::Gate(e) => e.kind(),
            LifecycleError::Integrity { .. } => ErrorKind::Integrity,
            LifecycleError::Ledger(e) => e.kind(),
            LifecycleError::Identity(e) => e.kind(),
            LifecycleError::Revenue(e) => e.kind(),
            LifecycleError::Collaborator(_) => ErrorKind::Collaborator,
            LifecycleError::Export(e) => e.kind(),
            LifecycleError::Task(_) => ErrorKind::Invariant,
        }
    }

    /// Only collaborator failures may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn as_compliance(&self) -> Option<&ComplianceError> {
        match self {
            LifecycleError::Compliance(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imvu_gate::{GateId, GateVerdict};

    #[test]
    fn compliance_passes_through_untouched() {
        let denied = ComplianceError {
            action_class: "tenant.create".into(),
            verdicts: vec![
                GateVerdict::fail(GateId::TenantIsolation, "missing imvu_id"),
                GateVerdict::pass(GateId::AuditLogging),
            ],
        };
        let err = LifecycleError::from(GateError::Compliance(denied.clone()));
        assert_eq!(err.as_compliance(), Some(&denied));
        assert_eq!(err.kind(), ErrorKind::Compliance);
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_collaborator_errors_are_retryable() {
        let err = LifecycleError::from(CollaboratorError::failed(
            ResourceKind::Mail,
            "export",
            "archive unavailable",
        ));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "collaborator error: mail export failed: archive unavailable");

        let conflict = LifecycleError::Conflict {
            tenant_id: TenantId::new("imvu-1"),
            expected: 1,
            actual: 2,
        };
        assert!(!conflict.is_retryable());
    }
}
