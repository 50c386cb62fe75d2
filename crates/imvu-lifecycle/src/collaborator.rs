//! External collaborators: compute, domain/DNS, mail and network.
//!
//! The lifecycle core only sees the narrow [`TenantResource`] interface.
//! Protocol work (zone transfers, SMTP, slice control planes) lives behind
//! it and is out of this crate's hands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use imvu_gate::NetworkRoute;
use imvu_types::{IdentityId, ResourceEnvelope, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Kind of external system a collaborator fronts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Compute,
    Domain,
    Mail,
    Network,
}

impl ResourceKind {
    /// Provisioning order; compensation runs the other way.
    pub const ORDER: [ResourceKind; 4] = [
        ResourceKind::Compute,
        ResourceKind::Domain,
        ResourceKind::Mail,
        ResourceKind::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Compute => "compute",
            ResourceKind::Domain => "domain",
            ResourceKind::Mail => "mail",
            ResourceKind::Network => "network",
        }
    }

    fn rank(&self) -> usize {
        match self {
            ResourceKind::Compute => 0,
            ResourceKind::Domain => 1,
            ResourceKind::Mail => 2,
            ResourceKind::Network => 3,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a collaborator is asked to provision for a new tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSpec {
    pub tenant_id: TenantId,
    pub name: String,
    pub owner: IdentityId,
    pub jurisdiction: String,
    pub domain: String,
    pub mailbox: String,
    pub resources: ResourceEnvelope,
}

/// Opaque reference to something a collaborator created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub tenant_id: TenantId,
    pub reference: String,
}

/// One collaborator's tenant-scoped data, destined for an export bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl ExportArtifact {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// An external system holding tenant-scoped state.
///
/// Every operation is retryable by the caller. `deprovision` must be
/// idempotent: deleting something already gone succeeds.
#[async_trait]
pub trait TenantResource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn provision(&self, spec: &ProvisionSpec) -> Result<ResourceHandle, CollaboratorError>;

    async fn deprovision(&self, tenant: &TenantId) -> Result<(), CollaboratorError>;

    /// Apply a new envelope. Systems without a notion of size ignore it.
    async fn resize(
        &self,
        _tenant: &TenantId,
        _resources: &ResourceEnvelope,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn export(&self, tenant: &TenantId) -> Result<ExportArtifact, CollaboratorError>;

    /// Install routes. Only network collaborators act on this.
    async fn apply_routes(
        &self,
        _tenant: &TenantId,
        _routes: &[NetworkRoute],
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// The set of collaborators a manager drives, kept in provisioning order.
#[derive(Clone, Default)]
pub struct Collaborators {
    resources: Vec<Arc<dyn TenantResource>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: Arc<dyn TenantResource>) -> Self {
        self.push(resource);
        self
    }

    /// Insert keeping compute, domain, mail, network order. Equal kinds keep
    /// insertion order.
    pub fn push(&mut self, resource: Arc<dyn TenantResource>) {
        let rank = resource.kind().rank();
        let at = self
            .resources
            .iter()
            .position(|r| r.kind().rank() > rank)
            .unwrap_or(self.resources.len());
        self.resources.insert(at, resource);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<dyn TenantResource>> {
        self.resources.iter()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Arc<dyn TenantResource>> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Run a collaborator call, failing with [`CollaboratorError::Timeout`] if
/// `timeout` elapses first.
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    resource: ResourceKind,
    operation: &'static str,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match timeout {
        Some(after) => tokio::time::timeout(after, call)
            .await
            .map_err(|_| CollaboratorError::Timeout {
                resource,
                operation: operation.to_string(),
                after,
            })?,
        None => call.await,
    }
}
