//! In-memory collaborators and ledger fixtures for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use imvu_gate::NetworkRoute;
use imvu_identity::{IdentityError, IdentityRegistry, PlatformSigner};
use imvu_ledger::{LedgerStore, MemoryBackend};
use imvu_types::{ResourceEnvelope, TenantId};

use crate::collaborator::{ExportArtifact, ProvisionSpec, ResourceHandle, ResourceKind, TenantResource};
use crate::error::CollaboratorError;

/// Shared, ordered log of `<kind>:<operation>` entries across mocks.
pub type CallJournal = Arc<Mutex<Vec<String>>>;

/// A collaborator that keeps tenant state in memory.
///
/// Operations can be made to fail (`fail_on`) or stall (`delay_on`) by name:
/// `provision`, `deprovision`, `resize`, `export`, `apply_routes`.
pub struct MockResource {
    kind: ResourceKind,
    failing: DashSet<String>,
    delays: DashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    journal: Option<CallJournal>,
    provisioned: DashSet<TenantId>,
    sizes: DashMap<TenantId, ResourceEnvelope>,
    routes: DashMap<TenantId, Vec<NetworkRoute>>,
}

impl MockResource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            failing: DashSet::new(),
            delays: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            journal: None,
            provisioned: DashSet::new(),
            sizes: DashMap::new(),
            routes: DashMap::new(),
        }
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn fail_on(&self, operation: &str) {
        self.failing.insert(operation.to_string());
    }

    pub fn recover(&self, operation: &str) {
        self.failing.remove(operation);
    }

    pub fn delay_on(&self, operation: &str, delay: Duration) {
        self.delays.insert(operation.to_string(), delay);
    }

    /// Operations invoked on this mock, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn is_provisioned(&self, tenant: &TenantId) -> bool {
        self.provisioned.contains(tenant)
    }

    pub fn size_of(&self, tenant: &TenantId) -> Option<ResourceEnvelope> {
        self.sizes.get(tenant).map(|s| *s)
    }

    pub fn routes_of(&self, tenant: &TenantId) -> Vec<NetworkRoute> {
        self.routes.get(tenant).map(|r| r.clone()).unwrap_or_default()
    }

    async fn enter(&self, operation: &str) -> Result<(), CollaboratorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation.to_string());
        }
        if let Some(journal) = &self.journal {
            if let Ok(mut journal) = journal.lock() {
                journal.push(format!("{}:{operation}", self.kind));
            }
        }
        let delay = self.delays.get(operation).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(operation) {
            return Err(CollaboratorError::failed(self.kind, operation, "injected failure"));
        }
        Ok(())
    }

    fn artifact_name(&self) -> &'static str {
        match self.kind {
            ResourceKind::Compute => "compute-image.json",
            ResourceKind::Domain => "dns-zone.json",
            ResourceKind::Mail => "mail-archive.json",
            ResourceKind::Network => "network-slice.json",
        }
    }
}

#[async_trait]
impl TenantResource for MockResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn provision(&self, spec: &ProvisionSpec) -> Result<ResourceHandle, CollaboratorError> {
        self.enter("provision").await?;
        self.provisioned.insert(spec.tenant_id.clone());
        self.sizes.insert(spec.tenant_id.clone(), spec.resources);
        Ok(ResourceHandle {
            kind: self.kind,
            tenant_id: spec.tenant_id.clone(),
            reference: format!("{}/{}", self.kind, spec.tenant_id),
        })
    }

    async fn deprovision(&self, tenant: &TenantId) -> Result<(), CollaboratorError> {
        self.enter("deprovision").await?;
        self.provisioned.remove(tenant);
        self.sizes.remove(tenant);
        self.routes.remove(tenant);
        Ok(())
    }

    async fn resize(&self, tenant: &TenantId, resources: &ResourceEnvelope) -> Result<(), CollaboratorError> {
        self.enter("resize").await?;
        self.sizes.insert(tenant.clone(), *resources);
        Ok(())
    }

    async fn export(&self, tenant: &TenantId) -> Result<ExportArtifact, CollaboratorError> {
        self.enter("export").await?;
        let data = serde_json::json!({
            "kind": self.kind,
            "tenant_id": tenant,
            "resources": self.size_of(tenant),
        });
        Ok(ExportArtifact::new(self.artifact_name(), data.to_string()))
    }

    async fn apply_routes(&self, tenant: &TenantId, routes: &[NetworkRoute]) -> Result<(), CollaboratorError> {
        self.enter("apply_routes").await?;
        self.routes.insert(tenant.clone(), routes.to_vec());
        Ok(())
    }
}

/// A ledger over a fresh memory backend, signed by a deterministic key.
pub struct MemoryLedger {
    pub store: Arc<LedgerStore>,
    pub backend: Arc<MemoryBackend>,
    pub identities: Arc<IdentityRegistry>,
}

pub fn memory_ledger() -> Result<MemoryLedger, IdentityError> {
    let identities = Arc::new(IdentityRegistry::new());
    let platform = identities.import("platform", [7u8; 32], BTreeMap::new())?;
    let backend = Arc::new(MemoryBackend::new());
    let signer = PlatformSigner::new(identities.clone(), platform.id);
    let store = Arc::new(LedgerStore::new(backend.clone(), signer));
    Ok(MemoryLedger {
        store,
        backend,
        identities,
    })
}

pub fn test_ledger() -> Result<Arc<LedgerStore>, IdentityError> {
    memory_ledger().map(|m| m.store)
}
