#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use imvu_gate::{ActionClassTable, ActionContext, ContextKey, GateEngine, NetworkRoute, RouteType};
use imvu_identity::IdentityRegistry;
use imvu_ledger::{LedgerStore, MemoryBackend};
use imvu_lifecycle::mocks::{memory_ledger, CallJournal, MockResource};
use imvu_lifecycle::{Collaborators, CreateTenantRequest, ManagerConfig, ResourceKind, Tenant, TenantManager};
use imvu_revenue::{RateCard, RevenueSplitter};
use imvu_types::{IdentityId, ResourceEnvelope, TenantId};
use tempfile::TempDir;

pub struct Harness {
    pub manager: TenantManager,
    pub ledger: Arc<LedgerStore>,
    pub backend: Arc<MemoryBackend>,
    pub identities: Arc<IdentityRegistry>,
    pub compute: Arc<MockResource>,
    pub domain: Arc<MockResource>,
    pub mail: Arc<MockResource>,
    pub network: Arc<MockResource>,
    pub journal: CallJournal,
    pub owner: IdentityId,
    pub exports: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let memory = memory_ledger().unwrap();
        let owner = memory
            .identities
            .issue("acme-owner", BTreeMap::new())
            .unwrap()
            .id;

        let journal: CallJournal = Arc::new(Mutex::new(Vec::new()));
        let mock = |kind| Arc::new(MockResource::new(kind).with_journal(journal.clone()));
        let (compute, domain, mail, network) = (
            mock(ResourceKind::Compute),
            mock(ResourceKind::Domain),
            mock(ResourceKind::Mail),
            mock(ResourceKind::Network),
        );
        let collaborators = Collaborators::new()
            .with(compute.clone())
            .with(domain.clone())
            .with(mail.clone())
            .with(network.clone());

        let exports = tempfile::tempdir().unwrap();
        let config = ManagerConfig {
            export_root: exports.path().join("bundles"),
            collaborator_timeout: timeout,
            ..ManagerConfig::default()
        };
        let gates = Arc::new(GateEngine::standard(ActionClassTable::embedded().unwrap()));
        let revenue = Arc::new(RevenueSplitter::new(
            memory.store.clone(),
            Arc::new(RateCard::default()),
        ));
        let manager = TenantManager::new(
            config,
            memory.store.clone(),
            gates,
            revenue,
            memory.identities.clone(),
            collaborators,
        );

        Self {
            manager,
            ledger: memory.store,
            backend: memory.backend,
            identities: memory.identities,
            compute,
            domain,
            mail,
            network,
            journal,
            owner,
            exports,
        }
    }

    pub fn request(&self) -> CreateTenantRequest {
        CreateTenantRequest::new("acme", self.owner.clone(), "EU", ResourceEnvelope::new(2, 4, 20, 100))
    }

    /// Context that satisfies every gate of the operations on `tenant`.
    pub fn ctx(&self, tenant: &TenantId) -> ActionContext {
        ActionContext::new()
            .with(ContextKey::Identity, self.owner.as_str())
            .with(ContextKey::ImvuId, tenant.as_str())
            .with(ContextKey::RequestId, "req-1")
            .with(ContextKey::BillingAccount, "acct-acme")
            .with(ContextKey::ConsentRef, "consent-1")
            .with(ContextKey::ThrottleDisclosed, true)
    }

    pub fn create_ctx(&self, tenant: &TenantId) -> ActionContext {
        self.ctx(tenant).with(ContextKey::NetworkRoutes, routes(tenant))
    }

    pub async fn create(&self) -> Tenant {
        let id = self.manager.allocate_tenant_id();
        self.manager
            .create_tenant(self.request(), self.create_ctx(&id))
            .await
            .unwrap()
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
    }

    /// Entries left in the export root, hidden ones included.
    pub fn export_entries(&self) -> Vec<String> {
        let root = self.manager.config().export_root.clone();
        if !root.exists() {
            return Vec::new();
        }
        let mut names: Vec<String> = std::fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn routes(tenant: &TenantId) -> Vec<NetworkRoute> {
    vec![NetworkRoute::new(
        tenant.as_str(),
        RouteType::Public,
        vec!["/".to_string()],
    )]
}
