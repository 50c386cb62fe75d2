//! The tenant lifecycle manager.
//!
//! Operations are split by concern: [`create`] (id reservation and
//! provisioning), [`transitions`] (scale, suspend, resume), [`export`]
//! (export and delete) and [`activity`] (usage, consent, routes, identity
//! rotation). This module holds the shared machinery: context derivation,
//! gating with denial audit, and the locked commit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use imvu_gate::{ActionContext, ComplianceError, ContextKey, Evaluation, GateEngine, GateError};
use imvu_identity::IdentityRegistry;
use imvu_ledger::{ChainVerification, EventType, LedgerAppend, LedgerEvent, LedgerStore};
use imvu_revenue::{RevenueSplitter, RevenueSummary};
use imvu_types::{IdentityId, Payload, ResourceEnvelope, TenantId, TimeRange};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::collaborator::Collaborators;
use crate::error::{LifecycleError, LifecycleResult};
use crate::report::{ComplianceReport, GATE_DENIED};
use crate::status::Transition;
use crate::tenant::Tenant;

mod activity;
mod create;
mod export;
mod transitions;

/// Manager settings.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Directory export bundles are published under.
    pub export_root: PathBuf,
    /// Upper bound for every collaborator call; `None` waits indefinitely.
    pub collaborator_timeout: Option<Duration>,
    /// Largest envelope any tenant may request.
    pub resource_ceiling: ResourceEnvelope,
    pub domain_suffix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            export_root: PathBuf::from("./exports"),
            collaborator_timeout: Some(Duration::from_secs(30)),
            resource_ceiling: ResourceEnvelope::new(64, 256, 4096, 10_000),
            domain_suffix: "world".to_string(),
        }
    }
}

/// Drives tenants through their lifecycle.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TenantManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ManagerConfig,
    ledger: Arc<LedgerStore>,
    gates: Arc<GateEngine>,
    revenue: Arc<RevenueSplitter>,
    identities: Arc<IdentityRegistry>,
    collaborators: Collaborators,
    tenants: DashMap<TenantId, Arc<Mutex<Tenant>>>,
    /// Allocated tenant ids not yet used by a successful creation.
    reserved: DashSet<TenantId>,
    /// Held from key preparation until the rotation is logged and installed.
    rotations: DashMap<IdentityId, Arc<Mutex<()>>>,
}

impl TenantManager {
    pub fn new(
        config: ManagerConfig,
        ledger: Arc<LedgerStore>,
        gates: Arc<GateEngine>,
        revenue: Arc<RevenueSplitter>,
        identities: Arc<IdentityRegistry>,
        collaborators: Collaborators,
    ) -> Self {
        let missing = gates.missing_gates();
        if !missing.is_empty() {
            let missing: Vec<String> = missing.iter().map(|g| g.to_string()).collect();
            warn!(?missing, "Action class table references unregistered gates");
        }
        info!(
            collaborators = collaborators.len(),
            export_root = %config.export_root.display(),
            "Tenant manager ready"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                ledger,
                gates,
                revenue,
                identities,
                collaborators,
                tenants: DashMap::new(),
                reserved: DashSet::new(),
                rotations: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.inner.ledger
    }

    pub fn gates(&self) -> &Arc<GateEngine> {
        &self.inner.gates
    }

    // --- Read side ---

    pub async fn get_tenant(&self, tenant: &TenantId) -> LifecycleResult<Tenant> {
        let cell = self.cell(tenant)?;
        let snapshot = cell.lock().await.clone();
        Ok(snapshot)
    }

    /// Every known tenant, ordered by id.
    pub async fn list_tenants(&self) -> Vec<Tenant> {
        let cells: Vec<Arc<Mutex<Tenant>>> =
            self.inner.tenants.iter().map(|e| Arc::clone(e.value())).collect();
        let mut tenants = Vec::with_capacity(cells.len());
        for cell in cells {
            tenants.push(cell.lock().await.clone());
        }
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        tenants
    }

    /// The tenant's ledger events in `range`, in append order.
    pub async fn audit_trail(&self, tenant: &TenantId, range: TimeRange) -> LifecycleResult<Vec<LedgerEvent>> {
        Ok(self.inner.ledger.query(tenant, range, None).await?)
    }

    pub async fn verify_chain(&self, tenant: &TenantId) -> LifecycleResult<ChainVerification> {
        Ok(self.inner.ledger.verify_integrity(tenant).await?)
    }

    pub async fn compliance_report(&self, tenant: &TenantId, range: TimeRange) -> LifecycleResult<ComplianceReport> {
        let events = self.inner.ledger.query(tenant, range, None).await?;
        Ok(ComplianceReport::from_events(tenant.clone(), range, &events))
    }

    pub async fn revenue_summary(&self, tenant: &TenantId, range: TimeRange) -> LifecycleResult<RevenueSummary> {
        Ok(self.inner.revenue.summarize(tenant, range).await?)
    }

    /// Published export bundles of a tenant.
    pub fn bundles(&self, tenant: &TenantId) -> LifecycleResult<Vec<PathBuf>> {
        Ok(crate::export::list_bundles(&self.inner.config.export_root, tenant)?)
    }

    // --- Shared machinery ---

    fn cell(&self, tenant: &TenantId) -> LifecycleResult<Arc<Mutex<Tenant>>> {
        self.inner
            .tenants
            .get(tenant)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| LifecycleError::TenantNotFound(tenant.clone()))
    }

    /// Current tenant state, with `transition` checked against it.
    async fn snapshot_for(&self, tenant: &TenantId, transition: Transition) -> LifecycleResult<Tenant> {
        let snapshot = self.get_tenant(tenant).await?;
        if !snapshot.status.can(transition) {
            return Err(LifecycleError::IllegalTransition {
                tenant_id: tenant.clone(),
                from: snapshot.status,
                transition,
            });
        }
        Ok(snapshot)
    }

    /// Caller context plus the facts the manager knows about `tenant`.
    ///
    /// Derived keys overwrite whatever the caller put there.
    fn derive_context(&self, tenant: &Tenant, caller: &ActionContext) -> LifecycleResult<ActionContext> {
        if let Some(claimed) = caller.non_empty_text(ContextKey::ImvuId) {
            if !tenant.id.is_empty() && claimed != tenant.id.as_str() {
                return Err(LifecycleError::Validation(format!(
                    "context imvu_id {claimed} does not match tenant {}",
                    tenant.id
                )));
            }
        }

        let mut ctx = caller.clone();
        ctx.set(ContextKey::TenantOwner, tenant.owner.as_str());
        ctx.set(ContextKey::DomainOwner, tenant.owner.as_str());
        ctx.set(ContextKey::Jurisdiction, tenant.jurisdiction.as_str());
        ctx.set(ContextKey::CurrentResources, tenant.resources);
        ctx.set(ContextKey::ResourceCeiling, self.inner.config.resource_ceiling);
        ctx.set(ContextKey::CurrentStatus, tenant.status.as_str());
        ctx.set(ContextKey::MeteringEnabled, true);
        ctx.set(
            ContextKey::PlatformSigner,
            self.inner.ledger.signer_identity().as_str(),
        );
        for key in [
            ContextKey::Domain,
            ContextKey::MailSender,
            ContextKey::TargetTenants,
            ContextKey::SnapshotRef,
            ContextKey::ExportTarget,
            ContextKey::ExportBundle,
        ] {
            ctx.remove(key);
        }
        if !tenant.id.is_empty() {
            ctx.set(ContextKey::Domain, tenant.domain.as_str());
            ctx.set(ContextKey::MailSender, tenant.mailbox.as_str());
            ctx.set(ContextKey::TargetTenants, vec![tenant.id.as_str().to_string()]);
        }
        self.mark_identity(&mut ctx);
        Ok(ctx)
    }

    fn mark_identity(&self, ctx: &mut ActionContext) {
        let registered = ctx
            .non_empty_text(ContextKey::Identity)
            .map(|id| self.inner.identities.contains(&IdentityId::new(id)));
        match registered {
            Some(registered) => ctx.set(ContextKey::IdentityRegistered, registered),
            None => {
                ctx.remove(ContextKey::IdentityRegistered);
            }
        }
    }

    /// Evaluate `action_class`; a denial is audited on `audit_chain` before
    /// the untouched [`ComplianceError`] is returned.
    async fn gate(
        &self,
        action_class: &str,
        ctx: &ActionContext,
        audit_chain: &TenantId,
        actor: &IdentityId,
    ) -> LifecycleResult<Evaluation> {
        match self.inner.gates.evaluate(action_class, ctx) {
            Ok(evaluation) => Ok(evaluation),
            Err(GateError::Compliance(denied)) => {
                self.audit_denial(audit_chain, actor, &denied, ctx).await;
                Err(LifecycleError::Compliance(denied))
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn audit_denial(
        &self,
        chain: &TenantId,
        actor: &IdentityId,
        denied: &ComplianceError,
        ctx: &ActionContext,
    ) {
        let reasons: serde_json::Map<String, Value> = denied
            .failed()
            .map(|v| {
                (
                    v.gate.to_string(),
                    Value::from(v.reason.clone().unwrap_or_default()),
                )
            })
            .collect();
        let passed: Vec<String> = denied
            .verdicts
            .iter()
            .filter(|v| v.passed)
            .map(|v| v.gate.to_string())
            .collect();
        let failed: Vec<String> = denied.failed_gates().iter().map(|g| g.to_string()).collect();

        let event = LedgerAppend::new(EventType::AuditAction, chain.clone(), self.actor_or_platform(actor))
            .field("action", GATE_DENIED)
            .field("action_class", denied.action_class.as_str())
            .field("failed_gates", failed)
            .field("passed_gates", passed)
            .field("reasons", Value::Object(reasons))
            .field("context", context_value(ctx));
        if let Err(e) = self.inner.ledger.append(event).await {
            error!(
                tenant_id = %chain,
                action_class = %denied.action_class,
                error = %e,
                "Could not audit gate denial"
            );
        }
    }

    fn actor_or_platform(&self, actor: &IdentityId) -> IdentityId {
        if actor.is_empty() {
            self.inner.ledger.signer_identity().clone()
        } else {
            actor.clone()
        }
    }

    /// Append the lifecycle event for `transition` and update the cached
    /// tenant, all under the tenant mutex.
    ///
    /// Fails with [`LifecycleError::Conflict`] if another transition
    /// committed since `expected_version` was read.
    #[allow(clippy::too_many_arguments)]
    async fn commit<F>(
        &self,
        tenant_id: &TenantId,
        expected_version: u64,
        transition: Transition,
        evaluation: &Evaluation,
        ctx: &ActionContext,
        actor: &IdentityId,
        extra: Payload,
        apply: F,
    ) -> LifecycleResult<Tenant>
    where
        F: FnOnce(&mut Tenant),
    {
        self.commit_at(tenant_id, expected_version, None, transition, evaluation, ctx, actor, extra, apply)
            .await
    }

    /// [`commit`](Self::commit) that additionally requires the tenant chain
    /// head to still be `expected_head` once the tenant mutex is held.
    ///
    /// Activity events append under the same mutex, so a matching head
    /// means nothing was recorded between the read and this commit.
    #[allow(clippy::too_many_arguments)]
    async fn commit_at<F>(
        &self,
        tenant_id: &TenantId,
        expected_version: u64,
        expected_head: Option<&str>,
        transition: Transition,
        evaluation: &Evaluation,
        ctx: &ActionContext,
        actor: &IdentityId,
        extra: Payload,
        apply: F,
    ) -> LifecycleResult<Tenant>
    where
        F: FnOnce(&mut Tenant),
    {
        let cell = self.cell(tenant_id)?;
        let mut tenant = cell.lock().await;
        if tenant.version != expected_version {
            return Err(LifecycleError::Conflict {
                tenant_id: tenant_id.clone(),
                expected: expected_version,
                actual: tenant.version,
            });
        }
        if let Some(expected) = expected_head {
            let actual = self.inner.ledger.head_hash(tenant_id).await?;
            if actual != expected {
                warn!(tenant_id = %tenant_id, %transition, "Chain head moved before commit");
                return Err(LifecycleError::ChainMoved {
                    tenant_id: tenant_id.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        let from = tenant.status;
        let to = from.next(transition).ok_or_else(|| LifecycleError::IllegalTransition {
            tenant_id: tenant_id.clone(),
            from,
            transition,
        })?;

        let event = lifecycle_event(tenant_id, actor, transition, from.as_str(), to.as_str(), evaluation, ctx, extra);
        let appended = self.inner.ledger.append(event).await?;

        tenant.status = to;
        tenant.version += 1;
        tenant.updated_at = appended.timestamp;
        apply(&mut tenant);

        info!(
            tenant_id = %tenant_id,
            %transition,
            from = %from,
            to = %to,
            event_id = %appended.id,
            "Tenant transition committed"
        );
        Ok(tenant.clone())
    }
}

#[allow(clippy::too_many_arguments)]
fn lifecycle_event(
    tenant_id: &TenantId,
    actor: &IdentityId,
    transition: Transition,
    from: &str,
    to: &str,
    evaluation: &Evaluation,
    ctx: &ActionContext,
    extra: Payload,
) -> LedgerAppend {
    let mut event = LedgerAppend::new(EventType::TenantLifecycle, tenant_id.clone(), actor.clone())
        .field("action_class", evaluation.action_class.as_str())
        .field("transition", transition.as_str())
        .field("from", from)
        .field("to", to)
        .field("passed_gates", gate_names(evaluation))
        .field("context", context_value(ctx));
    for (key, value) in extra {
        event = event.field(key, value);
    }
    event
}

fn gate_names(evaluation: &Evaluation) -> Vec<String> {
    evaluation.passed_gates().iter().map(|g| g.to_string()).collect()
}

fn context_value(ctx: &ActionContext) -> Value {
    Value::Object(ctx.to_payload().into_iter().collect())
}

/// The acting identity named in the context, or `fallback`.
fn actor_of(ctx: &ActionContext, fallback: &IdentityId) -> IdentityId {
    ctx.non_empty_text(ContextKey::Identity)
        .map(IdentityId::new)
        .unwrap_or_else(|| fallback.clone())
}
