use std::sync::Arc;

use imvu_gate::{ActionContext, ContextKey, Evaluation, NetworkRoute};
use imvu_identity::IdentityRecord;
use imvu_ledger::{EventType, LedgerAppend, LedgerEvent};
use imvu_revenue::CostCategory;
use imvu_types::{IdentityId, TenantId};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use super::{actor_of, context_value, gate_names, TenantManager};
use crate::collaborator::{with_timeout, ResourceKind};
use crate::error::{LifecycleError, LifecycleResult};
use crate::rollback::{Compensation, RollbackGuard};
use crate::tenant::Tenant;

impl TenantManager {
    /// Meter usage for a tenant. The cost is priced and split at record
    /// time and embedded in the usage event.
    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn record_usage(
        &self,
        tenant_id: &TenantId,
        category: CostCategory,
        units: u64,
        ctx: ActionContext,
    ) -> LifecycleResult<LedgerEvent> {
        let snapshot = self.get_tenant(tenant_id).await?;
        require_operational(&snapshot, "usage.record")?;
        let gate_ctx = self.derive_context(&snapshot, &ctx)?;
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("usage.record", &gate_ctx, tenant_id, &actor).await?;
        let charge = self.inner.revenue.charge(category, units)?;

        let cell = self.cell(tenant_id)?;
        let tenant = cell.lock().await;
        require_operational(&tenant, "usage.record")?;
        let mut event = gated_event(category.event_type(), tenant_id, &actor, &evaluation, &gate_ctx);
        for (key, value) in charge.payload() {
            event = event.field(key, value);
        }
        let appended = self.inner.ledger.append(event).await?;
        drop(tenant);

        info!(
            tenant_id = %tenant_id,
            %category,
            units,
            cost_minor = charge.cost_minor,
            "Usage recorded"
        );
        Ok(appended)
    }

    /// Record a consent reference (`consent_ref` in the context).
    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn record_consent(&self, tenant_id: &TenantId, ctx: ActionContext) -> LifecycleResult<LedgerEvent> {
        let snapshot = self.get_tenant(tenant_id).await?;
        if snapshot.status.is_terminal() {
            return Err(not_operational(&snapshot, "consent.record"));
        }
        let gate_ctx = self.derive_context(&snapshot, &ctx)?;
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("consent.record", &gate_ctx, tenant_id, &actor).await?;

        let consent_ref = gate_ctx
            .non_empty_text(ContextKey::ConsentRef)
            .unwrap_or_default()
            .to_string();
        let event = gated_event(EventType::Consent, tenant_id, &actor, &evaluation, &gate_ctx)
            .field("consent_ref", consent_ref);

        let cell = self.cell(tenant_id)?;
        let tenant = cell.lock().await;
        if tenant.status.is_terminal() {
            return Err(not_operational(&tenant, "consent.record"));
        }
        let appended = self.inner.ledger.append(event).await?;
        drop(tenant);
        Ok(appended)
    }

    /// Install network routes through the network collaborators and audit
    /// them. Collaborators run outside the tenant lock.
    ///
    /// If the routes cannot be recorded afterwards (the tenant stopped
    /// being operational, or the append failed) the previous routes are
    /// reinstalled before the error is returned.
    #[instrument(skip(self, tenant_id, routes, ctx), fields(tenant_id = %tenant_id, routes = routes.len()))]
    pub async fn configure_routes(
        &self,
        tenant_id: &TenantId,
        routes: Vec<NetworkRoute>,
        ctx: ActionContext,
    ) -> LifecycleResult<Tenant> {
        let snapshot = self.get_tenant(tenant_id).await?;
        require_operational(&snapshot, "network.routes")?;
        let mut gate_ctx = self.derive_context(&snapshot, &ctx)?;
        gate_ctx.set(ContextKey::NetworkRoutes, routes.clone());
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("network.routes", &gate_ctx, tenant_id, &actor).await?;

        let timeout = self.inner.config.collaborator_timeout;
        let mut guard = RollbackGuard::new(
            tenant_id.clone(),
            tenant_id.clone(),
            actor.clone(),
            Arc::clone(&self.inner.ledger),
            timeout,
        );
        for resource in self.inner.collaborators.of_kind(ResourceKind::Network) {
            let applied = with_timeout(
                timeout,
                ResourceKind::Network,
                "apply_routes",
                resource.apply_routes(tenant_id, &routes),
            )
            .await;
            if let Err(e) = applied {
                guard.rollback().await;
                return Err(e.into());
            }
            guard.record(Arc::clone(resource), Compensation::Routes(snapshot.routes.clone()));
        }

        let event = gated_event(EventType::AuditAction, tenant_id, &actor, &evaluation, &gate_ctx)
            .field("action", "routes-configured")
            .field("routes", json!(routes));

        let cell = self.cell(tenant_id)?;
        let mut tenant = cell.lock().await;
        let recorded = match require_operational(&tenant, "network.routes") {
            Ok(()) => self.inner.ledger.append(event).await.map_err(LifecycleError::from),
            Err(e) => Err(e),
        };
        let appended = match recorded {
            Ok(appended) => appended,
            Err(e) => {
                drop(tenant);
                warn!(tenant_id = %tenant_id, error = %e, "Routes not recorded; reinstalling previous routes");
                guard.rollback().await;
                return Err(e);
            }
        };
        guard.commit();
        tenant.routes = routes;
        tenant.updated_at = appended.timestamp;
        info!(tenant_id = %tenant_id, routes = tenant.routes.len(), "Routes configured");
        Ok(tenant.clone())
    }

    /// Rotate an identity's key and log the rotation on the platform chain.
    ///
    /// Only the identity itself may rotate (`identity` must equal the
    /// rotated id). The next key is generated first, the rotation event
    /// carrying its public key is appended, and only then is the key put in
    /// effect. If the append fails the old key stays in effect.
    #[instrument(skip(self, identity, ctx), fields(identity = %identity.as_str()))]
    pub async fn rotate_identity(&self, identity: &IdentityId, ctx: ActionContext) -> LifecycleResult<IdentityRecord> {
        self.inner.identities.get(identity)?;
        let mut gate_ctx = ctx;
        gate_ctx.set(ContextKey::TenantOwner, identity.as_str());
        gate_ctx.set(
            ContextKey::PlatformSigner,
            self.inner.ledger.signer_identity().as_str(),
        );
        self.mark_identity(&mut gate_ctx);
        let actor = actor_of(&gate_ctx, identity);
        let platform_chain = TenantId::platform();
        let evaluation = self
            .gate("identity.rotate", &gate_ctx, &platform_chain, &actor)
            .await?;

        let lock = Arc::clone(
            self.inner
                .rotations
                .entry(identity.clone())
                .or_default()
                .value(),
        );
        let _rotating = lock.lock().await;

        let pending = self.inner.identities.prepare_rotation(identity)?;
        let event = gated_event(EventType::IdentityRotation, &platform_chain, &actor, &evaluation, &gate_ctx)
            .field("identity", identity.as_str())
            .field("key_version", pending.key_version())
            .field("public_key", pending.public_key());
        self.inner.ledger.append(event).await?;

        let record = self.inner.identities.complete_rotation(pending).map_err(|e| {
            error!(identity = %identity.as_str(), error = %e, "Rotation logged but not installed");
            e
        })?;
        info!(identity = %identity.as_str(), key_version = record.key_version, "Identity rotated");
        Ok(record)
    }
}

fn gated_event(
    event_type: EventType,
    tenant_id: &TenantId,
    actor: &IdentityId,
    evaluation: &Evaluation,
    ctx: &ActionContext,
) -> LedgerAppend {
    LedgerAppend::new(event_type, tenant_id.clone(), actor.clone())
        .field("action_class", evaluation.action_class.as_str())
        .field("passed_gates", gate_names(evaluation))
        .field("context", context_value(ctx))
}

fn require_operational(tenant: &Tenant, action: &str) -> LifecycleResult<()> {
    if tenant.status.is_operational() {
        Ok(())
    } else {
        Err(not_operational(tenant, action))
    }
}

fn not_operational(tenant: &Tenant, action: &str) -> LifecycleError {
    LifecycleError::NotOperational {
        tenant_id: tenant.id.clone(),
        status: tenant.status,
        action: action.to_string(),
    }
}
