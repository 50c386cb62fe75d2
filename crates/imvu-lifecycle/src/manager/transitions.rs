use std::sync::Arc;

use imvu_gate::{ActionContext, ContextKey, Evaluation};
use imvu_types::{IdentityId, Payload, ResourceEnvelope, TenantId};
use serde_json::json;
use tracing::{error, instrument, warn};

use super::{actor_of, TenantManager};
use crate::collaborator::with_timeout;
use crate::error::{LifecycleError, LifecycleResult};
use crate::rollback::{Compensation, RollbackGuard};
use crate::status::Transition;
use crate::tenant::Tenant;

impl TenantManager {
    /// Move the tenant to a new resource envelope.
    ///
    /// Two lifecycle events are written: `begin_scale` before any
    /// collaborator is touched and `complete_scale` after. If a resize
    /// fails, the collaborators already resized are restored, the scale is
    /// closed with the previous envelope and `outcome = "rolled_back"`, and
    /// the collaborator error is returned. Once `begin_scale` is committed
    /// the rest runs to completion even if the caller stops waiting.
    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn scale(
        &self,
        tenant_id: &TenantId,
        resources: ResourceEnvelope,
        ctx: ActionContext,
    ) -> LifecycleResult<Tenant> {
        let snapshot = self.snapshot_for(tenant_id, Transition::BeginScale).await?;
        let mut gate_ctx = self.derive_context(&snapshot, &ctx)?;
        gate_ctx.set(ContextKey::RequestedResources, resources);
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("tenant.scale", &gate_ctx, tenant_id, &actor).await?;

        let previous = snapshot.resources;
        let begun = self
            .commit(
                tenant_id,
                snapshot.version,
                Transition::BeginScale,
                &evaluation,
                &gate_ctx,
                &actor,
                Payload::from([
                    ("previous_resources".to_string(), json!(previous)),
                    ("requested_resources".to_string(), json!(resources)),
                ]),
                |_| {},
            )
            .await?;

        let manager = self.clone();
        let tenant_id = tenant_id.clone();
        let finish = tokio::spawn(async move {
            manager
                .finish_scale(&tenant_id, begun.version, previous, resources, evaluation, gate_ctx, actor)
                .await
        });
        finish
            .await
            .map_err(|e| LifecycleError::Task(format!("scale completion: {e}")))?
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_scale(
        &self,
        tenant_id: &TenantId,
        version: u64,
        previous: ResourceEnvelope,
        resources: ResourceEnvelope,
        evaluation: Evaluation,
        ctx: ActionContext,
        actor: IdentityId,
    ) -> LifecycleResult<Tenant> {
        let timeout = self.inner.config.collaborator_timeout;
        let mut guard = RollbackGuard::new(
            tenant_id.clone(),
            tenant_id.clone(),
            actor.clone(),
            Arc::clone(&self.inner.ledger),
            timeout,
        );

        let mut failure = None;
        for resource in self.inner.collaborators.iter() {
            let kind = resource.kind();
            match with_timeout(timeout, kind, "resize", resource.resize(tenant_id, &resources)).await {
                Ok(()) => guard.record(Arc::clone(resource), Compensation::Resize(previous)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(cause) = failure {
            let compensation_failures = guard.rollback().await.len();
            warn!(
                tenant_id = %tenant_id,
                error = %cause,
                compensation_failures,
                "Scale rolled back"
            );
            self.commit(
                tenant_id,
                version,
                Transition::CompleteScale,
                &evaluation,
                &ctx,
                &actor,
                Payload::from([
                    ("outcome".to_string(), json!("rolled_back")),
                    ("resources".to_string(), json!(previous)),
                    ("error".to_string(), json!(cause.to_string())),
                ]),
                |_| {},
            )
            .await
            .inspect_err(|e| error!(tenant_id = %tenant_id, error = %e, "Scale left open after rollback"))?;
            return Err(cause.into());
        }

        let completed = self
            .commit(
                tenant_id,
                version,
                Transition::CompleteScale,
                &evaluation,
                &ctx,
                &actor,
                Payload::from([
                    ("outcome".to_string(), json!("applied")),
                    ("resources".to_string(), json!(resources)),
                ]),
                |tenant| tenant.resources = resources,
            )
            .await;
        match completed {
            Ok(tenant) => {
                guard.commit();
                Ok(tenant)
            }
            Err(e) => {
                error!(tenant_id = %tenant_id, error = %e, "Scale left open, restoring previous envelope");
                guard.rollback().await;
                Err(e)
            }
        }
    }

    /// Throttle the tenant to zero. The reduction must be disclosed
    /// (`throttle_disclosed`) for no-silent-throttling to pass.
    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn suspend(&self, tenant_id: &TenantId, ctx: ActionContext) -> LifecycleResult<Tenant> {
        let snapshot = self.snapshot_for(tenant_id, Transition::Suspend).await?;
        let mut gate_ctx = self.derive_context(&snapshot, &ctx)?;
        gate_ctx.set(ContextKey::RequestedResources, ResourceEnvelope::zero());
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("tenant.suspend", &gate_ctx, tenant_id, &actor).await?;
        self.commit(
            tenant_id,
            snapshot.version,
            Transition::Suspend,
            &evaluation,
            &gate_ctx,
            &actor,
            Payload::new(),
            |_| {},
        )
        .await
    }

    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn resume(&self, tenant_id: &TenantId, ctx: ActionContext) -> LifecycleResult<Tenant> {
        let snapshot = self.snapshot_for(tenant_id, Transition::Resume).await?;
        let gate_ctx = self.derive_context(&snapshot, &ctx)?;
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("tenant.resume", &gate_ctx, tenant_id, &actor).await?;
        self.commit(
            tenant_id,
            snapshot.version,
            Transition::Resume,
            &evaluation,
            &gate_ctx,
            &actor,
            Payload::new(),
            |_| {},
        )
        .await
    }
}
