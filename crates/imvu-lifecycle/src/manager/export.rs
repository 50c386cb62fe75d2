use chrono::Utc;
use imvu_gate::{ActionContext, ContextKey};
use imvu_ledger::{EventType, LedgerAppend, GENESIS_HASH};
use imvu_types::{Payload, TenantId, TimeRange};
use serde_json::json;
use tracing::{instrument, warn};

use super::{actor_of, TenantManager};
use crate::collaborator::with_timeout;
use crate::error::{CollaboratorError, LifecycleError, LifecycleResult};
use crate::export::BundleWriter;
use crate::status::Transition;
use crate::tenant::Tenant;

impl TenantManager {
    /// Export every collaborator's tenant data plus the ledger slice into a
    /// bundle and move the tenant to `exported`.
    ///
    /// The chain is verified first; a broken chain is never exported. The
    /// bundle only becomes visible once complete, and is withdrawn again if
    /// the lifecycle event cannot be appended. If anything was appended to
    /// the chain after the slice was cut, the export fails with
    /// [`LifecycleError::ChainMoved`] and may be retried.
    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn export_tenant(&self, tenant_id: &TenantId, ctx: ActionContext) -> LifecycleResult<Tenant> {
        let snapshot = self.snapshot_for(tenant_id, Transition::Export).await?;

        let verification = self.inner.ledger.verify_integrity(tenant_id).await?;
        if !verification.is_intact() {
            return Err(LifecycleError::Integrity { verification });
        }
        let events = self
            .inner
            .ledger
            .query(tenant_id, TimeRange::all(), None)
            .await?;
        let chain_head = events
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let root = &self.inner.config.export_root;
        let mut gate_ctx = self.derive_context(&snapshot, &ctx)?;
        gate_ctx.set(ContextKey::SnapshotRef, chain_head.as_str());
        gate_ctx.set(ContextKey::ExportTarget, root.display().to_string());
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("tenant.export", &gate_ctx, tenant_id, &actor).await?;

        let timeout = self.inner.config.collaborator_timeout;
        let mut writer = BundleWriter::stage(root, tenant_id).await?;
        for resource in self.inner.collaborators.iter() {
            let kind = resource.kind();
            let artifact = with_timeout(timeout, kind, "export", resource.export(tenant_id)).await?;
            writer.add(kind.as_str(), &artifact).await?;
        }
        writer.add_ledger(&events).await?;
        let bundle = writer
            .publish(Utc::now(), chain_head.clone(), events.len() as u64)
            .await?;

        let path = bundle.path().to_path_buf();
        let exported = self
            .commit_at(
                tenant_id,
                snapshot.version,
                Some(&chain_head),
                Transition::Export,
                &evaluation,
                &gate_ctx,
                &actor,
                Payload::from([
                    ("bundle".to_string(), json!(path.display().to_string())),
                    ("chain_head".to_string(), json!(chain_head)),
                    ("ledger_events".to_string(), json!(events.len())),
                ]),
                |tenant| tenant.last_export = Some(path.clone()),
            )
            .await?;
        bundle.commit();
        Ok(exported)
    }

    /// Deprovision every collaborator and move an exported tenant to
    /// `deleted`.
    ///
    /// Not transactional: deprovisioning cannot be undone. Every failure is
    /// audited, the first is returned and the status is left unchanged.
    /// Deprovision is idempotent, so the caller may simply retry.
    #[instrument(skip(self, tenant_id, ctx), fields(tenant_id = %tenant_id))]
    pub async fn delete_tenant(&self, tenant_id: &TenantId, ctx: ActionContext) -> LifecycleResult<Tenant> {
        let snapshot = self.snapshot_for(tenant_id, Transition::Delete).await?;
        let mut gate_ctx = self.derive_context(&snapshot, &ctx)?;
        if let Some(bundle) = &snapshot.last_export {
            gate_ctx.set(ContextKey::ExportBundle, bundle.display().to_string());
        }
        let actor = actor_of(&gate_ctx, &snapshot.owner);
        let evaluation = self.gate("tenant.delete", &gate_ctx, tenant_id, &actor).await?;

        let timeout = self.inner.config.collaborator_timeout;
        let mut first_failure: Option<CollaboratorError> = None;
        for resource in self.inner.collaborators.iter().rev() {
            let kind = resource.kind();
            if let Err(e) = with_timeout(timeout, kind, "deprovision", resource.deprovision(tenant_id)).await {
                warn!(tenant_id = %tenant_id, resource = %kind, error = %e, "Deprovision failed");
                let audit = LedgerAppend::new(EventType::AuditAction, tenant_id.clone(), actor.clone())
                    .field("action", "deprovision-failed")
                    .field("resource", kind.as_str())
                    .field("error", e.to_string());
                if let Err(audit_error) = self.inner.ledger.append(audit).await {
                    warn!(tenant_id = %tenant_id, error = %audit_error, "Could not audit deprovision failure");
                }
                first_failure.get_or_insert(e);
            }
        }
        if let Some(e) = first_failure {
            return Err(e.into());
        }

        self.commit(
            tenant_id,
            snapshot.version,
            Transition::Delete,
            &evaluation,
            &gate_ctx,
            &actor,
            Payload::new(),
            |tenant| {
                tenant.handles.clear();
                tenant.routes.clear();
            },
        )
        .await
    }
}
