use chrono::Utc;
use dashmap::DashSet;
use imvu_gate::{ActionContext, ContextKey};
use imvu_types::{Payload, TenantId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{actor_of, lifecycle_event, TenantManager};
use crate::collaborator::{with_timeout, ProvisionSpec};
use crate::error::{LifecycleError, LifecycleResult};
use crate::rollback::{Compensation, RollbackGuard};
use crate::status::{TenantStatus, Transition};
use crate::tenant::{sanitize_name, tenant_domain, tenant_mailbox, CreateTenantRequest, Tenant};

pub(crate) const CREATE: &str = "tenant.create";

/// A reserved id taken out of the pool for one creation attempt. Returned to
/// the pool on drop unless the creation committed.
struct ReservationClaim<'a> {
    pool: &'a DashSet<TenantId>,
    id: TenantId,
    committed: bool,
}

impl<'a> ReservationClaim<'a> {
    fn take(pool: &'a DashSet<TenantId>, id: &TenantId) -> Option<Self> {
        pool.remove(id).map(|id| Self {
            pool,
            id,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ReservationClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.pool.insert(self.id.clone());
        }
    }
}

impl TenantManager {
    /// Reserve a fresh tenant id for a later [`create_tenant`](Self::create_tenant).
    pub fn allocate_tenant_id(&self) -> TenantId {
        loop {
            let id = TenantId::generate();
            if !self.inner.tenants.contains_key(&id) && self.inner.reserved.insert(id.clone()) {
                debug!(tenant_id = %id, "Tenant id reserved");
                return id;
            }
        }
    }

    /// Create a tenant and bring it to `active`.
    ///
    /// The context's `imvu_id` must be an id from
    /// [`allocate_tenant_id`](Self::allocate_tenant_id) that no tenant uses
    /// yet. Collaborators are provisioned in order (compute, domain, mail,
    /// network); if one fails, the ones already provisioned are
    /// deprovisioned in reverse order and the collaborator error returned.
    #[instrument(skip(self, request, ctx), fields(tenant_name = %request.name))]
    pub async fn create_tenant(&self, request: CreateTenantRequest, ctx: ActionContext) -> LifecycleResult<Tenant> {
        request.validate()?;
        let label = sanitize_name(&request.name)?;
        let suffix = &self.inner.config.domain_suffix;

        let tenant_id = match ctx.non_empty_text(ContextKey::ImvuId) {
            Some(id) => {
                let id = TenantId::new(id);
                if self.inner.tenants.contains_key(&id) {
                    return Err(LifecycleError::Validation(format!("tenant {id} already exists")));
                }
                if !self.inner.reserved.contains(&id) {
                    return Err(LifecycleError::Validation(format!(
                        "tenant id {id} was not allocated by this manager"
                    )));
                }
                id
            }
            // Left to tenant-isolation to reject.
            None => TenantId::new(""),
        };

        let now = Utc::now();
        let (domain, mailbox) = if tenant_id.is_empty() {
            (String::new(), String::new())
        } else {
            let domain = tenant_domain(&label, &tenant_id, suffix);
            let mailbox = tenant_mailbox(&domain);
            (domain, mailbox)
        };
        let mut tenant = Tenant {
            id: tenant_id.clone(),
            name: label,
            owner: request.owner.clone(),
            jurisdiction: request.jurisdiction.clone(),
            resources: request.resources,
            domain,
            mailbox,
            status: TenantStatus::Provisioning,
            metadata: request.metadata.clone(),
            created_at: now,
            updated_at: now,
            version: 0,
            handles: Vec::new(),
            routes: Vec::new(),
            last_export: None,
        };

        let mut gate_ctx = self.derive_context(&tenant, &ctx)?;
        gate_ctx.set(ContextKey::RequestedResources, request.resources);
        gate_ctx.remove(ContextKey::CurrentResources);
        let actor = actor_of(&gate_ctx, &request.owner);
        let platform_chain = TenantId::platform();
        let evaluation = self.gate(CREATE, &gate_ctx, &platform_chain, &actor).await?;

        let claim = ReservationClaim::take(&self.inner.reserved, &tenant_id).ok_or_else(|| {
            LifecycleError::Validation(format!("tenant id {tenant_id} is already being created"))
        })?;

        let spec = ProvisionSpec {
            tenant_id: tenant_id.clone(),
            name: tenant.name.clone(),
            owner: tenant.owner.clone(),
            jurisdiction: tenant.jurisdiction.clone(),
            domain: tenant.domain.clone(),
            mailbox: tenant.mailbox.clone(),
            resources: tenant.resources,
        };
        let timeout = self.inner.config.collaborator_timeout;
        let mut guard = RollbackGuard::new(
            tenant_id.clone(),
            platform_chain,
            actor.clone(),
            Arc::clone(&self.inner.ledger),
            timeout,
        );
        for resource in self.inner.collaborators.iter() {
            let kind = resource.kind();
            match with_timeout(timeout, kind, "provision", resource.provision(&spec)).await {
                Ok(handle) => {
                    debug!(tenant_id = %tenant_id, resource = %kind, "Provisioned");
                    guard.record(Arc::clone(resource), Compensation::Deprovision);
                    tenant.handles.push(handle);
                }
                Err(e) => {
                    guard.rollback().await;
                    return Err(e.into());
                }
            }
        }

        let extra = Payload::from([
            ("name".to_string(), tenant.name.clone().into()),
            ("owner".to_string(), tenant.owner.as_str().into()),
            ("jurisdiction".to_string(), tenant.jurisdiction.clone().into()),
            ("domain".to_string(), tenant.domain.clone().into()),
            ("mailbox".to_string(), tenant.mailbox.clone().into()),
            ("resources".to_string(), serde_json::json!(tenant.resources)),
        ]);
        let event = lifecycle_event(
            &tenant_id,
            &actor,
            Transition::Activate,
            TenantStatus::Provisioning.as_str(),
            TenantStatus::Active.as_str(),
            &evaluation,
            &gate_ctx,
            extra,
        );
        let appended = match self.inner.ledger.append(event).await {
            Ok(appended) => appended,
            Err(e) => {
                guard.rollback().await;
                return Err(e.into());
            }
        };

        tenant.status = TenantStatus::Active;
        tenant.version = 1;
        tenant.updated_at = appended.timestamp;
        self.inner
            .tenants
            .insert(tenant_id.clone(), Arc::new(Mutex::new(tenant.clone())));
        guard.commit();
        claim.commit();

        info!(
            tenant_id = %tenant_id,
            domain = %tenant.domain,
            event_id = %appended.id,
            "Tenant created"
        );
        Ok(tenant)
    }
}
