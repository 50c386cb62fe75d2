//! Compensation of collaborator effects that never reached the ledger.

use std::sync::Arc;
use std::time::Duration;

use imvu_gate::NetworkRoute;
use imvu_ledger::{EventType, LedgerAppend, LedgerStore};
use imvu_types::{IdentityId, ResourceEnvelope, TenantId};
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::collaborator::{with_timeout, TenantResource};
use crate::error::CollaboratorError;

/// How to undo one applied step.
#[derive(Clone, Debug)]
pub(crate) enum Compensation {
    Deprovision,
    /// Restore the previous envelope.
    Resize(ResourceEnvelope),
    /// Reinstall the previous routes.
    Routes(Vec<NetworkRoute>),
}

/// Tracks applied collaborator effects until the operation commits.
///
/// Dropping an armed guard (the operation future was cancelled, or returned
/// early) spawns the compensating calls on the current runtime.
pub(crate) struct RollbackGuard {
    plan: CompensationPlan,
    armed: bool,
}

struct CompensationPlan {
    tenant_id: TenantId,
    audit_chain: TenantId,
    actor: IdentityId,
    ledger: Arc<LedgerStore>,
    timeout: Option<Duration>,
    steps: Vec<(Arc<dyn TenantResource>, Compensation)>,
}

impl RollbackGuard {
    pub(crate) fn new(
        tenant_id: TenantId,
        audit_chain: TenantId,
        actor: IdentityId,
        ledger: Arc<LedgerStore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            plan: CompensationPlan {
                tenant_id,
                audit_chain,
                actor,
                ledger,
                timeout,
                steps: Vec::new(),
            },
            armed: true,
        }
    }

    pub(crate) fn record(&mut self, resource: Arc<dyn TenantResource>, compensation: Compensation) {
        self.plan.steps.push((resource, compensation));
    }

    /// The effects are now backed by a ledger event; keep them.
    pub(crate) fn commit(mut self) {
        self.armed = false;
    }

    /// Undo every recorded step, newest first.
    pub(crate) async fn rollback(mut self) -> Vec<CollaboratorError> {
        self.armed = false;
        let steps = std::mem::take(&mut self.plan.steps);
        self.plan.run(steps).await
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if !self.armed || self.plan.steps.is_empty() {
            return;
        }
        let steps = std::mem::take(&mut self.plan.steps);
        let plan = CompensationPlan {
            tenant_id: self.plan.tenant_id.clone(),
            audit_chain: self.plan.audit_chain.clone(),
            actor: self.plan.actor.clone(),
            ledger: Arc::clone(&self.plan.ledger),
            timeout: self.plan.timeout,
            steps: Vec::new(),
        };
        match Handle::try_current() {
            Ok(handle) => {
                warn!(
                    tenant_id = %plan.tenant_id,
                    steps = steps.len(),
                    "Operation abandoned before commit; compensating"
                );
                handle.spawn(async move {
                    plan.run(steps).await;
                });
            }
            Err(_) => error!(
                tenant_id = %plan.tenant_id,
                steps = steps.len(),
                "No runtime to compensate abandoned collaborator effects"
            ),
        }
    }
}

impl CompensationPlan {
    async fn run(&self, steps: Vec<(Arc<dyn TenantResource>, Compensation)>) -> Vec<CollaboratorError> {
        let mut failures = Vec::new();
        for (resource, compensation) in steps.into_iter().rev() {
            let kind = resource.kind();
            let result = match compensation {
                Compensation::Deprovision => {
                    with_timeout(self.timeout, kind, "deprovision", resource.deprovision(&self.tenant_id))
                        .await
                }
                Compensation::Resize(previous) => {
                    with_timeout(
                        self.timeout,
                        kind,
                        "resize",
                        resource.resize(&self.tenant_id, &previous),
                    )
                    .await
                }
                Compensation::Routes(previous) => {
                    with_timeout(
                        self.timeout,
                        kind,
                        "apply_routes",
                        resource.apply_routes(&self.tenant_id, &previous),
                    )
                    .await
                }
            };
            match result {
                Ok(()) => debug!(tenant_id = %self.tenant_id, resource = %kind, "Compensated"),
                Err(e) => {
                    warn!(tenant_id = %self.tenant_id, resource = %kind, error = %e, "Compensation failed");
                    self.audit_failure(&e).await;
                    failures.push(e);
                }
            }
        }
        failures
    }

    async fn audit_failure(&self, failure: &CollaboratorError) {
        let (operation, message) = match failure {
            CollaboratorError::Failed { operation, message, .. } => (operation.clone(), message.clone()),
            CollaboratorError::Timeout { operation, .. } => (operation.clone(), failure.to_string()),
        };
        let event = LedgerAppend::new(EventType::AuditAction, self.audit_chain.clone(), self.actor.clone())
            .field("action", "compensation-failed")
            .field("tenant", self.tenant_id.as_str())
            .field("resource", failure.resource().as_str())
            .field("operation", operation)
            .field("error", message);
        if let Err(e) = self.ledger.append(event).await {
            error!(
                tenant_id = %self.tenant_id,
                error = %e,
                "Could not audit compensation failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ResourceKind;
    use crate::mocks::{test_ledger, MockResource};
    use imvu_types::TimeRange;

    #[tokio::test]
    async fn rollback_runs_newest_first_and_audits_failures() {
        let ledger = test_ledger().unwrap();
        let tenant = TenantId::new("imvu-rollback");
        let compute = Arc::new(MockResource::new(ResourceKind::Compute));
        let domain = Arc::new(MockResource::new(ResourceKind::Domain));
        domain.fail_on("deprovision");

        let mut guard = RollbackGuard::new(
            tenant.clone(),
            tenant.clone(),
            IdentityId::new("identity-abc"),
            ledger.clone(),
            None,
        );
        guard.record(compute.clone(), Compensation::Deprovision);
        guard.record(domain.clone(), Compensation::Deprovision);

        let failures = guard.rollback().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].resource(), ResourceKind::Domain);
        assert_eq!(compute.calls(), vec!["deprovision"]);

        let audits = ledger
            .query(&tenant, TimeRange::all(), Some(&EventType::AuditAction))
            .await
            .unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].payload_str("action"), Some("compensation-failed"));
        assert_eq!(audits[0].payload_str("resource"), Some("domain"));
    }

    #[tokio::test]
    async fn committed_guard_leaves_effects_alone() {
        let compute = Arc::new(MockResource::new(ResourceKind::Compute));
        let mut guard = RollbackGuard::new(
            TenantId::new("imvu-a"),
            TenantId::new("imvu-a"),
            IdentityId::new("identity-abc"),
            test_ledger().unwrap(),
            None,
        );
        guard.record(compute.clone(), Compensation::Resize(ResourceEnvelope::new(1, 1, 1, 1)));
        guard.commit();
        tokio::task::yield_now().await;
        assert!(compute.calls().is_empty());
    }

    #[tokio::test]
    async fn dropped_guard_compensates_in_the_background() {
        let compute = Arc::new(MockResource::new(ResourceKind::Compute));
        {
            let mut guard = RollbackGuard::new(
                TenantId::new("imvu-a"),
                TenantId::new("imvu-a"),
                IdentityId::new("identity-abc"),
                test_ledger().unwrap(),
                None,
            );
            guard.record(compute.clone(), Compensation::Deprovision);
        }
        for _ in 0..10 {
            if !compute.calls().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(compute.calls(), vec!["deprovision"]);
    }
}
