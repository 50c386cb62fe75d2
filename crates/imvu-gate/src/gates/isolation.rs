use crate::context::{ActionContext, ContextKey};
use crate::gate::{Gate, GateId, GateVerdict};

use super::require_text;

/// Gate 2: the action is scoped to exactly one tenant.
pub struct TenantIsolationGate;

impl Gate for TenantIsolationGate {
    fn id(&self) -> GateId {
        GateId::TenantIsolation
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(
            self.id(),
            require_text(context, ContextKey::ImvuId).map(|_| ()),
        )
    }
}

/// Gate 16: nothing the action touches belongs to another tenant.
pub struct NoCrossTenantLeakageGate;

impl Gate for NoCrossTenantLeakageGate {
    fn id(&self) -> GateId {
        GateId::NoCrossTenantLeakage
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_no_leakage(context))
    }
}

fn check_no_leakage(context: &ActionContext) -> Result<(), String> {
    let tenant = require_text(context, ContextKey::ImvuId)?;

    let foreign: Vec<&str> = context
        .list(ContextKey::TargetTenants)
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .chain(
            context
                .routes(ContextKey::NetworkRoutes)
                .unwrap_or_default()
                .iter()
                .map(|r| r.tenant_id.as_str()),
        )
        .filter(|t| *t != tenant)
        .collect();

    if foreign.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "action for {tenant} reaches other tenants: {}",
            foreign.join(", ")
        ))
    }
}
