use crate::context::{ActionContext, ContextKey};
use crate::gate::{Gate, GateId, GateVerdict};

use super::require_text;

/// Gate 1: the action is bound to a registered identity, and that identity
/// is the tenant owner when an owner is known.
pub struct IdentityBindingGate;

impl Gate for IdentityBindingGate {
    fn id(&self) -> GateId {
        GateId::IdentityBinding
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_identity_binding(context))
    }
}

fn check_identity_binding(context: &ActionContext) -> Result<(), String> {
    let identity = require_text(context, ContextKey::Identity)?;
    if context.flag(ContextKey::IdentityRegistered) == Some(false) {
        return Err(format!("identity {identity} is not registered"));
    }
    if let Some(owner) = context.non_empty_text(ContextKey::TenantOwner) {
        if owner != identity {
            return Err(format!("identity {identity} is not the tenant owner {owner}"));
        }
    }
    Ok(())
}

/// Gate 17: the platform signing identity is known, so the resulting ledger
/// event cannot be repudiated.
pub struct PlatformNonRepudiationGate;

impl Gate for PlatformNonRepudiationGate {
    fn id(&self) -> GateId {
        GateId::PlatformNonRepudiation
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(
            self.id(),
            require_text(context, ContextKey::PlatformSigner).map(|_| ()),
        )
    }
}
