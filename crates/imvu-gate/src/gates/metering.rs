use crate::context::{ActionContext, ContextKey};
use crate::gate::{Gate, GateId, GateVerdict};

use super::require_text;

/// Gate 6: the action is metered against a billing account.
pub struct RevenueMeteringGate;

impl Gate for RevenueMeteringGate {
    fn id(&self) -> GateId {
        GateId::RevenueMetering
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_metering(context))
    }
}

fn check_metering(context: &ActionContext) -> Result<(), String> {
    if context.flag(ContextKey::MeteringEnabled) != Some(true) {
        return Err("metering is not enabled".into());
    }
    require_text(context, ContextKey::BillingAccount).map(|_| ())
}

/// Gate 7: the requested envelope is non-zero in every dimension and within
/// the platform ceiling.
pub struct ResourceQuotaEnforcementGate;

impl Gate for ResourceQuotaEnforcementGate {
    fn id(&self) -> GateId {
        GateId::ResourceQuotaEnforcement
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_quota(context))
    }
}

fn check_quota(context: &ActionContext) -> Result<(), String> {
    let requested = context
        .resources(ContextKey::RequestedResources)
        .ok_or_else(|| format!("missing {}", ContextKey::RequestedResources))?;
    let ceiling = context
        .resources(ContextKey::ResourceCeiling)
        .ok_or_else(|| format!("missing {}", ContextKey::ResourceCeiling))?;
    if requested.has_zero_dimension() {
        return Err(format!("requested envelope {requested} has a zero dimension"));
    }
    if !requested.fits_within(ceiling) {
        return Err(format!("requested envelope {requested} exceeds ceiling {ceiling}"));
    }
    Ok(())
}

/// Gate 15: any reduction of a tenant's resources is disclosed.
pub struct NoSilentThrottlingGate;

impl Gate for NoSilentThrottlingGate {
    fn id(&self) -> GateId {
        GateId::NoSilentThrottling
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id(), check_throttling(context))
    }
}

fn check_throttling(context: &ActionContext) -> Result<(), String> {
    let (Some(requested), Some(current)) = (
        context.resources(ContextKey::RequestedResources),
        context.resources(ContextKey::CurrentResources),
    ) else {
        return Ok(());
    };
    if requested.is_below_in_any(current) && context.flag(ContextKey::ThrottleDisclosed) != Some(true)
    {
        return Err(format!(
            "reduction from {current} to {requested} is not disclosed"
        ));
    }
    Ok(())
}
