//! The seventeen standard compliance gates.

use std::sync::Arc;

use crate::context::{ActionContext, ContextKey};
use crate::gate::Gate;

mod domain;
mod governance;
mod identity;
mod isolation;
mod metering;
mod network;

pub use domain::{DnsAuthorityScopingGate, DomainOwnershipClarityGate, MailAttributionGate};
pub use governance::{
    AuditLoggingGate, ConsentLoggingGate, ExitPortabilityGate, ImmutableSnapshotsGate,
    JurisdictionTaggingGate,
};
pub use identity::{IdentityBindingGate, PlatformNonRepudiationGate};
pub use isolation::{NoCrossTenantLeakageGate, TenantIsolationGate};
pub use metering::{NoSilentThrottlingGate, ResourceQuotaEnforcementGate, RevenueMeteringGate};
pub use network::{NetworkPathGovernanceGate, NoSilentRedirectionGate};

/// All standard gates, in canonical order.
pub fn standard_gates() -> Vec<Arc<dyn Gate>> {
    vec![
        Arc::new(IdentityBindingGate),
        Arc::new(TenantIsolationGate),
        Arc::new(DomainOwnershipClarityGate),
        Arc::new(DnsAuthorityScopingGate),
        Arc::new(MailAttributionGate),
        Arc::new(RevenueMeteringGate),
        Arc::new(ResourceQuotaEnforcementGate),
        Arc::new(NetworkPathGovernanceGate),
        Arc::new(JurisdictionTaggingGate),
        Arc::new(ConsentLoggingGate),
        Arc::new(AuditLoggingGate),
        Arc::new(ImmutableSnapshotsGate),
        Arc::new(ExitPortabilityGate),
        Arc::new(NoSilentRedirectionGate),
        Arc::new(NoSilentThrottlingGate),
        Arc::new(NoCrossTenantLeakageGate),
        Arc::new(PlatformNonRepudiationGate),
    ]
}

fn require_text(context: &ActionContext, key: ContextKey) -> Result<&str, String> {
    context
        .non_empty_text(key)
        .ok_or_else(|| format!("missing {key}"))
}
