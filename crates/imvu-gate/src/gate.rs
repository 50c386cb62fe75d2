use serde::{Deserialize, Serialize};

use crate::context::ActionContext;

/// Stable identifier of a compliance gate.
///
/// The seventeen standard gates are named variants; `Custom` lets
/// deployments register additional gates and reference them from the
/// action-class table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GateId {
    IdentityBinding,
    TenantIsolation,
    DomainOwnershipClarity,
    DnsAuthorityScoping,
    MailAttribution,
    RevenueMetering,
    ResourceQuotaEnforcement,
    NetworkPathGovernance,
    JurisdictionTagging,
    ConsentLogging,
    AuditLogging,
    ImmutableSnapshots,
    ExitPortability,
    NoSilentRedirection,
    NoSilentThrottling,
    NoCrossTenantLeakage,
    PlatformNonRepudiation,
    Custom(String),
}

impl GateId {
    /// The standard gates, in canonical order.
    pub const STANDARD: [GateId; 17] = [
        GateId::IdentityBinding,
        GateId::TenantIsolation,
        GateId::DomainOwnershipClarity,
        GateId::DnsAuthorityScoping,
        GateId::MailAttribution,
        GateId::RevenueMetering,
        GateId::ResourceQuotaEnforcement,
        GateId::NetworkPathGovernance,
        GateId::JurisdictionTagging,
        GateId::ConsentLogging,
        GateId::AuditLogging,
        GateId::ImmutableSnapshots,
        GateId::ExitPortability,
        GateId::NoSilentRedirection,
        GateId::NoSilentThrottling,
        GateId::NoCrossTenantLeakage,
        GateId::PlatformNonRepudiation,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            GateId::IdentityBinding => "identity-binding",
            GateId::TenantIsolation => "tenant-isolation",
            GateId::DomainOwnershipClarity => "domain-ownership-clarity",
            GateId::DnsAuthorityScoping => "dns-authority-scoping",
            GateId::MailAttribution => "mail-attribution",
            GateId::RevenueMetering => "revenue-metering",
            GateId::ResourceQuotaEnforcement => "resource-quota-enforcement",
            GateId::NetworkPathGovernance => "network-path-governance",
            GateId::JurisdictionTagging => "jurisdiction-tagging",
            GateId::ConsentLogging => "consent-logging",
            GateId::AuditLogging => "audit-logging",
            GateId::ImmutableSnapshots => "immutable-snapshots",
            GateId::ExitPortability => "exit-portability",
            GateId::NoSilentRedirection => "no-silent-redirection",
            GateId::NoSilentThrottling => "no-silent-throttling",
            GateId::NoCrossTenantLeakage => "no-cross-tenant-leakage",
            GateId::PlatformNonRepudiation => "platform-non-repudiation",
            GateId::Custom(name) => name,
        }
    }

    /// Parse a gate id. Unknown names become `Custom`.
    pub fn parse(name: &str) -> Result<Self, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("gate id must not be empty".into());
        }
        Ok(GateId::STANDARD
            .iter()
            .find(|g| g.as_str() == name)
            .cloned()
            .unwrap_or_else(|| GateId::Custom(name.to_string())))
    }

    pub fn is_standard(&self) -> bool {
        !matches!(self, GateId::Custom(_))
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GateId> for String {
    fn from(value: GateId) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for GateId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GateId::parse(&value)
    }
}

/// Outcome of one gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub gate: GateId,
    pub passed: bool,
    /// Why the gate failed. `None` on pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GateVerdict {
    pub fn pass(gate: GateId) -> Self {
        Self {
            gate,
            passed: true,
            reason: None,
        }
    }

    pub fn fail(gate: GateId, reason: impl Into<String>) -> Self {
        Self {
            gate,
            passed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn from_check(gate: GateId, check: Result<(), String>) -> Self {
        match check {
            Ok(()) => Self::pass(gate),
            Err(reason) => Self::fail(gate, reason),
        }
    }
}

/// Successful evaluation of an action class: every verdict passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub action_class: String,
    pub verdicts: Vec<GateVerdict>,
}

impl Evaluation {
    pub fn passed_gates(&self) -> Vec<GateId> {
        self.verdicts
            .iter()
            .filter(|v| v.passed)
            .map(|v| v.gate.clone())
            .collect()
    }

    pub fn is_pass(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }
}

/// A compliance gate.
///
/// Implementations must be pure: no I/O, no ledger access, no interior
/// mutation that changes later verdicts.
pub trait Gate: Send + Sync {
    fn id(&self) -> GateId;

    fn evaluate(&self, context: &ActionContext) -> GateVerdict;
}

/// Gate backed by a closure returning `Err(reason)` on failure.
pub struct FnGate<F> {
    id: GateId,
    check: F,
}

impl<F> FnGate<F>
where
    F: Fn(&ActionContext) -> Result<(), String> + Send + Sync,
{
    pub fn new(id: GateId, check: F) -> Self {
        Self { id, check }
    }
}

impl<F> Gate for FnGate<F>
where
    F: Fn(&ActionContext) -> Result<(), String> + Send + Sync,
{
    fn id(&self) -> GateId {
        self.id.clone()
    }

    fn evaluate(&self, context: &ActionContext) -> GateVerdict {
        GateVerdict::from_check(self.id.clone(), (self.check)(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        for gate in GateId::STANDARD.iter() {
            assert_eq!(&GateId::parse(gate.as_str()).unwrap(), gate);
            assert!(gate.is_standard());
        }
        assert_eq!(
            GateId::parse("geo-fence").unwrap(),
            GateId::Custom("geo-fence".into())
        );
        assert!(GateId::parse(" ").is_err());
    }

    #[test]
    fn ids_serialize_as_kebab_strings() {
        let json = serde_json::to_string(&GateId::NoCrossTenantLeakage).unwrap();
        assert_eq!(json, "\"no-cross-tenant-leakage\"");
    }

    #[test]
    fn fn_gate_maps_errors_to_failed_verdicts() {
        let gate = FnGate::new(GateId::Custom("always-no".into()), |_| Err("nope".into()));
        let verdict = gate.evaluate(&ActionContext::new());
        assert!(!verdict.passed);
        assert_eq!(verdict.reason.as_deref(), Some("nope"));
        assert_eq!(verdict.gate.as_str(), "always-no");
    }
}
