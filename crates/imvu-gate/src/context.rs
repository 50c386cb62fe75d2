use std::collections::BTreeMap;

use imvu_types::{Payload, ResourceEnvelope};
use serde::{Deserialize, Serialize};

/// Every key a gate may read from an [`ActionContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    Identity,
    IdentityRegistered,
    ImvuId,
    TenantOwner,
    Jurisdiction,
    Domain,
    DomainOwner,
    MailSender,
    BillingAccount,
    MeteringEnabled,
    RequestedResources,
    CurrentResources,
    ResourceCeiling,
    NetworkRoutes,
    ConsentRef,
    RequestId,
    SnapshotRef,
    ExportTarget,
    ExportBundle,
    Redirects,
    DisclosedRedirects,
    ThrottleDisclosed,
    TargetTenants,
    PlatformSigner,
    CurrentStatus,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::Identity => "identity",
            ContextKey::IdentityRegistered => "identity_registered",
            ContextKey::ImvuId => "imvu_id",
            ContextKey::TenantOwner => "tenant_owner",
            ContextKey::Jurisdiction => "jurisdiction",
            ContextKey::Domain => "domain",
            ContextKey::DomainOwner => "domain_owner",
            ContextKey::MailSender => "mail_sender",
            ContextKey::BillingAccount => "billing_account",
            ContextKey::MeteringEnabled => "metering_enabled",
            ContextKey::RequestedResources => "requested_resources",
            ContextKey::CurrentResources => "current_resources",
            ContextKey::ResourceCeiling => "resource_ceiling",
            ContextKey::NetworkRoutes => "network_routes",
            ContextKey::ConsentRef => "consent_ref",
            ContextKey::RequestId => "request_id",
            ContextKey::SnapshotRef => "snapshot_ref",
            ContextKey::ExportTarget => "export_target",
            ContextKey::ExportBundle => "export_bundle",
            ContextKey::Redirects => "redirects",
            ContextKey::DisclosedRedirects => "disclosed_redirects",
            ContextKey::ThrottleDisclosed => "throttle_disclosed",
            ContextKey::TargetTenants => "target_tenants",
            ContextKey::PlatformSigner => "platform_signer",
            ContextKey::CurrentStatus => "current_status",
        }
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network route visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Public,
    Private,
    /// Reachable only by an authenticated identity.
    Restricted,
}

/// A tenant-scoped network route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRoute {
    pub tenant_id: String,
    pub route_type: RouteType,
    pub paths: Vec<String>,
}

impl NetworkRoute {
    pub fn new(tenant_id: impl Into<String>, route_type: RouteType, paths: Vec<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            route_type,
            paths,
        }
    }
}

/// A typed context value.
///
/// Untagged on the wire; an empty JSON array reads back as `List`, which
/// the route accessor treats as an empty route set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Text(String),
    Flag(bool),
    Resources(ResourceEnvelope),
    List(Vec<String>),
    Routes(Vec<NetworkRoute>),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Flag(value)
    }
}

impl From<ResourceEnvelope> for ContextValue {
    fn from(value: ResourceEnvelope) -> Self {
        ContextValue::Resources(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(value: Vec<String>) -> Self {
        ContextValue::List(value)
    }
}

impl From<Vec<NetworkRoute>> for ContextValue {
    fn from(value: Vec<NetworkRoute>) -> Self {
        ContextValue::Routes(value)
    }
}

/// Input to gate evaluation, built per gated action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionContext {
    values: BTreeMap<ContextKey, ContextValue>,
}

impl ActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ContextKey, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, key: ContextKey, value: impl Into<ContextValue>) {
        self.values.insert(key, value.into());
    }

    pub fn remove(&mut self, key: ContextKey) -> Option<ContextValue> {
        self.values.remove(&key)
    }

    pub fn get(&self, key: ContextKey) -> Option<&ContextValue> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, key: ContextKey) -> Option<&str> {
        match self.values.get(&key) {
            Some(ContextValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text value with surrounding whitespace removed; blank counts as absent.
    pub fn non_empty_text(&self, key: ContextKey) -> Option<&str> {
        self.text(key).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn flag(&self, key: ContextKey) -> Option<bool> {
        match self.values.get(&key) {
            Some(ContextValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn resources(&self, key: ContextKey) -> Option<&ResourceEnvelope> {
        match self.values.get(&key) {
            Some(ContextValue::Resources(r)) => Some(r),
            _ => None,
        }
    }

    pub fn list(&self, key: ContextKey) -> Option<&[String]> {
        match self.values.get(&key) {
            Some(ContextValue::List(l)) => Some(l.as_slice()),
            _ => None,
        }
    }

    pub fn routes(&self, key: ContextKey) -> Option<&[NetworkRoute]> {
        match self.values.get(&key) {
            Some(ContextValue::Routes(r)) => Some(r.as_slice()),
            Some(ContextValue::List(l)) if l.is_empty() => Some(&[]),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContextKey, &ContextValue)> {
        self.values.iter()
    }

    /// Fold the context into a ledger payload keyed by wire names.
    pub fn to_payload(&self) -> Payload {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                serde_json::to_value(value)
                    .ok()
                    .map(|v| (key.as_str().to_string(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let ctx = ActionContext::new()
            .with(ContextKey::Identity, "identity-abc")
            .with(ContextKey::MeteringEnabled, true)
            .with(ContextKey::RequestedResources, ResourceEnvelope::new(1, 2, 3, 4))
            .with(ContextKey::Redirects, vec!["a.world".to_string()]);

        assert_eq!(ctx.text(ContextKey::Identity), Some("identity-abc"));
        assert_eq!(ctx.flag(ContextKey::MeteringEnabled), Some(true));
        assert_eq!(
            ctx.resources(ContextKey::RequestedResources).map(|r| r.cpu_cores),
            Some(1)
        );
        assert_eq!(ctx.list(ContextKey::Redirects).map(|l| l.len()), Some(1));
        // Wrong type reads as absent.
        assert_eq!(ctx.flag(ContextKey::Identity), None);
        assert_eq!(ctx.text(ContextKey::ImvuId), None);
    }

    #[test]
    fn blank_text_is_absent() {
        let ctx = ActionContext::new().with(ContextKey::ConsentRef, "   ");
        assert_eq!(ctx.non_empty_text(ContextKey::ConsentRef), None);
        assert_eq!(ctx.text(ContextKey::ConsentRef), Some("   "));
    }

    #[test]
    fn set_overrides() {
        let mut ctx = ActionContext::new().with(ContextKey::Jurisdiction, "US");
        ctx.set(ContextKey::Jurisdiction, "EU");
        assert_eq!(ctx.text(ContextKey::Jurisdiction), Some("EU"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn payload_uses_wire_names() {
        let route = NetworkRoute::new("imvu-1", RouteType::Restricted, vec!["/api".into()]);
        let ctx = ActionContext::new()
            .with(ContextKey::ImvuId, "imvu-1")
            .with(ContextKey::NetworkRoutes, vec![route]);
        let payload = ctx.to_payload();
        assert_eq!(payload["imvu_id"], serde_json::json!("imvu-1"));
        assert_eq!(
            payload["network_routes"][0]["route_type"],
            serde_json::json!("restricted")
        );
    }

    #[test]
    fn deserializes_from_json_object() {
        let json = serde_json::json!({
            "identity": "identity-abc",
            "throttle_disclosed": true,
            "requested_resources": {"cpu_cores": 2, "memory_gb": 4, "storage_gb": 10, "bandwidth_mbps": 100},
            "target_tenants": ["imvu-1"],
            "network_routes": [],
        });
        let ctx: ActionContext = serde_json::from_value(json).unwrap();
        assert_eq!(ctx.flag(ContextKey::ThrottleDisclosed), Some(true));
        assert_eq!(
            ctx.resources(ContextKey::RequestedResources),
            Some(&ResourceEnvelope::new(2, 4, 10, 100))
        );
        assert_eq!(ctx.list(ContextKey::TargetTenants).map(|l| l.len()), Some(1));
        assert_eq!(ctx.routes(ContextKey::NetworkRoutes).map(|r| r.len()), Some(0));
    }
}
