//! Strong typed IDs used throughout the platform.

use serde::{Deserialize, Serialize};

/// Tenant (IMVU) identifier. DNS-label safe.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Identity identifier derived from an Ed25519 public key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub String);

/// Ledger event identifier. UUIDv7, so ids sort by creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

/// Reserved chain for platform-level events that belong to no tenant.
const PLATFORM_CHAIN: &str = "platform";

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh tenant id: `imvu-` followed by 12 hex digits.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("imvu-{}", &raw[..12]))
    }

    /// The reserved platform chain.
    pub fn platform() -> Self {
        Self(PLATFORM_CHAIN.to_string())
    }

    pub fn is_platform(&self) -> bool {
        self.0 == PLATFORM_CHAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `identity-` followed by the hex of the first 8 public key bytes.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self(format!("identity-{}", hex::encode(&public_key[..8])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tenant_ids_are_dns_safe_and_unique() {
        let a = TenantId::generate();
        let b = TenantId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("imvu-"));
        assert_eq!(a.as_str().len(), 17);
        assert!(a
            .as_str()
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn identity_id_derives_from_public_key_prefix() {
        let key = [0xabu8; 32];
        let id = IdentityId::from_public_key(&key);
        assert_eq!(id.as_str(), "identity-abababababababab");
    }

    #[test]
    fn event_ids_are_time_ordered() {
        let first = EventId::new();
        let second = EventId::new();
        assert!(first < second);
    }

    #[test]
    fn platform_chain_is_reserved() {
        assert!(TenantId::platform().is_platform());
        assert!(!TenantId::generate().is_platform());
    }

    #[test]
    fn display_formats() {
        let eid = EventId::new();
        assert!(eid.to_string().starts_with("evt:"));
        assert_eq!(TenantId::new("imvu-1").to_string(), "imvu-1");
    }
}
