use chrono::{DateTime, Utc};
use imvu_types::{EventId, IdentityId, Payload, TenantId};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Previous-hash of the first event in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

const HASH_DOMAIN: &[u8] = b"imvu-ledger-event-v1:";
const SIGNATURE_DOMAIN: &[u8] = b"imvu-ledger-sig-v1:";

/// Ledger event classification.
///
/// Serialized as a snake_case string. Names outside the built-in set
/// round-trip through [`EventType::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventType {
    ComputeUsage,
    DnsQuery,
    MailSent,
    NetworkBytes,
    AuditAction,
    Consent,
    TenantLifecycle,
    IdentityRotation,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::ComputeUsage => "compute_usage",
            EventType::DnsQuery => "dns_query",
            EventType::MailSent => "mail_sent",
            EventType::NetworkBytes => "network_bytes",
            EventType::AuditAction => "audit_action",
            EventType::Consent => "consent",
            EventType::TenantLifecycle => "tenant_lifecycle",
            EventType::IdentityRotation => "identity_rotation",
            EventType::Other(name) => name,
        }
    }

    /// Parse a wire name. Unknown names become `Other`; empty names are rejected.
    pub fn parse(name: &str) -> LedgerResult<Self> {
        let name = name.trim();
        Ok(match name {
            "" => return Err(LedgerError::Validation("event type is required".into())),
            "compute_usage" => EventType::ComputeUsage,
            "dns_query" => EventType::DnsQuery,
            "mail_sent" => EventType::MailSent,
            "network_bytes" => EventType::NetworkBytes,
            "audit_action" => EventType::AuditAction,
            "consent" => EventType::Consent,
            "tenant_lifecycle" => EventType::TenantLifecycle,
            "identity_rotation" => EventType::IdentityRotation,
            other => EventType::Other(other.to_string()),
        })
    }

    /// Usage events carry billable units.
    pub fn is_billable(&self) -> bool {
        matches!(
            self,
            EventType::ComputeUsage
                | EventType::DnsQuery
                | EventType::MailSent
                | EventType::NetworkBytes
        )
    }

    fn validate(&self) -> LedgerResult<()> {
        if let EventType::Other(name) = self {
            // Normalizes through parse so `Other("consent")` cannot shadow a built-in.
            if EventType::parse(name)? != *self {
                return Err(LedgerError::Validation(format!(
                    "event type {name:?} must use its built-in variant"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for EventType {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventType::parse(&value)
    }
}

/// Request to append one event. The store assigns everything else.
#[derive(Clone, Debug)]
pub struct LedgerAppend {
    pub event_type: EventType,
    pub tenant_id: TenantId,
    pub actor: IdentityId,
    pub payload: Payload,
}

impl LedgerAppend {
    pub fn new(event_type: EventType, tenant_id: TenantId, actor: IdentityId) -> Self {
        Self {
            event_type,
            tenant_id,
            actor,
            payload: Payload::new(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub(crate) fn validate(&self) -> LedgerResult<()> {
        if self.tenant_id.is_empty() {
            return Err(LedgerError::Validation("tenant_id is required".into()));
        }
        if self.actor.is_empty() {
            return Err(LedgerError::Validation("actor is required".into()));
        }
        self.event_type.validate()
    }
}

/// An appended ledger event. Immutable once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: EventId,
    /// 1-based position in the tenant's chain.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub tenant_id: TenantId,
    pub actor: IdentityId,
    pub payload: Payload,
    pub previous_hash: String,
    /// BLAKE3 over every field except `hash` and `signature`.
    pub hash: String,
    pub signer: IdentityId,
    /// Platform signature over `(previous_hash, payload)`.
    pub signature: String,
}

impl LedgerEvent {
    /// Recompute the chain hash from the event's current contents.
    pub fn compute_hash(&self) -> LedgerResult<String> {
        let canonical = serde_json::json!({
            "id": self.id,
            "sequence": self.sequence,
            "timestamp": self.timestamp,
            "event_type": self.event_type,
            "tenant_id": self.tenant_id,
            "actor": self.actor,
            "payload": self.payload,
            "previous_hash": self.previous_hash,
            "signer": self.signer,
        });
        let bytes = serde_json::to_vec(&canonical)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(HASH_DOMAIN);
        hasher.update(&bytes);
        Ok(hasher.finalize().to_hex().to_string())
    }

    pub fn verify_hash(&self) -> LedgerResult<bool> {
        Ok(self.compute_hash()? == self.hash)
    }

    /// Bytes covered by the platform signature.
    pub fn signing_bytes(&self) -> LedgerResult<Vec<u8>> {
        signing_bytes(&self.previous_hash, &self.payload)
    }

    /// Convenience lookup of a string payload field.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

pub(crate) fn signing_bytes(previous_hash: &str, payload: &Payload) -> LedgerResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(SIGNATURE_DOMAIN.len() + previous_hash.len() + 64);
    bytes.extend_from_slice(SIGNATURE_DOMAIN);
    bytes.extend_from_slice(previous_hash.as_bytes());
    bytes.push(b':');
    bytes.extend_from_slice(&serde_json::to_vec(payload)?);
    Ok(bytes)
}
