//! Core type definitions for the IMVU platform.
//!
//! No business logic lives here, only the identifiers, envelopes and ranges
//! every other platform crate speaks in.

pub mod error;
pub mod ids;
pub mod resources;
pub mod time;

pub use error::ErrorKind;
pub use ids::{EventId, IdentityId, TenantId};
pub use resources::ResourceEnvelope;
pub use time::TimeRange;

/// Structured ledger payload. Ordered so serialized bytes are deterministic.
pub type Payload = std::collections::BTreeMap<String, serde_json::Value>;
