//! Compliance Gate Engine.
//!
//! A gate is a pure predicate over an [`ActionContext`]. Every action class
//! maps to an ordered list of gate ids; the mapping is data
//! ([`ActionClassTable`], TOML) and not code, so new action classes can be
//! declared without touching gate logic.
//!
//! Evaluation never stops at the first failure. Every gate required for the
//! class is evaluated and all failures come back together in a
//! [`ComplianceError`], so a caller sees the complete picture in one round
//! trip. Gate failures are never retried: they mean the context is missing
//! a precondition.
//!
//! ## Standard gates
//!
//! identity-binding, tenant-isolation, domain-ownership-clarity,
//! dns-authority-scoping, mail-attribution, revenue-metering,
//! resource-quota-enforcement, network-path-governance, jurisdiction-tagging,
//! consent-logging, audit-logging, immutable-snapshots, exit-portability,
//! no-silent-redirection, no-silent-throttling, no-cross-tenant-leakage,
//! platform-non-repudiation.

pub mod context;
pub mod engine;
pub mod error;
pub mod gate;
pub mod gates;
pub mod mocks;
pub mod table;

pub use context::{ActionContext, ContextKey, ContextValue, NetworkRoute, RouteType};
pub use engine::GateEngine;
pub use error::{ComplianceError, GateError};
pub use gate::{Evaluation, FnGate, Gate, GateId, GateVerdict};
pub use gates::standard_gates;
pub use table::{ActionClassTable, ACTION_CLASSES};
