//! IMVU Ledger: append-only, hash-chained, signed event log.
//!
//! Every tenant has its own chain. Each event carries the hash of its
//! predecessor and a platform signature over `(previous_hash, payload)`, so
//! any in-place edit of a persisted event is detectable by walking the chain.
//!
//! Appends for one tenant are serialized twice over: [`LedgerStore`] holds a
//! per-tenant async mutex across head-read/hash/sign/append, and the backend
//! performs a compare-and-append on the expected head hash. Different
//! tenants never contend.

pub mod backend;
pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use backend::LedgerBackend;
pub use error::{LedgerError, LedgerResult};
pub use event::{EventType, LedgerAppend, LedgerEvent, GENESIS_HASH};
pub use memory::MemoryBackend;
pub use store::{BreakReason, ChainBreak, ChainVerification, LedgerStore};
