//! Wiring for the IMVU platform core.
//!
//! Loads [`PlatformConfig`] from defaults, an optional file and `IMVU_*`
//! environment variables, installs the tracing subscriber, and assembles
//! the identity registry, ledger, gate engine, revenue splitter and tenant
//! manager into a [`Platform`].

pub mod config;
pub mod error;
pub mod platform;
pub mod telemetry;

pub use crate::config::{GatesConfig, LedgerConfig, LifecycleConfig, LoggingConfig, PlatformConfig};
pub use error::ConfigError;
pub use platform::Platform;
pub use telemetry::init_tracing;
