//! Platform configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional file
//! (any format the `config` crate understands), then environment variables
//! such as `IMVU_LOGGING__LEVEL=debug` or `IMVU_LIFECYCLE__DOMAIN_SUFFIX=net`.

use std::path::PathBuf;
use std::time::Duration;

use imvu_lifecycle::ManagerConfig;
use imvu_revenue::RateCard;
use imvu_types::ResourceEnvelope;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub gates: GatesConfig,

    /// Per-unit prices.
    #[serde(default)]
    pub revenue: RateCard,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Name the platform signing identity is registered under.
    #[serde(default = "default_platform_identity")]
    pub platform_identity: String,

    /// Hex-encoded 32-byte Ed25519 seed. A fresh key is generated when
    /// absent, which makes existing signatures unverifiable after restart.
    #[serde(default)]
    pub platform_key_seed: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            platform_identity: default_platform_identity(),
            platform_key_seed: None,
        }
    }
}

impl LedgerConfig {
    pub fn seed(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        let Some(seed) = self.platform_key_seed.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if seed.is_empty() {
            return Ok(None);
        }
        let bytes = hex::decode(seed).map_err(|e| ConfigError::InvalidSeed(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| ConfigError::InvalidSeed(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Some(seed))
    }
}

/// Where the action-class table comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatesConfig {
    /// TOML file replacing the embedded table.
    #[serde(default)]
    pub action_classes: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_export_root")]
    pub export_root: PathBuf,

    /// 0 disables the timeout.
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,

    #[serde(default = "default_resource_ceiling")]
    pub resource_ceiling: ResourceEnvelope,

    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let manager = ManagerConfig::default();
        Self {
            export_root: manager.export_root,
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            resource_ceiling: manager.resource_ceiling,
            domain_suffix: manager.domain_suffix,
        }
    }
}

impl LifecycleConfig {
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            export_root: self.export_root.clone(),
            collaborator_timeout: (self.collaborator_timeout_ms > 0)
                .then(|| Duration::from_millis(self.collaborator_timeout_ms)),
            resource_ceiling: self.resource_ceiling,
            domain_suffix: self.domain_suffix.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_platform_identity() -> String {
    "platform".to_string()
}

fn default_export_root() -> PathBuf {
    ManagerConfig::default().export_root
}

fn default_collaborator_timeout_ms() -> u64 {
    30_000
}

fn default_resource_ceiling() -> ResourceEnvelope {
    ManagerConfig::default().resource_ceiling
}

fn default_domain_suffix() -> String {
    ManagerConfig::default().domain_suffix
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PlatformConfig {
    /// Load configuration from defaults, `path` and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        builder = builder.add_source(::config::Config::try_from(&PlatformConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("IMVU")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.lifecycle.domain_suffix, "world");
        assert_eq!(config.revenue, RateCard::default());
        assert!(config.gates.action_classes.is_none());

        let manager = config.lifecycle.manager_config();
        assert_eq!(manager.collaborator_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let lifecycle = LifecycleConfig {
            collaborator_timeout_ms: 0,
            ..LifecycleConfig::default()
        };
        assert_eq!(lifecycle.manager_config().collaborator_timeout, None);
    }

    #[test]
    fn seed_parsing() {
        let mut ledger = LedgerConfig::default();
        assert_eq!(ledger.seed().unwrap(), None);

        ledger.platform_key_seed = Some("07".repeat(32));
        assert_eq!(ledger.seed().unwrap(), Some([7u8; 32]));

        ledger.platform_key_seed = Some("07".repeat(16));
        assert!(matches!(ledger.seed(), Err(ConfigError::InvalidSeed(_))));

        ledger.platform_key_seed = Some("zz".into());
        assert!(ledger.seed().is_err());
    }
}
