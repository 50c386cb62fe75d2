//! Tracing subscriber installation.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a
/// subscriber was already installed, which is expected in tests.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
            .is_ok()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_reported() {
        let config = LoggingConfig {
            level: "not a valid directive [".into(),
            json: true,
        };
        init_tracing(&config);
        assert!(!init_tracing(&LoggingConfig::default()));
    }
}
