use imvu_gate::GateError;
use imvu_identity::IdentityError;
use imvu_revenue::RevenueError;
use imvu_types::ErrorKind;
use thiserror::Error;

/// Platform configuration or bootstrap failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid platform key seed: {0}")]
    InvalidSeed(String),

    #[error("gate configuration error: {0}")]
    Gates(#[from] GateError),

    #[error("rate card error: {0}")]
    Revenue(#[from] RevenueError),

    #[error("platform identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Load(_) | ConfigError::InvalidSeed(_) => ErrorKind::Validation,
            ConfigError::Gates(e) => e.kind(),
            ConfigError::Revenue(e) => e.kind(),
            ConfigError::Identity(e) => e.kind(),
        }
    }
}
