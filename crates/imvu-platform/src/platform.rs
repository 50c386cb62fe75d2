//! Assembly of the platform services from a [`PlatformConfig`].

use std::collections::BTreeMap;
use std::sync::Arc;

use imvu_gate::{ActionClassTable, Gate, GateEngine, GateError};
use imvu_identity::{IdentityRecord, IdentityRegistry, PlatformSigner};
use imvu_ledger::{ChainVerification, LedgerResult, LedgerStore, MemoryBackend};
use imvu_lifecycle::{Collaborators, TenantManager};
use imvu_revenue::RevenueSplitter;
use tracing::{info, instrument, warn};

use crate::config::PlatformConfig;
use crate::error::ConfigError;

/// The wired platform core.
#[derive(Clone)]
pub struct Platform {
    manager: TenantManager,
    ledger: Arc<LedgerStore>,
    revenue: Arc<RevenueSplitter>,
    identities: Arc<IdentityRegistry>,
    platform_identity: IdentityRecord,
}

impl Platform {
    /// Build the platform with the standard gates.
    pub fn bootstrap(config: &PlatformConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        Self::bootstrap_with(config, collaborators, Vec::new())
    }

    /// Build the platform, registering `extra_gates` on top of the standard
    /// set. An extra gate with a standard id replaces the standard one.
    ///
    /// Fails when the action-class table names a gate that is not
    /// registered after that.
    #[instrument(skip_all)]
    pub fn bootstrap_with(
        config: &PlatformConfig,
        collaborators: Collaborators,
        extra_gates: Vec<Arc<dyn Gate>>,
    ) -> Result<Self, ConfigError> {
        let identities = Arc::new(IdentityRegistry::new());
        let name = config.ledger.platform_identity.as_str();
        let platform_identity = match config.ledger.seed()? {
            Some(seed) => identities.import(name, seed, BTreeMap::new())?,
            None => {
                warn!("No platform key seed configured; signatures will not survive a restart");
                identities.issue(name, BTreeMap::new())?
            }
        };

        let signer = PlatformSigner::new(identities.clone(), platform_identity.id.clone());
        let ledger = Arc::new(LedgerStore::new(Arc::new(MemoryBackend::new()), signer));

        let table = match &config.gates.action_classes {
            Some(path) => {
                info!(path = %path.display(), "Loading action class table");
                ActionClassTable::from_file(path)?
            }
            None => ActionClassTable::embedded()?,
        };
        let mut engine = GateEngine::standard(table);
        for gate in extra_gates {
            engine.register(gate);
        }
        check_registered(&engine)?;

        config.revenue.validate()?;
        let revenue = Arc::new(RevenueSplitter::new(ledger.clone(), Arc::new(config.revenue.clone())));

        let manager = TenantManager::new(
            config.lifecycle.manager_config(),
            ledger.clone(),
            Arc::new(engine),
            revenue.clone(),
            identities.clone(),
            collaborators,
        );

        info!(
            platform_identity = %platform_identity.id,
            key_version = platform_identity.key_version,
            "Platform bootstrapped"
        );

        Ok(Self {
            manager,
            ledger,
            revenue,
            identities,
            platform_identity,
        })
    }

    pub fn manager(&self) -> &TenantManager {
        &self.manager
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    pub fn revenue(&self) -> &Arc<RevenueSplitter> {
        &self.revenue
    }

    pub fn identities(&self) -> &Arc<IdentityRegistry> {
        &self.identities
    }

    /// The identity that signs every ledger event, as of bootstrap.
    pub fn platform_identity(&self) -> &IdentityRecord {
        &self.platform_identity
    }

    /// Walk every tenant chain.
    pub async fn verify_ledger(&self) -> LedgerResult<Vec<ChainVerification>> {
        let results = self.ledger.verify_all().await?;
        let broken = results.iter().filter(|r| !r.is_intact()).count();
        if broken > 0 {
            warn!(chains = results.len(), broken, "Ledger verification found broken chains");
        } else {
            info!(chains = results.len(), "Ledger verified");
        }
        Ok(results)
    }
}

fn check_registered(engine: &GateEngine) -> Result<(), GateError> {
    let table = engine.table();
    for class in table.classes() {
        for gate in table.gates_for(class).unwrap_or_default() {
            if !engine.is_registered(gate) {
                return Err(GateError::UnregisteredGate {
                    action_class: class.to_string(),
                    gate: gate.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imvu_gate::GateId;

    #[test]
    fn bootstrap_with_defaults() {
        let platform = Platform::bootstrap(&PlatformConfig::default(), Collaborators::new()).unwrap();
        assert_eq!(platform.ledger().signer_identity(), &platform.platform_identity().id);
        assert!(platform.identities().contains(&platform.platform_identity().id));
        assert!(platform.manager().gates().missing_gates().is_empty());
    }

    #[test]
    fn custom_gate_without_registration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.toml");
        std::fs::write(&path, "[classes]\n\"tenant.create\" = [\"identity-binding\", \"sanctions-screening\"]\n").unwrap();

        let mut config = PlatformConfig::default();
        config.gates.action_classes = Some(path);

        let err = Platform::bootstrap(&config, Collaborators::new()).err().unwrap();
        match err {
            ConfigError::Gates(GateError::UnregisteredGate { action_class, gate }) => {
                assert_eq!(action_class, "tenant.create");
                assert_eq!(gate, GateId::Custom("sanctions-screening".into()));
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut engine_gates: Vec<Arc<dyn Gate>> = Vec::new();
        engine_gates.push(Arc::new(imvu_gate::FnGate::new(
            GateId::Custom("sanctions-screening".into()),
            |_| Ok(()),
        )));
        assert!(Platform::bootstrap_with(&config, Collaborators::new(), engine_gates).is_ok());
    }
}
