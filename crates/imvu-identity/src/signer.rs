use std::sync::Arc;

use imvu_types::IdentityId;

use crate::error::IdentityError;
use crate::registry::IdentityProvider;

/// Explicit handle to the platform signing key.
///
/// Built once at startup and passed to whoever needs platform signatures.
/// Cloning shares the same provider and identity.
#[derive(Clone)]
pub struct PlatformSigner {
    provider: Arc<dyn IdentityProvider>,
    identity: IdentityId,
}

impl PlatformSigner {
    pub fn new(provider: Arc<dyn IdentityProvider>, identity: IdentityId) -> Self {
        Self { provider, identity }
    }

    /// The identity whose key produces platform signatures.
    pub fn identity(&self) -> &IdentityId {
        &self.identity
    }

    pub fn sign(&self, payload: &[u8]) -> Result<String, IdentityError> {
        self.provider.sign(&self.identity, payload)
    }

    /// Verify a platform signature under the current or a retired
    /// platform key. Signatures by any other identity never verify.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        self.provider.verify(&self.identity, payload, signature)
    }
}

impl std::fmt::Debug for PlatformSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformSigner")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IdentityRegistry;
    use std::collections::BTreeMap;

    #[test]
    fn signs_as_the_platform_identity() {
        let registry = Arc::new(IdentityRegistry::new());
        let record = registry.import("platform", [3u8; 32], BTreeMap::new()).unwrap();
        let signer = PlatformSigner::new(registry.clone(), record.id.clone());

        let sig = signer.sign(b"chain").unwrap();
        assert!(signer.verify(b"chain", &sig));
        assert!(registry.verify(&record.id, b"chain", &sig));
        assert_eq!(signer.identity(), &record.id);
    }

    #[test]
    fn other_identities_do_not_verify_as_platform() {
        let registry = Arc::new(IdentityRegistry::new());
        let platform = registry.import("platform", [3u8; 32], BTreeMap::new()).unwrap();
        let owner = registry.issue("owner", BTreeMap::new()).unwrap();
        let signer = PlatformSigner::new(registry.clone(), platform.id);

        let sig = registry.sign(&owner.id, b"chain").unwrap();
        assert!(registry.verify(&owner.id, b"chain", &sig));
        assert!(!signer.verify(b"chain", &sig));
    }

    #[test]
    fn unknown_platform_identity_fails_to_sign() {
        let registry = Arc::new(IdentityRegistry::new());
        let signer = PlatformSigner::new(registry, IdentityId::new("identity-missing"));
        assert!(signer.sign(b"x").is_err());
    }
}
