use std::collections::BTreeMap;

use dashmap::DashMap;
use imvu_types::IdentityId;
use tracing::{debug, info};

use crate::error::IdentityError;
use crate::identity::{Identity, IdentityRecord, PendingRotation};

/// Signing and verification on behalf of an identity.
///
/// This is the narrow surface the rest of the platform depends on. Only the
/// implementor ever sees private keys.
pub trait IdentityProvider: Send + Sync {
    /// Sign `payload` as `identity`; returns a lowercase hex signature.
    fn sign(&self, identity: &IdentityId, payload: &[u8]) -> Result<String, IdentityError>;

    /// True when `signature` is a valid signature of `payload` by any key
    /// `identity` has held. Unknown identities and malformed signatures are
    /// simply not valid.
    fn verify(&self, identity: &IdentityId, payload: &[u8], signature: &str) -> bool;
}

/// In-process identity issuer and key holder.
#[derive(Default)]
pub struct IdentityRegistry {
    identities: DashMap<IdentityId, Identity>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new identity with a freshly generated keypair.
    pub fn issue(
        &self,
        name: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<IdentityRecord, IdentityError> {
        let metadata = named(name, metadata)?;
        let identity = Identity::generate(metadata);
        let record = identity.record();
        if self.identities.contains_key(identity.id()) {
            // 64 bits of public key colliding means the RNG is broken.
            return Err(IdentityError::AlreadyExists(record.id));
        }
        info!(identity_id = %record.id, identity_name = name, "Identity issued");
        self.identities.insert(record.id.clone(), identity);
        Ok(record)
    }

    /// Load an identity from a known seed.
    ///
    /// Importing the same seed twice returns the existing record, so the
    /// platform key can be loaded idempotently at startup.
    pub fn import(
        &self,
        name: &str,
        seed: [u8; 32],
        metadata: BTreeMap<String, String>,
    ) -> Result<IdentityRecord, IdentityError> {
        let metadata = named(name, metadata)?;
        let identity = Identity::from_seed(seed, metadata);
        match self.identities.entry(identity.id().clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if existing.get().verifying_key() == identity.verifying_key() {
                    debug!(identity_id = %identity.id(), "Identity already imported");
                    Ok(existing.get().record())
                } else {
                    Err(IdentityError::AlreadyExists(identity.id().clone()))
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let record = identity.record();
                info!(identity_id = %record.id, identity_name = name, "Identity imported");
                slot.insert(identity);
                Ok(record)
            }
        }
    }

    pub fn get(&self, id: &IdentityId) -> Result<IdentityRecord, IdentityError> {
        self.identities
            .get(id)
            .map(|identity| identity.record())
            .ok_or_else(|| IdentityError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &IdentityId) -> bool {
        self.identities.contains_key(id)
    }

    pub fn list(&self) -> Vec<IdentityRecord> {
        let mut records: Vec<_> = self.identities.iter().map(|e| e.value().record()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Rotate the signing key of `id`, keeping the identifier.
    pub fn rotate(&self, id: &IdentityId) -> Result<IdentityRecord, IdentityError> {
        let pending = self.prepare_rotation(id)?;
        self.complete_rotation(pending)
    }

    /// Generate the next key for `id` without putting it in effect.
    pub fn prepare_rotation(&self, id: &IdentityId) -> Result<PendingRotation, IdentityError> {
        self.identities
            .get(id)
            .map(|identity| identity.prepare_rotation())
            .ok_or_else(|| IdentityError::NotFound(id.clone()))
    }

    /// Install a prepared key. Fails if the identity was rotated in between.
    pub fn complete_rotation(&self, pending: PendingRotation) -> Result<IdentityRecord, IdentityError> {
        let id = pending.identity().clone();
        let mut identity = self
            .identities
            .get_mut(&id)
            .ok_or_else(|| IdentityError::NotFound(id.clone()))?;
        if identity.key_version() != pending.from_version() {
            return Err(IdentityError::RotationConflict {
                expected: pending.from_version(),
                actual: identity.key_version(),
                id,
            });
        }
        let version = pending.install_on(&mut identity);
        info!(identity_id = %id, key_version = version, "Identity key rotated");
        Ok(identity.record())
    }
}

impl IdentityProvider for IdentityRegistry {
    fn sign(&self, identity: &IdentityId, payload: &[u8]) -> Result<String, IdentityError> {
        self.identities
            .get(identity)
            .map(|i| i.sign(payload))
            .ok_or_else(|| IdentityError::NotFound(identity.clone()))
    }

    fn verify(&self, identity: &IdentityId, payload: &[u8], signature: &str) -> bool {
        self.identities
            .get(identity)
            .and_then(|i| i.verify(payload, signature).ok())
            .unwrap_or(false)
    }
}

fn named(
    name: &str,
    mut metadata: BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, IdentityError> {
    if name.trim().is_empty() {
        return Err(IdentityError::Validation("identity name is required".into()));
    }
    metadata.insert("name".into(), name.to_string());
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_sign_and_verify() {
        let registry = IdentityRegistry::new();
        let record = registry.issue("alice", BTreeMap::new()).unwrap();
        assert_eq!(record.metadata.get("name").map(String::as_str), Some("alice"));

        let sig = registry.sign(&record.id, b"hello").unwrap();
        assert!(registry.verify(&record.id, b"hello", &sig));
        assert!(!registry.verify(&record.id, b"hullo", &sig));
        assert!(!registry.verify(&IdentityId::new("identity-unknown"), b"hello", &sig));
        assert!(!registry.verify(&record.id, b"hello", "not-hex"));
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = IdentityRegistry::new();
        assert!(matches!(
            registry.issue("  ", BTreeMap::new()),
            Err(IdentityError::Validation(_))
        ));
    }

    #[test]
    fn import_is_idempotent_and_deterministic() {
        let registry = IdentityRegistry::new();
        let first = registry.import("platform", [1u8; 32], BTreeMap::new()).unwrap();
        let second = registry.import("platform", [1u8; 32], BTreeMap::new()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(registry.list().len(), 1);

        let other = IdentityRegistry::new();
        let again = other.import("platform", [1u8; 32], BTreeMap::new()).unwrap();
        assert_eq!(first.id, again.id);
    }

    #[test]
    fn rotate_keeps_old_signatures_valid() {
        let registry = IdentityRegistry::new();
        let record = registry.issue("bob", BTreeMap::new()).unwrap();
        let before = registry.sign(&record.id, b"event").unwrap();

        let rotated = registry.rotate(&record.id).unwrap();
        assert_eq!(rotated.id, record.id);
        assert_eq!(rotated.key_version, 2);
        assert_ne!(rotated.public_key, record.public_key);

        assert!(registry.verify(&record.id, b"event", &before));
        let after = registry.sign(&record.id, b"event").unwrap();
        assert!(registry.verify(&record.id, b"event", &after));
    }

    #[test]
    fn prepared_rotation_takes_effect_only_when_completed() {
        let registry = IdentityRegistry::new();
        let record = registry.issue("carol", BTreeMap::new()).unwrap();

        let pending = registry.prepare_rotation(&record.id).unwrap();
        assert_eq!(pending.key_version(), 2);
        assert_eq!(registry.get(&record.id).unwrap(), record);
        drop(pending);
        assert_eq!(registry.get(&record.id).unwrap().key_version, 1);

        let pending = registry.prepare_rotation(&record.id).unwrap();
        let announced = pending.public_key();
        let rotated = registry.complete_rotation(pending).unwrap();
        assert_eq!(rotated.public_key, announced);
        assert_eq!(rotated.key_version, 2);
    }

    #[test]
    fn stale_prepared_rotation_is_rejected() {
        let registry = IdentityRegistry::new();
        let record = registry.issue("dave", BTreeMap::new()).unwrap();
        let stale = registry.prepare_rotation(&record.id).unwrap();
        registry.rotate(&record.id).unwrap();

        assert!(matches!(
            registry.complete_rotation(stale),
            Err(IdentityError::RotationConflict { expected: 1, actual: 2, .. })
        ));
        assert_eq!(registry.get(&record.id).unwrap().key_version, 2);
    }

    #[test]
    fn unknown_identity() {
        let registry = IdentityRegistry::new();
        let missing = IdentityId::new("identity-0000000000000000");
        assert!(matches!(registry.get(&missing), Err(IdentityError::NotFound(_))));
        assert!(matches!(registry.rotate(&missing), Err(IdentityError::NotFound(_))));
        assert!(matches!(
            registry.sign(&missing, b"x"),
            Err(IdentityError::NotFound(_))
        ));
    }
}
