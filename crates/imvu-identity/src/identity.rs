use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use imvu_types::IdentityId;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// An Ed25519 identity.
///
/// Owns its signing key exclusively. The key is never serialized and there is
/// no accessor for it; the only thing that leaves is a signature.
pub struct Identity {
    id: IdentityId,
    signing_key: SigningKey,
    created_at: DateTime<Utc>,
    rotated_at: Option<DateTime<Utc>>,
    metadata: BTreeMap<String, String>,
    key_version: u32,
    retired_keys: Vec<VerifyingKey>,
}

/// Public view of an identity. Safe to hand out and persist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: IdentityId,
    /// Hex-encoded current verifying key.
    pub public_key: String,
    pub key_version: u32,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
    /// Hex-encoded verifying keys retired by rotation, oldest first.
    pub retired_keys: Vec<String>,
}

impl Identity {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate(metadata: BTreeMap<String, String>) -> Self {
        Self::from_seed(random_seed(), metadata)
    }

    /// Build an identity from a fixed 32-byte seed.
    pub fn from_seed(seed: [u8; 32], metadata: BTreeMap<String, String>) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let id = IdentityId::from_public_key(signing_key.verifying_key().as_bytes());
        Self {
            id,
            signing_key,
            created_at: Utc::now(),
            rotated_at: None,
            metadata,
            key_version: 1,
            retired_keys: Vec::new(),
        }
    }

    pub fn id(&self) -> &IdentityId {
        &self.id
    }

    pub fn key_version(&self) -> u32 {
        self.key_version
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a payload with the current key, returning lowercase hex.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.signing_key.sign(payload).to_bytes())
    }

    /// Verify a hex signature against the current key or any retired key.
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> Result<bool, IdentityError> {
        let signature = decode_signature(signature_hex)?;
        let current = self.verifying_key();
        Ok(std::iter::once(&current)
            .chain(self.retired_keys.iter())
            .any(|key| key.verify(payload, &signature).is_ok()))
    }

    /// Replace the signing key while keeping the identifier.
    ///
    /// The previous verifying key is retired, not forgotten, so signatures
    /// produced before the rotation still verify.
    pub fn rotate(&mut self) -> u32 {
        self.install(SigningKey::from_bytes(&random_seed()))
    }

    /// Generate the next key without installing it.
    pub(crate) fn prepare_rotation(&self) -> PendingRotation {
        PendingRotation {
            id: self.id.clone(),
            from_version: self.key_version,
            next_key: SigningKey::from_bytes(&random_seed()),
        }
    }

    fn install(&mut self, next: SigningKey) -> u32 {
        let previous = std::mem::replace(&mut self.signing_key, next);
        self.retired_keys.push(previous.verifying_key());
        self.key_version += 1;
        self.rotated_at = Some(Utc::now());
        self.key_version
    }

    pub fn record(&self) -> IdentityRecord {
        IdentityRecord {
            id: self.id.clone(),
            public_key: hex::encode(self.verifying_key().as_bytes()),
            key_version: self.key_version,
            created_at: self.created_at,
            rotated_at: self.rotated_at,
            metadata: self.metadata.clone(),
            retired_keys: self
                .retired_keys
                .iter()
                .map(|k| hex::encode(k.as_bytes()))
                .collect(),
        }
    }
}

/// A key generated for rotation but not yet in effect.
///
/// Lets the rotation be logged before it is installed; dropping it leaves
/// the identity untouched. Produced by
/// [`IdentityRegistry::prepare_rotation`](crate::IdentityRegistry::prepare_rotation).
pub struct PendingRotation {
    id: IdentityId,
    from_version: u32,
    next_key: SigningKey,
}

impl PendingRotation {
    pub fn identity(&self) -> &IdentityId {
        &self.id
    }

    /// Version the key will have once installed.
    pub fn key_version(&self) -> u32 {
        self.from_version + 1
    }

    /// Hex-encoded verifying key of the pending key.
    pub fn public_key(&self) -> String {
        hex::encode(self.next_key.verifying_key().as_bytes())
    }

    pub(crate) fn from_version(&self) -> u32 {
        self.from_version
    }

    /// Install on `identity`. The caller checks the version first.
    pub(crate) fn install_on(self, identity: &mut Identity) -> u32 {
        identity.install(self.next_key)
    }
}

impl std::fmt::Debug for PendingRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRotation")
            .field("id", &self.id)
            .field("key_version", &self.key_version())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("key_version", &self.key_version)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    seed
}

fn decode_signature(signature_hex: &str) -> Result<Signature, IdentityError> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| IdentityError::MalformedSignature(e.to_string()))?;
    let bytes: [u8; 64] = bytes
        .try_into()
        .map_err(|_| IdentityError::MalformedSignature("expected 64 bytes".into()))?;
    Ok(Signature::from_bytes(&bytes))
}
