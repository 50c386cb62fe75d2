//! Identities for the IMVU platform.
//!
//! An [`Identity`] is an Ed25519 keypair plus an identifier derived from its
//! public key. Private keys live only inside the [`IdentityRegistry`], which
//! is the issuing boundary: callers get signatures and public records, never
//! key material. The ledger signs through a [`PlatformSigner`] handle.

pub mod error;
pub mod identity;
pub mod registry;
pub mod signer;

pub use error::IdentityError;
pub use identity::{Identity, IdentityRecord, PendingRotation};
pub use registry::{IdentityProvider, IdentityRegistry};
pub use signer::PlatformSigner;
