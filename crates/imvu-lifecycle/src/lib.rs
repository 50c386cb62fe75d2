//! Tenant (IMVU) lifecycle.
//!
//! [`TenantManager`] drives every tenant through an explicit state machine:
//!
//! ```text
//! provisioning -> active -> scaling -> active
//!                        -> suspended -> active
//!                        -> exported -> deleted
//! ```
//!
//! Every transition is gate-check, then collaborator effects, then ledger
//! append, then status update. The ledger is the source of truth; the
//! cached [`Tenant`] is a projection of it. Gates run on a snapshot without
//! any lock. Only the final version check, append and status write hold the
//! per-tenant mutex, and collaborator calls never do.
//!
//! External systems (compute, DNS, mail, network) sit behind the
//! [`TenantResource`] trait. Their effects are compensated in reverse order
//! when a later step fails or the operation is cancelled.

pub mod collaborator;
pub mod error;
pub mod export;
pub mod manager;
pub mod mocks;
pub mod report;
pub mod status;
pub mod tenant;

mod rollback;

pub use collaborator::{Collaborators, ExportArtifact, ProvisionSpec, ResourceHandle, ResourceKind, TenantResource};
pub use error::{CollaboratorError, ExportError, LifecycleError, LifecycleResult};
pub use export::{list_bundles, verify_bundle, BundleManifest, ManifestEntry};
pub use manager::{ManagerConfig, TenantManager};
pub use report::{ComplianceReport, GateTally};
pub use status::{TenantStatus, Transition};
pub use tenant::{CreateTenantRequest, Tenant};
