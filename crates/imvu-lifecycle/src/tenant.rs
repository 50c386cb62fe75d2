use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use imvu_gate::NetworkRoute;
use imvu_types::{IdentityId, ResourceEnvelope, TenantId};
use serde::{Deserialize, Serialize};

use crate::collaborator::ResourceHandle;
use crate::error::{LifecycleError, LifecycleResult};
use crate::status::TenantStatus;

const MAX_LABEL_LEN: usize = 63;

/// A tenant (IMVU) as cached by the manager.
///
/// A projection of the tenant's lifecycle events; `version` counts them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub owner: IdentityId,
    pub jurisdiction: String,
    pub resources: ResourceEnvelope,
    pub domain: String,
    pub mailbox: String,
    pub status: TenantStatus,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub handles: Vec<ResourceHandle>,
    pub routes: Vec<NetworkRoute>,
    /// Bundle published by the most recent export.
    pub last_export: Option<PathBuf>,
}

/// Caller input for [`TenantManager::create_tenant`](crate::TenantManager::create_tenant).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub owner: IdentityId,
    pub jurisdiction: String,
    pub resources: ResourceEnvelope,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CreateTenantRequest {
    pub fn new(
        name: impl Into<String>,
        owner: IdentityId,
        jurisdiction: impl Into<String>,
        resources: ResourceEnvelope,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            jurisdiction: jurisdiction.into(),
            resources,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn validate(&self) -> LifecycleResult<()> {
        if self.owner.is_empty() {
            return Err(LifecycleError::Validation("owner is required".into()));
        }
        if self.jurisdiction.trim().is_empty() {
            return Err(LifecycleError::Validation("jurisdiction is required".into()));
        }
        sanitize_name(&self.name).map(|_| ())
    }
}

/// Reduce a display name to a single DNS label.
pub fn sanitize_name(name: &str) -> LifecycleResult<String> {
    let mut label = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }
    let label: String = label.trim_matches('-').chars().take(MAX_LABEL_LEN).collect();
    let label = label.trim_end_matches('-').to_string();
    if label.is_empty() {
        return Err(LifecycleError::Validation(format!(
            "tenant name {name:?} has no DNS-safe characters"
        )));
    }
    Ok(label)
}

/// `<name>.<tenant>.<suffix>`
pub fn tenant_domain(label: &str, tenant: &TenantId, suffix: &str) -> String {
    format!("{label}.{}.{}", tenant.as_str(), suffix.trim_matches('.'))
}

pub fn tenant_mailbox(domain: &str) -> String {
    format!("postmaster@{domain}")
}
