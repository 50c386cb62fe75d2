//! Portable export bundles.
//!
//! A bundle is a directory `<export_root>/<tenant>-<timestamp>/` holding one
//! file per collaborator artifact, the tenant's ledger slice as JSON lines
//! and a `manifest.json` with a BLAKE3 digest per file. Bundles are built in
//! a hidden staging directory and published by a single rename, so a reader
//! listing the export root either sees a complete bundle or nothing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use imvu_ledger::LedgerEvent;
use imvu_types::TenantId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborator::ExportArtifact;
use crate::error::ExportError;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const LEDGER_FILE: &str = "ledger.jsonl";
/// Suffix of a bundle directory name: `<tenant>-<stamp>`.
const BUNDLE_STAMP: &str = "%Y%m%dT%H%M%S%.3fZ";

/// One file of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Producer of the file (`compute`, `domain`, ..., or `ledger`).
    pub name: String,
    pub file: String,
    pub blake3: String,
    pub bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub tenant_id: TenantId,
    pub exported_at: DateTime<Utc>,
    /// Ledger head hash the bundle was cut at.
    pub chain_head: String,
    pub ledger_events: u64,
    pub artifacts: Vec<ManifestEntry>,
}

/// Writes a bundle into a staging directory. Dropping an unpublished writer
/// removes the staging directory.
pub(crate) struct BundleWriter {
    root: PathBuf,
    staging: PathBuf,
    tenant_id: TenantId,
    entries: Vec<ManifestEntry>,
    done: bool,
}

impl BundleWriter {
    pub(crate) async fn stage(root: &Path, tenant_id: &TenantId) -> Result<Self, ExportError> {
        tokio::fs::create_dir_all(root).await?;
        let staging = root.join(format!(".staging-{}-{}", tenant_id.as_str(), uuid::Uuid::new_v4()));
        tokio::fs::create_dir(&staging).await?;
        debug!(tenant_id = %tenant_id, staging = %staging.display(), "Export staging created");
        Ok(Self {
            root: root.to_path_buf(),
            staging,
            tenant_id: tenant_id.clone(),
            entries: Vec::new(),
            done: false,
        })
    }

    /// Stage one collaborator artifact.
    pub(crate) async fn add(&mut self, name: &str, artifact: &ExportArtifact) -> Result<(), ExportError> {
        validate_file_name(&artifact.file_name)?;
        if self.entries.iter().any(|e| e.file == artifact.file_name) {
            return Err(ExportError::InvalidArtifact(format!(
                "duplicate artifact file {}",
                artifact.file_name
            )));
        }
        self.write(name, &artifact.file_name, &artifact.data).await
    }

    /// Stage the ledger slice, one JSON event per line.
    pub(crate) async fn add_ledger(&mut self, events: &[LedgerEvent]) -> Result<(), ExportError> {
        let mut data = Vec::new();
        for event in events {
            serde_json::to_writer(&mut data, event)?;
            data.push(b'\n');
        }
        self.write("ledger", LEDGER_FILE, &data).await
    }

    async fn write(&mut self, name: &str, file: &str, data: &[u8]) -> Result<(), ExportError> {
        tokio::fs::write(self.staging.join(file), data).await?;
        self.entries.push(ManifestEntry {
            name: name.to_string(),
            file: file.to_string(),
            blake3: blake3::hash(data).to_hex().to_string(),
            bytes: data.len() as u64,
        });
        Ok(())
    }

    /// Write the manifest and move the bundle into place.
    pub(crate) async fn publish(
        mut self,
        exported_at: DateTime<Utc>,
        chain_head: String,
        ledger_events: u64,
    ) -> Result<PublishedBundle, ExportError> {
        let manifest = BundleManifest {
            tenant_id: self.tenant_id.clone(),
            exported_at,
            chain_head,
            ledger_events,
            artifacts: std::mem::take(&mut self.entries),
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(self.staging.join(MANIFEST_FILE), json).await?;

        let target = self.root.join(format!(
            "{}-{}",
            self.tenant_id.as_str(),
            exported_at.format(BUNDLE_STAMP)
        ));
        if tokio::fs::try_exists(&target).await? {
            return Err(ExportError::Corrupt {
                path: target,
                reason: "a bundle with this name already exists".into(),
            });
        }
        tokio::fs::rename(&self.staging, &target).await?;
        self.done = true;

        info!(
            tenant_id = %self.tenant_id,
            bundle = %target.display(),
            artifacts = manifest.artifacts.len(),
            "Export bundle published"
        );
        Ok(PublishedBundle {
            path: target,
            kept: false,
        })
    }
}

impl Drop for BundleWriter {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.staging) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(staging = %self.staging.display(), error = %e, "Could not remove export staging");
            }
        }
    }
}

/// A published bundle that is withdrawn again on drop unless committed.
pub(crate) struct PublishedBundle {
    path: PathBuf,
    kept: bool,
}

impl PublishedBundle {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn commit(mut self) -> PathBuf {
        self.kept = true;
        self.path.clone()
    }
}

impl Drop for PublishedBundle {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        warn!(bundle = %self.path.display(), "Withdrawing published export bundle");
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(bundle = %self.path.display(), error = %e, "Could not withdraw export bundle");
        }
    }
}

fn validate_file_name(file: &str) -> Result<(), ExportError> {
    let bad = file.is_empty()
        || file.starts_with('.')
        || file.contains(['/', '\\'])
        || file == MANIFEST_FILE
        || file == LEDGER_FILE;
    if bad {
        return Err(ExportError::InvalidArtifact(format!("{file:?} is not a usable file name")));
    }
    Ok(())
}

/// Published bundles of `tenant` under `root`, oldest first.
pub fn list_bundles(root: impl AsRef<Path>, tenant: &TenantId) -> Result<Vec<PathBuf>, ExportError> {
    let root = root.as_ref();
    if !root.exists() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}-", tenant.as_str());
    let mut bundles = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let stamped = name
            .strip_prefix(&prefix)
            .is_some_and(|stamp| NaiveDateTime::parse_from_str(stamp, BUNDLE_STAMP).is_ok());
        if !stamped || !entry.file_type()?.is_dir() {
            continue;
        }
        bundles.push(entry.path());
    }
    bundles.sort();
    Ok(bundles)
}

/// Re-hash every file of a bundle against its manifest.
pub fn verify_bundle(path: impl AsRef<Path>) -> Result<BundleManifest, ExportError> {
    let path = path.as_ref();
    let corrupt = |reason: String| ExportError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read(path.join(MANIFEST_FILE))
        .map_err(|e| corrupt(format!("unreadable manifest: {e}")))?;
    let manifest: BundleManifest =
        serde_json::from_slice(&raw).map_err(|e| corrupt(format!("invalid manifest: {e}")))?;

    if !manifest.artifacts.iter().any(|a| a.file == LEDGER_FILE) {
        return Err(corrupt("ledger slice missing from manifest".into()));
    }
    for entry in &manifest.artifacts {
        let data = std::fs::read(path.join(&entry.file))
            .map_err(|e| corrupt(format!("{}: {e}", entry.file)))?;
        if data.len() as u64 != entry.bytes {
            return Err(corrupt(format!("{}: size mismatch", entry.file)));
        }
        if blake3::hash(&data).to_hex().as_str() != entry.blake3 {
            return Err(corrupt(format!("{}: digest mismatch", entry.file)));
        }
    }
    Ok(manifest)
}
