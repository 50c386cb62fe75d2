use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use imvu_identity::PlatformSigner;
use imvu_types::{EventId, IdentityId, TenantId, TimeRange};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::LedgerBackend;
use crate::error::{LedgerError, LedgerResult};
use crate::event::{signing_bytes, EventType, LedgerAppend, LedgerEvent, GENESIS_HASH};

/// Why a chain stopped verifying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakReason {
    SequenceGap,
    PreviousHashMismatch,
    HashMismatch,
    BadSignature,
}

/// First point of divergence in a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub event_id: EventId,
    pub sequence: u64,
    pub reason: BreakReason,
}

/// Result of walking a tenant chain from genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub tenant_id: TenantId,
    /// Events that verified before the first break (or all of them).
    pub events_checked: u64,
    pub first_broken: Option<ChainBreak>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }

    pub fn first_broken_event(&self) -> Option<EventId> {
        self.first_broken.as_ref().map(|b| b.event_id)
    }
}

/// The ledger: assigns ids, links, hashes and signs events, and verifies chains.
pub struct LedgerStore {
    backend: Arc<dyn LedgerBackend>,
    signer: PlatformSigner,
    chain_locks: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl LedgerStore {
    pub fn new(backend: Arc<dyn LedgerBackend>, signer: PlatformSigner) -> Self {
        Self {
            backend,
            signer,
            chain_locks: DashMap::new(),
        }
    }

    /// Identity whose key signs new events.
    pub fn signer_identity(&self) -> &IdentityId {
        self.signer.identity()
    }

    fn chain_lock(&self, tenant: &TenantId) -> Arc<Mutex<()>> {
        Arc::clone(self.chain_locks.entry(tenant.clone()).or_default().value())
    }

    /// Append an event to its tenant's chain.
    ///
    /// Read-head, hash, sign and write happen under the tenant's chain lock.
    /// If another writer sharing the backend got there first the backend
    /// rejects the write and this returns [`LedgerError::StaleHead`].
    pub async fn append(&self, request: LedgerAppend) -> LedgerResult<LedgerEvent> {
        request.validate()?;

        let lock = self.chain_lock(&request.tenant_id);
        let _guard = lock.lock().await;

        let head = self.backend.head(&request.tenant_id).await?;
        let (previous_hash, sequence, timestamp) = match &head {
            Some(prev) => (prev.hash.clone(), prev.sequence + 1, Utc::now().max(prev.timestamp)),
            None => (GENESIS_HASH.to_string(), 1, Utc::now()),
        };

        let signature = self
            .signer
            .sign(&signing_bytes(&previous_hash, &request.payload)?)?;

        let mut event = LedgerEvent {
            id: EventId::new(),
            sequence,
            timestamp,
            event_type: request.event_type,
            tenant_id: request.tenant_id,
            actor: request.actor,
            payload: request.payload,
            previous_hash,
            hash: String::new(),
            signer: self.signer.identity().clone(),
            signature,
        };
        event.hash = event.compute_hash()?;

        if let Err(e) = self
            .backend
            .append_if_head(event.clone(), &event.previous_hash)
            .await
        {
            if let LedgerError::StaleHead { tenant_id, .. } = &e {
                warn!(tenant_id = %tenant_id, sequence, "Concurrent append detected; chain head moved");
            }
            return Err(e);
        }

        debug!(
            tenant_id = %event.tenant_id,
            event_id = %event.id,
            event_type = %event.event_type,
            sequence = event.sequence,
            "Ledger event appended"
        );
        Ok(event)
    }

    /// Events of a tenant in append order, optionally filtered by type.
    pub async fn query(
        &self,
        tenant: &TenantId,
        range: TimeRange,
        event_type: Option<&EventType>,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        let mut events = self.backend.scan(tenant, range).await?;
        if let Some(wanted) = event_type {
            events.retain(|e| &e.event_type == wanted);
        }
        Ok(events)
    }

    /// Hash of the tenant's latest event, or genesis for an empty chain.
    pub async fn head_hash(&self, tenant: &TenantId) -> LedgerResult<String> {
        Ok(self
            .backend
            .head(tenant)
            .await?
            .map(|e| e.hash)
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    /// Walk the tenant's chain from genesis and report the first break.
    pub async fn verify_integrity(&self, tenant: &TenantId) -> LedgerResult<ChainVerification> {
        let events = self.backend.scan(tenant, TimeRange::all()).await?;

        let mut expected_previous = GENESIS_HASH.to_string();
        let mut checked = 0u64;
        for (index, event) in events.iter().enumerate() {
            let reason = if event.sequence != index as u64 + 1 {
                Some(BreakReason::SequenceGap)
            } else if event.previous_hash != expected_previous {
                Some(BreakReason::PreviousHashMismatch)
            } else if !event.verify_hash()? {
                Some(BreakReason::HashMismatch)
            } else if event.signer != *self.signer.identity()
                || !self.signer.verify(&event.signing_bytes()?, &event.signature)
            {
                Some(BreakReason::BadSignature)
            } else {
                None
            };

            if let Some(reason) = reason {
                warn!(
                    tenant_id = %tenant,
                    event_id = %event.id,
                    sequence = event.sequence,
                    ?reason,
                    "Ledger chain integrity broken"
                );
                return Ok(ChainVerification {
                    tenant_id: tenant.clone(),
                    events_checked: checked,
                    first_broken: Some(ChainBreak {
                        event_id: event.id,
                        sequence: event.sequence,
                        reason,
                    }),
                });
            }

            expected_previous = event.hash.clone();
            checked += 1;
        }

        debug!(tenant_id = %tenant, events = checked, "Ledger chain verified");
        Ok(ChainVerification {
            tenant_id: tenant.clone(),
            events_checked: checked,
            first_broken: None,
        })
    }

    pub async fn tenants(&self) -> LedgerResult<Vec<TenantId>> {
        self.backend.tenants().await
    }

    /// Verify every chain in the ledger.
    pub async fn verify_all(&self) -> LedgerResult<Vec<ChainVerification>> {
        let mut results = Vec::new();
        for tenant in self.backend.tenants().await? {
            results.push(self.verify_integrity(&tenant).await?);
        }
        let broken = results.iter().filter(|r| !r.is_intact()).count();
        info!(chains = results.len(), broken, "Ledger verification complete");
        Ok(results)
    }
}
