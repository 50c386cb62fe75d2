use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use imvu_types::{TenantId, TimeRange};

use crate::backend::LedgerBackend;
use crate::error::{LedgerError, LedgerResult};
use crate::event::{LedgerEvent, GENESIS_HASH};

type Chain = Arc<RwLock<Vec<LedgerEvent>>>;

/// In-memory ledger backend with one lock per tenant chain.
#[derive(Default)]
pub struct MemoryBackend {
    chains: DashMap<TenantId, Chain>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, tenant: &TenantId) -> Option<Chain> {
        self.chains.get(tenant).map(|c| Arc::clone(c.value()))
    }

    /// Overwrite a stored event in place, bypassing the chain.
    ///
    /// Only for simulating tampering of persisted data.
    #[cfg(any(test, feature = "test-util"))]
    pub fn replace_event(&self, tenant: &TenantId, sequence: u64, event: LedgerEvent) -> bool {
        let Some(chain) = self.chain(tenant) else {
            return false;
        };
        let Ok(mut guard) = chain.write() else {
            return false;
        };
        match guard.iter_mut().find(|e| e.sequence == sequence) {
            Some(slot) => {
                *slot = event;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn head(&self, tenant: &TenantId) -> LedgerResult<Option<LedgerEvent>> {
        let Some(chain) = self.chain(tenant) else {
            return Ok(None);
        };
        let guard = chain
            .read()
            .map_err(|_| LedgerError::Backend("chain lock poisoned".to_string()))?;
        Ok(guard.last().cloned())
    }

    async fn append_if_head(
        &self,
        event: LedgerEvent,
        expected_previous_hash: &str,
    ) -> LedgerResult<()> {
        let chain = Arc::clone(
            self.chains
                .entry(event.tenant_id.clone())
                .or_default()
                .value(),
        );
        let mut guard = chain
            .write()
            .map_err(|_| LedgerError::Backend("chain lock poisoned".to_string()))?;

        let actual = guard
            .last()
            .map(|e| e.hash.as_str())
            .unwrap_or(GENESIS_HASH);
        if actual != expected_previous_hash || event.previous_hash != expected_previous_hash {
            return Err(LedgerError::StaleHead {
                tenant_id: event.tenant_id.clone(),
                expected: expected_previous_hash.to_string(),
                actual: actual.to_string(),
            });
        }
        let next_sequence = guard.len() as u64 + 1;
        if event.sequence != next_sequence {
            return Err(LedgerError::Validation(format!(
                "sequence {} does not extend chain of length {}",
                event.sequence,
                guard.len()
            )));
        }

        guard.push(event);
        Ok(())
    }

    async fn scan(&self, tenant: &TenantId, range: TimeRange) -> LedgerResult<Vec<LedgerEvent>> {
        let Some(chain) = self.chain(tenant) else {
            return Ok(Vec::new());
        };
        let guard = chain
            .read()
            .map_err(|_| LedgerError::Backend("chain lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|e| range.contains(&e.timestamp))
            .cloned()
            .collect())
    }

    async fn tenants(&self) -> LedgerResult<Vec<TenantId>> {
        let mut tenants = Vec::with_capacity(self.chains.len());
        for entry in self.chains.iter() {
            let guard = entry
                .value()
                .read()
                .map_err(|_| LedgerError::Backend("chain lock poisoned".to_string()))?;
            if !guard.is_empty() {
                tenants.push(entry.key().clone());
            }
        }
        tenants.sort();
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use chrono::Utc;
    use imvu_types::{EventId, IdentityId, Payload};

    fn event(tenant: &str, sequence: u64, previous_hash: &str) -> LedgerEvent {
        let mut event = LedgerEvent {
            id: EventId::new(),
            sequence,
            timestamp: Utc::now(),
            event_type: EventType::AuditAction,
            tenant_id: TenantId::new(tenant),
            actor: IdentityId::new("identity-a"),
            payload: Payload::new(),
            previous_hash: previous_hash.to_string(),
            hash: String::new(),
            signer: IdentityId::new("identity-p"),
            signature: String::new(),
        };
        event.hash = event.compute_hash().unwrap();
        event
    }

    #[tokio::test]
    async fn compare_and_append_rejects_stale_head() {
        let backend = MemoryBackend::new();
        let tenant = TenantId::new("imvu-a");

        let first = event("imvu-a", 1, GENESIS_HASH);
        backend.append_if_head(first.clone(), GENESIS_HASH).await.unwrap();

        let forked = event("imvu-a", 1, GENESIS_HASH);
        let err = backend.append_if_head(forked, GENESIS_HASH).await.unwrap_err();
        assert!(matches!(err, LedgerError::StaleHead { .. }));

        let second = event("imvu-a", 2, &first.hash);
        backend.append_if_head(second.clone(), &first.hash).await.unwrap();

        let head = backend.head(&tenant).await.unwrap().unwrap();
        assert_eq!(head.id, second.id);
        assert_eq!(backend.scan(&tenant, TimeRange::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sequence_must_extend_chain() {
        let backend = MemoryBackend::new();
        let skipped = event("imvu-a", 3, GENESIS_HASH);
        assert!(matches!(
            backend.append_if_head(skipped, GENESIS_HASH).await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let backend = MemoryBackend::new();
        backend
            .append_if_head(event("imvu-a", 1, GENESIS_HASH), GENESIS_HASH)
            .await
            .unwrap();
        backend
            .append_if_head(event("imvu-b", 1, GENESIS_HASH), GENESIS_HASH)
            .await
            .unwrap();

        assert_eq!(
            backend.tenants().await.unwrap(),
            vec![TenantId::new("imvu-a"), TenantId::new("imvu-b")]
        );
        assert!(backend.head(&TenantId::new("imvu-c")).await.unwrap().is_none());
    }
}
