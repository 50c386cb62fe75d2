use async_trait::async_trait;
use imvu_types::{TenantId, TimeRange};

use crate::error::LedgerResult;
use crate::event::LedgerEvent;

/// Persistence contract for the ledger.
///
/// Implementations must make `append_if_head` atomic per tenant: the event
/// is written only if the chain's current head hash (or [`GENESIS_HASH`] for
/// an empty chain) equals `expected_previous_hash`, otherwise they return
/// [`LedgerError::StaleHead`] and write nothing.
///
/// [`GENESIS_HASH`]: crate::event::GENESIS_HASH
/// [`LedgerError::StaleHead`]: crate::error::LedgerError::StaleHead
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Most recent event of the tenant's chain.
    async fn head(&self, tenant: &TenantId) -> LedgerResult<Option<LedgerEvent>>;

    /// Compare-and-append on the chain head.
    async fn append_if_head(
        &self,
        event: LedgerEvent,
        expected_previous_hash: &str,
    ) -> LedgerResult<()>;

    /// Events of the tenant within `range`, in append order.
    async fn scan(&self, tenant: &TenantId, range: TimeRange) -> LedgerResult<Vec<LedgerEvent>>;

    /// Every tenant that has at least one event.
    async fn tenants(&self) -> LedgerResult<Vec<TenantId>>;
}
