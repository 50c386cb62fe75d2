use std::sync::Arc;

use chrono::{DateTime, Utc};
use imvu_ledger::{LedgerEvent, LedgerStore};
use imvu_types::{Payload, TenantId, TimeRange};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RevenueError, RevenueResult};
use crate::pricing::{CostCategory, UsagePricer};
use crate::split::{split, RevenueSplit};

/// Priced and split usage, ready to embed in a usage event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCharge {
    pub category: CostCategory,
    pub units: u64,
    pub cost_minor: i64,
    pub split: RevenueSplit,
}

impl UsageCharge {
    /// Payload fields recorded on the usage event.
    pub fn payload(&self) -> Payload {
        Payload::from([
            ("category".to_string(), serde_json::json!(self.category)),
            ("units".to_string(), serde_json::json!(self.units)),
            ("cost_minor".to_string(), serde_json::json!(self.cost_minor)),
            (
                "creator_share_minor".to_string(),
                serde_json::json!(self.split.creator_share_minor),
            ),
            (
                "platform_share_minor".to_string(),
                serde_json::json!(self.split.platform_share_minor),
            ),
        ])
    }
}

/// Revenue of one tenant over a time window. Always derived from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSummary {
    pub tenant_id: TenantId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub compute_cost_minor: i64,
    pub dns_cost_minor: i64,
    pub mail_cost_minor: i64,
    pub network_cost_minor: i64,
    pub total_cost_minor: i64,
    pub creator_share_minor: i64,
    pub platform_share_minor: i64,
    pub verified_sum: bool,
    /// Billable events included.
    pub event_count: u64,
}

impl RevenueSummary {
    pub fn cost(&self, category: CostCategory) -> i64 {
        match category {
            CostCategory::Compute => self.compute_cost_minor,
            CostCategory::Dns => self.dns_cost_minor,
            CostCategory::Mail => self.mail_cost_minor,
            CostCategory::Network => self.network_cost_minor,
        }
    }
}

/// Prices usage and summarizes tenant revenue from the ledger.
pub struct RevenueSplitter {
    ledger: Arc<LedgerStore>,
    pricer: Arc<dyn UsagePricer>,
}

impl RevenueSplitter {
    pub fn new(ledger: Arc<LedgerStore>, pricer: Arc<dyn UsagePricer>) -> Self {
        Self { ledger, pricer }
    }

    pub fn split(&self, total_minor: i64) -> RevenueResult<RevenueSplit> {
        split(total_minor)
    }

    /// Price `units` of `category` and split the cost.
    pub fn charge(&self, category: CostCategory, units: u64) -> RevenueResult<UsageCharge> {
        let cost_minor = self.pricer.price(category, units)?;
        Ok(UsageCharge {
            category,
            units,
            cost_minor,
            split: split(cost_minor)?,
        })
    }

    /// Summarize a tenant's billable usage in `range`.
    ///
    /// Every usage event is re-priced from its recorded `units`; any cost
    /// embedded in the event is informational only.
    pub async fn summarize(
        &self,
        tenant: &TenantId,
        range: TimeRange,
    ) -> RevenueResult<RevenueSummary> {
        let events = self.ledger.query(tenant, range, None).await?;

        let mut costs = [0i64; 4];
        let mut event_count = 0u64;
        for event in &events {
            let Some(category) = CostCategory::from_event_type(&event.event_type) else {
                continue;
            };
            let cost = self.pricer.price(category, usage_units(event)?)?;
            let slot = &mut costs[category_index(category)];
            *slot = slot.checked_add(cost).ok_or_else(|| {
                RevenueError::Validation(format!("{category} cost overflows for {tenant}"))
            })?;
            event_count += 1;
        }

        let total_cost_minor = costs
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(*c))
            .ok_or_else(|| RevenueError::Validation(format!("total cost overflows for {tenant}")))?;
        let shares = split(total_cost_minor)?;

        debug!(
            tenant_id = %tenant,
            event_count,
            total_cost_minor,
            "Revenue summarized"
        );

        Ok(RevenueSummary {
            tenant_id: tenant.clone(),
            start: range.start,
            end: range.end,
            compute_cost_minor: costs[category_index(CostCategory::Compute)],
            dns_cost_minor: costs[category_index(CostCategory::Dns)],
            mail_cost_minor: costs[category_index(CostCategory::Mail)],
            network_cost_minor: costs[category_index(CostCategory::Network)],
            total_cost_minor,
            creator_share_minor: shares.creator_share_minor,
            platform_share_minor: shares.platform_share_minor,
            verified_sum: shares.verified_sum,
            event_count,
        })
    }
}

fn category_index(category: CostCategory) -> usize {
    match category {
        CostCategory::Compute => 0,
        CostCategory::Dns => 1,
        CostCategory::Mail => 2,
        CostCategory::Network => 3,
    }
}

fn usage_units(event: &LedgerEvent) -> RevenueResult<u64> {
    event
        .payload
        .get("units")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| RevenueError::MalformedUsage {
            event_id: event.id,
            reason: "missing or non-integer units".into(),
        })
}
