use imvu_ledger::EventType;
use serde::{Deserialize, Serialize};

use crate::error::{RevenueError, RevenueResult};

const BYTES_PER_GIB: i128 = 1 << 30;

/// Billable usage categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    /// Units are cpu-seconds.
    Compute,
    /// Units are queries.
    Dns,
    /// Units are messages.
    Mail,
    /// Units are bytes.
    Network,
}

impl CostCategory {
    pub const ALL: [CostCategory; 4] = [
        CostCategory::Compute,
        CostCategory::Dns,
        CostCategory::Mail,
        CostCategory::Network,
    ];

    /// Ledger event type that records usage of this category.
    pub fn event_type(&self) -> EventType {
        match self {
            CostCategory::Compute => EventType::ComputeUsage,
            CostCategory::Dns => EventType::DnsQuery,
            CostCategory::Mail => EventType::MailSent,
            CostCategory::Network => EventType::NetworkBytes,
        }
    }

    pub fn from_event_type(event_type: &EventType) -> Option<Self> {
        match event_type {
            EventType::ComputeUsage => Some(CostCategory::Compute),
            EventType::DnsQuery => Some(CostCategory::Dns),
            EventType::MailSent => Some(CostCategory::Mail),
            EventType::NetworkBytes => Some(CostCategory::Network),
            _ => None,
        }
    }
}

impl std::fmt::Display for CostCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CostCategory::Compute => "compute",
            CostCategory::Dns => "dns",
            CostCategory::Mail => "mail",
            CostCategory::Network => "network",
        };
        f.write_str(s)
    }
}

/// Per-unit cost function supplied from outside the core.
pub trait UsagePricer: Send + Sync {
    /// Cost in minor units of `units` of `category`.
    fn price(&self, category: CostCategory, units: u64) -> RevenueResult<i64>;
}

/// Flat per-unit prices in minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCard {
    #[serde(default = "default_compute_price")]
    pub compute_per_cpu_second_minor: i64,
    #[serde(default = "default_dns_price")]
    pub dns_per_query_minor: i64,
    #[serde(default = "default_mail_price")]
    pub mail_per_message_minor: i64,
    /// Network is priced per GiB; partial GiB are prorated and rounded half-up.
    #[serde(default = "default_network_price")]
    pub network_per_gib_minor: i64,
}

fn default_compute_price() -> i64 {
    1
}

fn default_dns_price() -> i64 {
    1
}

fn default_mail_price() -> i64 {
    2
}

fn default_network_price() -> i64 {
    10
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            compute_per_cpu_second_minor: default_compute_price(),
            dns_per_query_minor: default_dns_price(),
            mail_per_message_minor: default_mail_price(),
            network_per_gib_minor: default_network_price(),
        }
    }
}

impl RateCard {
    pub fn validate(&self) -> RevenueResult<()> {
        for category in CostCategory::ALL {
            if self.rate(category) < 0 {
                return Err(RevenueError::Validation(format!(
                    "{category} price must not be negative"
                )));
            }
        }
        Ok(())
    }

    fn rate(&self, category: CostCategory) -> i64 {
        match category {
            CostCategory::Compute => self.compute_per_cpu_second_minor,
            CostCategory::Dns => self.dns_per_query_minor,
            CostCategory::Mail => self.mail_per_message_minor,
            CostCategory::Network => self.network_per_gib_minor,
        }
    }
}

impl UsagePricer for RateCard {
    fn price(&self, category: CostCategory, units: u64) -> RevenueResult<i64> {
        let rate = i128::from(self.rate(category));
        if rate < 0 {
            return Err(RevenueError::Validation(format!(
                "{category} price must not be negative"
            )));
        }
        let gross = i128::from(units) * rate;
        let cost = match category {
            CostCategory::Network => (gross + BYTES_PER_GIB / 2) / BYTES_PER_GIB,
            _ => gross,
        };
        i64::try_from(cost).map_err(|_| {
            RevenueError::Validation(format!("{units} units of {category} overflow the cost range"))
        })
    }
}
