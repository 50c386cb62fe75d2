//! Revenue metering and the fixed creator/platform split.
//!
//! Money is integer minor units (`i64`, cents) throughout. The split ratio
//! is 55% creator / 45% platform, expressed in basis points and checked at
//! compile time to cover the whole amount. Summaries are never stored: they
//! are recomputed from the ledger on demand.

pub mod error;
pub mod pricing;
pub mod split;
pub mod summary;

pub use error::{RevenueError, RevenueResult};
pub use pricing::{CostCategory, RateCard, UsagePricer};
pub use split::{split, RevenueSplit, CREATOR_SHARE_BPS, PLATFORM_SHARE_BPS};
pub use summary::{RevenueSplitter, RevenueSummary, UsageCharge};
