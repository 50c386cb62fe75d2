use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{RevenueError, RevenueResult};

/// Creator share in basis points.
pub const CREATOR_SHARE_BPS: i64 = 5_500;
/// Platform share in basis points.
pub const PLATFORM_SHARE_BPS: i64 = 4_500;

const BPS_DENOMINATOR: i64 = 10_000;
/// Largest allowed difference between the rounded shares and the total.
const TOLERANCE_MINOR: i128 = 1;

const _: () = assert!(CREATOR_SHARE_BPS + PLATFORM_SHARE_BPS == BPS_DENOMINATOR);

/// A verified split of a revenue total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub total_minor: i64,
    pub creator_share_minor: i64,
    pub platform_share_minor: i64,
    pub verified_sum: bool,
}

/// Split `total_minor` 55/45 between creator and platform.
///
/// Each share is rounded half-up on its own. The rounded shares may
/// overshoot the total by one unit; the platform share absorbs that unit so
/// the returned shares always sum exactly. A larger discrepancy is an
/// [`RevenueError::Invariant`].
pub fn split(total_minor: i64) -> RevenueResult<RevenueSplit> {
    if total_minor < 0 {
        return Err(RevenueError::Validation(format!(
            "total revenue must not be negative, got {total_minor}"
        )));
    }

    let creator = share(total_minor, CREATOR_SHARE_BPS);
    let platform = share(total_minor, PLATFORM_SHARE_BPS);
    let discrepancy = creator + platform - i128::from(total_minor);
    if discrepancy.abs() > TOLERANCE_MINOR {
        error!(
            total_minor,
            creator = %creator,
            platform = %platform,
            "Revenue split exceeded rounding tolerance"
        );
        return Err(RevenueError::Invariant(format!(
            "shares {creator} + {platform} differ from total {total_minor} by {discrepancy}"
        )));
    }

    let creator_share_minor = to_minor(creator)?;
    let platform_share_minor = to_minor(platform - discrepancy)?;
    Ok(RevenueSplit {
        total_minor,
        creator_share_minor,
        platform_share_minor,
        verified_sum: creator_share_minor.checked_add(platform_share_minor) == Some(total_minor),
    })
}

/// `amount * bps / 10_000`, rounded half-up. Non-negative input only.
fn share(amount: i64, bps: i64) -> i128 {
    let scaled = i128::from(amount) * i128::from(bps);
    let denominator = i128::from(BPS_DENOMINATOR);
    (scaled + denominator / 2) / denominator
}

fn to_minor(value: i128) -> RevenueResult<i64> {
    i64::try_from(value)
        .map_err(|_| RevenueError::Invariant(format!("share {value} does not fit in i64")))
}
