use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Unbounded window.
    pub fn all() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Everything from `start` onwards.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && (*at < self.end || self.end == DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::all()
    }
}
