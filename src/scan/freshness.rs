//! Per-record freshness decision.
//!
//! A full scan revisits records that faster incremental updates already
//! refreshed. Skipping anything refreshed within the staleness threshold keeps
//! those records from costing quota twice.

use chrono::{DateTime, Duration, Utc};

/// Default staleness threshold (1 day).
pub const DEFAULT_STALENESS_HOURS: i64 = 24;

/// Returns true when `last_updated_at` is at least `threshold` old at `now`.
///
/// The boundary is inclusive: a record exactly `threshold` old is stale.
pub fn is_stale(last_updated_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now - last_updated_at >= threshold
}

/// Staleness policy applied by the scan driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    threshold: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_STALENESS_HOURS))
    }
}

impl FreshnessPolicy {
    pub fn new(threshold: Duration) -> Self {
        FreshnessPolicy { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Decides whether a record with the given refresh stamp needs refreshing.
    ///
    /// A record that has never been refreshed always does.
    pub fn needs_refresh(&self, last_updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_updated_at.is_none_or(|t| is_stale(t, now, self.threshold))
    }
}
