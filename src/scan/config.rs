//! Scan worker configuration.
//!
//! All values come from `FULL_SCAN_*` environment variables. Missing or
//! unparseable values fall back to the defaults below.

use std::time::Duration;

use crate::types::CursorName;

use super::freshness::DEFAULT_STALENESS_HOURS;
use super::gate::{DEFAULT_POLL_INTERVAL, DEFAULT_TRIGGER_CAPACITY};
use super::quota::DEFAULT_MIN_QUOTA;
use super::strategy::DEFAULT_REFRESH_DELAY;

/// Default number of pages per cycle.
const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Default schedule interval (30 minutes).
const DEFAULT_SCHEDULE_MINS: u64 = 30;

/// Configuration for the scan driver, trigger gate and schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Name of the persisted watermark.
    ///
    /// Default: `full_scan_user_id`. Configure via `FULL_SCAN_CURSOR_NAME`.
    pub cursor_name: CursorName,

    /// Maximum pages fetched per cycle.
    ///
    /// Default: 10. Configure via `FULL_SCAN_MAX_ROUNDS`.
    pub max_rounds: u32,

    /// Quota that must remain before another round may start.
    ///
    /// Default: 500. Configure via `FULL_SCAN_MIN_QUOTA`.
    pub min_quota: u32,

    /// Records refreshed more recently than this are skipped.
    ///
    /// Default: 1 day. Configure via `FULL_SCAN_STALENESS_HOURS`.
    pub staleness: chrono::Duration,

    /// Pause after each refresh.
    ///
    /// Default: 500ms. Configure via `FULL_SCAN_REFRESH_DELAY_MS`.
    pub refresh_delay: Duration,

    /// How often the idle gate re-checks for shutdown.
    ///
    /// Default: 5 seconds. Configure via `FULL_SCAN_POLL_INTERVAL_SECS`.
    pub poll_interval: Duration,

    /// Interval between scheduled scans. Zero disables the schedule.
    ///
    /// Default: 30 minutes. Configure via `FULL_SCAN_SCHEDULE_MINS`.
    pub schedule_interval: Duration,

    /// Triggers that may wait in the queue before further requests coalesce.
    pub trigger_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanConfig {
    /// Creates a `ScanConfig` with default values.
    pub fn new() -> Self {
        ScanConfig {
            cursor_name: CursorName::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            min_quota: DEFAULT_MIN_QUOTA,
            staleness: chrono::Duration::hours(DEFAULT_STALENESS_HOURS),
            refresh_delay: DEFAULT_REFRESH_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            schedule_interval: Duration::from_secs(DEFAULT_SCHEDULE_MINS * 60),
            trigger_capacity: DEFAULT_TRIGGER_CAPACITY,
        }
    }

    /// Creates a `ScanConfig` from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a `ScanConfig` from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse::<T>().ok())
        }

        let defaults = Self::new();
        ScanConfig {
            cursor_name: lookup("FULL_SCAN_CURSOR_NAME")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(CursorName::new)
                .unwrap_or(defaults.cursor_name),
            max_rounds: parsed(&lookup, "FULL_SCAN_MAX_ROUNDS").unwrap_or(defaults.max_rounds),
            min_quota: parsed(&lookup, "FULL_SCAN_MIN_QUOTA").unwrap_or(defaults.min_quota),
            staleness: parsed::<i64>(&lookup, "FULL_SCAN_STALENESS_HOURS")
                .filter(|h| *h >= 0)
                .and_then(chrono::Duration::try_hours)
                .unwrap_or(defaults.staleness),
            refresh_delay: parsed(&lookup, "FULL_SCAN_REFRESH_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.refresh_delay),
            poll_interval: parsed(&lookup, "FULL_SCAN_POLL_INTERVAL_SECS")
                .filter(|s: &u64| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            schedule_interval: parsed::<u64>(&lookup, "FULL_SCAN_SCHEDULE_MINS")
                .map(|mins| Duration::from_secs(mins.saturating_mul(60)))
                .unwrap_or(defaults.schedule_interval),
            trigger_capacity: defaults.trigger_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ScanConfig::new();
        assert_eq!(config.cursor_name.as_str(), "full_scan_user_id");
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.min_quota, 500);
        assert_eq!(config.staleness, chrono::Duration::hours(24));
        assert_eq!(config.refresh_delay, Duration::from_millis(500));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.schedule_interval, Duration::from_secs(1800));
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(ScanConfig::from_lookup(lookup(&[])), ScanConfig::new());
    }

    #[test]
    fn reads_every_variable() {
        let config = ScanConfig::from_lookup(lookup(&[
            ("FULL_SCAN_CURSOR_NAME", "nightly"),
            ("FULL_SCAN_MAX_ROUNDS", "3"),
            ("FULL_SCAN_MIN_QUOTA", "1000"),
            ("FULL_SCAN_STALENESS_HOURS", "6"),
            ("FULL_SCAN_REFRESH_DELAY_MS", "0"),
            ("FULL_SCAN_POLL_INTERVAL_SECS", "1"),
            ("FULL_SCAN_SCHEDULE_MINS", "0"),
        ]));

        assert_eq!(config.cursor_name, CursorName::new("nightly"));
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.min_quota, 1000);
        assert_eq!(config.staleness, chrono::Duration::hours(6));
        assert_eq!(config.refresh_delay, Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.schedule_interval.is_zero());
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = ScanConfig::from_lookup(lookup(&[
            ("FULL_SCAN_CURSOR_NAME", "  "),
            ("FULL_SCAN_MAX_ROUNDS", "many"),
            ("FULL_SCAN_STALENESS_HOURS", "-4"),
            ("FULL_SCAN_POLL_INTERVAL_SECS", "0"),
        ]));
        assert_eq!(config, ScanConfig::new());
    }
}
