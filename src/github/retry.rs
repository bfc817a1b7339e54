//! Exponential backoff retry for GitHub API calls.
//!
//! - Default: 3 retries with 2s, 4s, 8s delays
//! - Patient: 6 retries with 1s base, 60s cap, for callers that would rather
//!   wait out a secondary rate limit than abort a scan cycle
//! - None: a single attempt
//!
//! Only transient errors are retried. Permanent errors are returned after the
//! first attempt. Retries stay inside the client: the scan driver sees one
//! call that either succeeded or failed for good.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::GitHubApiError;

/// Configuration for exponential backoff retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// 3 retries with 2s, 4s, 8s delays (14 seconds worst case).
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16),
        backoff_multiplier: 2.0,
    };

    /// 6 retries with 1s base, 60s cap (63 seconds worst case).
    pub const PATIENT: Self = Self {
        max_retries: 6,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
    };

    /// A single attempt, no retries.
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 1.0,
    };

    /// Looks up a preset by name: `default`, `patient` or `none`.
    pub fn from_preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::DEFAULT),
            "patient" => Some(Self::PATIENT),
            "none" => Some(Self::NONE),
            _ => None,
        }
    }

    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let grown = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(grown.min(self.max_delay.as_secs_f64()))
    }

    /// Every delay this configuration can sleep, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the retry budget
/// in `config` is spent.
///
/// The last error is returned when retries run out.
pub async fn retry_with_backoff<T, F, Fut>(
    config: RetryConfig,
    mut operation: F,
) -> Result<T, GitHubApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let mut retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.kind.is_retriable() {
            return Err(err);
        }
        if retries >= config.max_retries {
            warn!(attempts = retries + 1, error = %err, "Giving up after transient GitHub errors");
            return Err(err);
        }

        let delay = config.delay_for_attempt(retries);
        warn!(
            attempt = retries + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient GitHub error, retrying"
        );
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}
