//! Quota guard.
//!
//! The external quota is shared with everything else using the same token
//! (other workers, manual usage), so it is re-read before every round and
//! never assumed stable. The scan stops while `minimum` calls are still left
//! so co-tenants of the quota aren't starved.

use tracing::debug;

use super::error::{Result, ScanError};
use crate::source::SourceClient;

/// Default reserved margin (GitHub's core limit is 5000 calls per hour).
pub const DEFAULT_MIN_QUOTA: u32 = 500;

/// Returns true if the scan may spend more quota.
pub fn should_continue(remaining: u32, minimum: u32) -> bool {
    remaining >= minimum
}

/// Reads the live quota and applies the reserved margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaGuard {
    minimum: u32,
}

impl Default for QuotaGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUOTA)
    }
}

impl QuotaGuard {
    pub fn new(minimum: u32) -> Self {
        QuotaGuard { minimum }
    }

    /// The reserved margin.
    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    /// Queries the source for the remaining budget. Not cached.
    pub async fn remaining<C: SourceClient>(&self, client: &C) -> Result<u32> {
        let remaining = client
            .quota_remaining()
            .await
            .map_err(ScanError::external)?;
        debug!(remaining, minimum = self.minimum, "Read quota");
        Ok(remaining)
    }

    pub fn should_continue(&self, remaining: u32) -> bool {
        should_continue(remaining, self.minimum)
    }
}
