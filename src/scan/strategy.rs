//! Injectable per-record behavior: how a stale record is refreshed and how
//! the driver paces itself between refreshes.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::{Result, ScanError};
use crate::persistence::RecordStore;
use crate::source::SourceClient;
use crate::types::{Record, RecordId};

/// Default pause after each refresh.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(500);

/// Refreshes one stale record.
pub trait RefreshStrategy: Send + Sync {
    /// Refreshes `id` and stores the result stamped with `now`.
    fn refresh<C, S>(
        &self,
        client: &C,
        store: &S,
        id: RecordId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Record>> + Send
    where
        C: SourceClient,
        S: RecordStore;
}

/// Fetches the record's detail from the source and upserts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailRefresh;

impl RefreshStrategy for DetailRefresh {
    async fn refresh<C, S>(
        &self,
        client: &C,
        store: &S,
        id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<Record>
    where
        C: SourceClient,
        S: RecordStore,
    {
        let detail = client
            .refresh_detail(id)
            .await
            .map_err(ScanError::external)?;
        let refreshed = detail.refreshed_at(now);
        store.bulk_upsert(std::slice::from_ref(&refreshed))?;
        Ok(refreshed)
    }
}

/// Runs after every refresh. The driver races it against shutdown.
pub trait Pacing: Send + Sync {
    fn after_refresh(&self) -> impl Future<Output = ()> + Send;
}

/// Sleeps for a fixed delay to smooth the request rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay(DEFAULT_REFRESH_DELAY)
    }
}

impl Pacing for FixedDelay {
    async fn after_refresh(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// No pause at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

impl Pacing for Unpaced {
    async fn after_refresh(&self) {}
}
