//! The scan driver.
//!
//! Each released trigger runs one cycle: a bounded number of rounds, each of
//! which fetches one page past the persisted cursor, refreshes the stale
//! records on it, and persists the new cursor. The cycle stops cleanly when
//! the quota margin is reached, the source has nothing newer, the page fails
//! to advance the cursor, the round budget runs out, or shutdown begins.
//!
//! # Checkpoints
//!
//! The cursor is written once per round, after every record on the page has
//! been examined. A crash or error mid-round therefore re-processes at most
//! one page; the freshness check makes that replay cheap because records
//! refreshed moments ago are skipped.
//!
//! The cursor tracks ids *examined*, not ids refreshed. A fresh record still
//! advances the watermark.

use std::fmt;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::config::ScanConfig;
use super::error::{Result, ScanError};
use super::freshness::FreshnessPolicy;
use super::gate::{TriggerGate, TriggerResult};
use super::quota::QuotaGuard;
use super::strategy::{DetailRefresh, FixedDelay, Pacing, RefreshStrategy};
use crate::persistence::{CursorStore, RecordStore};
use crate::source::{SourceClient, SourceConnector};
use crate::types::{CursorName, RecordId};

/// Where the driver is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Idle, waiting at the trigger gate.
    Waiting,
    /// Executing a round.
    Running,
    /// A round checkpointed and another may follow.
    Continuing,
    /// The cycle ended; about to return to the gate.
    Stopping,
    /// Shutdown observed at the gate. Terminal.
    Stopped,
}

/// Why a cycle ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The live quota fell below the reserved minimum.
    QuotaExhausted { remaining: u32, minimum: u32 },
    /// The source has no records beyond the cursor.
    EmptyPage,
    /// The page did not contain any id beyond the cursor.
    NoProgress,
    /// `max_rounds` rounds completed.
    RoundBudgetExhausted,
    /// Shutdown was requested.
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::QuotaExhausted { remaining, minimum } => {
                write!(f, "quota exhausted ({} remaining, {} reserved)", remaining, minimum)
            }
            StopReason::EmptyPage => write!(f, "no records beyond cursor"),
            StopReason::NoProgress => write!(f, "cursor did not advance"),
            StopReason::RoundBudgetExhausted => write!(f, "round budget exhausted"),
            StopReason::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub stop: StopReason,
    /// Rounds that persisted a new cursor.
    pub rounds: u32,
    pub refreshed: u32,
    pub skipped: u32,
    /// Cursor when the cycle started.
    pub start_cursor: RecordId,
    /// Cursor when the cycle ended.
    pub cursor: RecordId,
}

/// Per-cycle bookkeeping.
#[derive(Debug)]
struct Session {
    /// Highest stored id when the cycle started; the denominator for progress.
    bound: Option<RecordId>,
    start_cursor: RecordId,
    cursor: RecordId,
    rounds_left: u32,
    rounds: u32,
    refreshed: u32,
    skipped: u32,
    /// Most recent quota reading.
    remaining: u32,
}

impl Session {
    fn into_report(self, stop: StopReason) -> CycleReport {
        CycleReport {
            stop,
            rounds: self.rounds,
            refreshed: self.refreshed,
            skipped: self.skipped,
            start_cursor: self.start_cursor,
            cursor: self.cursor,
        }
    }
}

enum RoundOutcome {
    Continue,
    Stop(StopReason),
}

/// Formats `id` as a percentage of `bound`, for progress logs.
fn progress(id: RecordId, bound: Option<RecordId>) -> String {
    match bound {
        Some(bound) if bound.get() > 0 => {
            format!("{:.2}%", id.get() as f64 * 100.0 / bound.get() as f64)
        }
        _ => "n/a".to_string(),
    }
}

/// Runs scan cycles when the trigger gate releases it.
///
/// Generic over the source connector, both stores, the refresh strategy and
/// the pacing hook so the same loop runs against GitHub in production and an
/// in-memory source in tests.
pub struct ScanDriver<K, R, C, F = DetailRefresh, P = FixedDelay> {
    connector: K,
    records: R,
    cursors: C,
    refresh: F,
    pacing: P,
    cursor_name: CursorName,
    max_rounds: u32,
    quota: QuotaGuard,
    freshness: FreshnessPolicy,
    state: DriverState,
    last_report: Option<CycleReport>,
}

impl<K, R, C> ScanDriver<K, R, C>
where
    K: SourceConnector,
    R: RecordStore,
    C: CursorStore,
{
    /// Creates a driver that refreshes via detail fetches, pausing
    /// `config.refresh_delay` after each.
    pub fn new(connector: K, records: R, cursors: C, config: &ScanConfig) -> Self {
        ScanDriver {
            connector,
            records,
            cursors,
            refresh: DetailRefresh,
            pacing: FixedDelay(config.refresh_delay),
            cursor_name: config.cursor_name.clone(),
            max_rounds: config.max_rounds,
            quota: QuotaGuard::new(config.min_quota),
            freshness: FreshnessPolicy::new(config.staleness),
            state: DriverState::Waiting,
            last_report: None,
        }
    }
}

impl<K, R, C, F, P> ScanDriver<K, R, C, F, P>
where
    K: SourceConnector,
    R: RecordStore,
    C: CursorStore,
    F: RefreshStrategy,
    P: Pacing,
{
    /// Replaces the refresh strategy.
    pub fn with_refresh<F2: RefreshStrategy>(self, refresh: F2) -> ScanDriver<K, R, C, F2, P> {
        ScanDriver {
            connector: self.connector,
            records: self.records,
            cursors: self.cursors,
            refresh,
            pacing: self.pacing,
            cursor_name: self.cursor_name,
            max_rounds: self.max_rounds,
            quota: self.quota,
            freshness: self.freshness,
            state: self.state,
            last_report: self.last_report,
        }
    }

    /// Replaces the pacing hook.
    pub fn with_pacing<P2: Pacing>(self, pacing: P2) -> ScanDriver<K, R, C, F, P2> {
        ScanDriver {
            connector: self.connector,
            records: self.records,
            cursors: self.cursors,
            refresh: self.refresh,
            pacing,
            cursor_name: self.cursor_name,
            max_rounds: self.max_rounds,
            quota: self.quota,
            freshness: self.freshness,
            state: self.state,
            last_report: self.last_report,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Report of the most recent cycle that ended without error.
    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn cursors(&self) -> &C {
        &self.cursors
    }

    /// Runs cycles as triggers arrive until the gate reports shutdown.
    ///
    /// A failed cycle is logged and the driver goes back to waiting; the next
    /// trigger resumes from the last persisted cursor.
    pub async fn run(&mut self, gate: &mut TriggerGate, shutdown: &CancellationToken) {
        info!(cursor = %self.cursor_name, "Scan worker started");

        loop {
            self.state = DriverState::Waiting;
            let trigger = match gate.await_trigger(shutdown).await {
                TriggerResult::Triggered(trigger) => trigger,
                TriggerResult::ShuttingDown => break,
            };

            info!(
                reason = %trigger.reason,
                requested_at = %trigger.requested_at,
                "Scan triggered"
            );

            if let Err(e) = self.run_cycle(shutdown).await {
                error!(error = %e, "Scan cycle failed, will resume from last checkpoint");
            }
        }

        self.state = DriverState::Stopped;
        info!("Scan worker stopped");
    }

    /// Runs one cycle of up to `max_rounds` rounds.
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> Result<CycleReport> {
        self.state = DriverState::Running;
        let result = self.cycle(shutdown).await;
        self.state = DriverState::Stopping;

        if let Ok(report) = &result {
            self.last_report = Some(report.clone());
        }
        result
    }

    #[instrument(skip_all, fields(cursor_name = %self.cursor_name))]
    async fn cycle(&mut self, shutdown: &CancellationToken) -> Result<CycleReport> {
        // A fresh client per cycle picks up rotated credentials.
        let client = self.connector.connect().await.map_err(ScanError::connect)?;

        let remaining = self.quota.remaining(&client).await?;
        let start_cursor = RecordId(self.cursors.get_cursor(&self.cursor_name)?);
        let mut session = Session {
            bound: self.records.max_id()?,
            start_cursor,
            cursor: start_cursor,
            rounds_left: self.max_rounds,
            rounds: 0,
            refreshed: 0,
            skipped: 0,
            remaining,
        };

        info!(
            remaining,
            cursor = %start_cursor,
            bound = ?session.bound.map(RecordId::get),
            max_rounds = self.max_rounds,
            "Full scan started"
        );

        let stop = loop {
            if shutdown.is_cancelled() {
                break StopReason::Shutdown;
            }
            if session.rounds_left == 0 {
                break StopReason::RoundBudgetExhausted;
            }

            self.state = DriverState::Running;
            match self.run_round(&client, &mut session, shutdown).await? {
                RoundOutcome::Continue => {
                    session.rounds_left -= 1;
                    self.state = DriverState::Continuing;
                }
                RoundOutcome::Stop(reason) => break reason,
            }
        };

        info!(
            reason = %stop,
            remaining = session.remaining,
            rounds = session.rounds,
            refreshed = session.refreshed,
            skipped = session.skipped,
            cursor = %session.cursor,
            "Full scan finished"
        );
        Ok(session.into_report(stop))
    }

    async fn run_round(
        &self,
        client: &K::Client,
        session: &mut Session,
        shutdown: &CancellationToken,
    ) -> Result<RoundOutcome> {
        let remaining = self.quota.remaining(client).await?;
        session.remaining = remaining;
        if !self.quota.should_continue(remaining) {
            info!(
                remaining,
                minimum = self.quota.minimum(),
                "Quota below reserved minimum, stopping"
            );
            return Ok(RoundOutcome::Stop(StopReason::QuotaExhausted {
                remaining,
                minimum: self.quota.minimum(),
            }));
        }

        let start = RecordId(self.cursors.get_cursor(&self.cursor_name)?);
        let mut page = client
            .list_records_since(start)
            .await
            .map_err(ScanError::external)?;
        if page.is_empty() {
            info!(cursor = %start, "No records beyond cursor, stopping");
            return Ok(RoundOutcome::Stop(StopReason::EmptyPage));
        }
        // Records must be examined in ascending id order, once each, or a
        // mid-page checkpoint could cover ids that were never looked at.
        page.sort_by_key(|record| record.id);
        page.dedup_by_key(|record| record.id);
        debug!(cursor = %start, count = page.len(), remaining, "Fetched page");

        self.records.bulk_upsert(&page)?;

        let mut candidate = start;
        let mut interrupted = false;
        for record in &page {
            let now = Utc::now();
            let last_updated_at = self.records.get_updated_at(record.id)?;

            if self.freshness.needs_refresh(last_updated_at, now) {
                let refreshed = self
                    .refresh
                    .refresh(client, &self.records, record.id, now)
                    .await?;
                session.refreshed += 1;
                info!(
                    id = %refreshed.id,
                    identifier = %refreshed.identifier,
                    progress = %progress(refreshed.id, session.bound),
                    "Refreshed record"
                );
                self.pause(shutdown).await;
            } else {
                session.skipped += 1;
                debug!(
                    id = %record.id,
                    identifier = %record.identifier,
                    updated_at = ?last_updated_at,
                    "Skipped up-to-date record"
                );
            }

            candidate = candidate.max(record.id);

            if shutdown.is_cancelled() {
                interrupted = true;
                break;
            }
        }

        if candidate <= start {
            if interrupted {
                return Ok(RoundOutcome::Stop(StopReason::Shutdown));
            }
            warn!(cursor = %start, "Page did not advance the cursor, stopping");
            return Ok(RoundOutcome::Stop(StopReason::NoProgress));
        }

        self.cursors.set_cursor(&self.cursor_name, candidate.get())?;
        session.cursor = candidate;
        session.rounds += 1;
        info!(from = %start, to = %candidate, "Cursor advanced");

        if interrupted {
            info!(cursor = %candidate, "Shutdown requested, stopping after checkpoint");
            return Ok(RoundOutcome::Stop(StopReason::Shutdown));
        }
        Ok(RoundOutcome::Continue)
    }

    /// Runs the pacing hook, cut short by shutdown.
    async fn pause(&self, shutdown: &CancellationToken) {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = self.pacing.after_refresh() => {}
        }
    }
}
