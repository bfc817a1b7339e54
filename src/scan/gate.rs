//! Trigger gate between scan requests and the scan driver.
//!
//! Producers (the HTTP endpoint, the periodic schedule) hold a cloneable
//! [`TriggerHandle`]; the driver owns the single [`TriggerGate`]. The channel
//! is bounded, so a burst of requests coalesces into whatever is already
//! queued instead of piling up back-to-back cycles.
//!
//! # Shutdown
//!
//! The gate wakes immediately when the shutdown token is cancelled. It also
//! re-checks the token every `poll_interval` while idle, so a missed wakeup
//! can delay shutdown by at most one interval.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Default interval between shutdown re-checks while idle.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of triggers that may wait in the queue.
pub const DEFAULT_TRIGGER_CAPACITY: usize = 1;

/// Who asked for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The periodic schedule fired.
    Schedule,
    /// An operator called `POST /scan`.
    Http,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Schedule => write!(f, "schedule"),
            TriggerReason::Http => write!(f, "http"),
        }
    }
}

/// A single request to run a scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTrigger {
    pub reason: TriggerReason,
    pub requested_at: DateTime<Utc>,
}

/// What the gate released the driver for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResult {
    Triggered(ScanTrigger),
    ShuttingDown,
}

/// What happened to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The request was queued and will start a cycle.
    Queued,
    /// The queue was full; an already-queued request covers this one.
    Coalesced,
}

impl TriggerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOutcome::Queued => "queued",
            TriggerOutcome::Coalesced => "coalesced",
        }
    }
}

/// Errors returned when requesting a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// The gate has been dropped; no further scans will run.
    #[error("scan worker is no longer accepting triggers")]
    Closed,
}

/// Creates a connected handle and gate.
///
/// `capacity` is clamped to at least 1.
pub fn trigger_channel(capacity: usize, poll_interval: Duration) -> (TriggerHandle, TriggerGate) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TriggerHandle { tx },
        TriggerGate {
            rx,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        },
    )
}

/// Producer side of the trigger queue.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<ScanTrigger>,
}

impl TriggerHandle {
    /// Requests a scan without waiting.
    pub fn request(&self, reason: TriggerReason) -> Result<TriggerOutcome, TriggerError> {
        let trigger = ScanTrigger {
            reason,
            requested_at: Utc::now(),
        };
        match self.tx.try_send(trigger) {
            Ok(()) => Ok(TriggerOutcome::Queued),
            Err(TrySendError::Full(_)) => Ok(TriggerOutcome::Coalesced),
            Err(TrySendError::Closed(_)) => Err(TriggerError::Closed),
        }
    }

    /// Returns true once the gate has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the trigger queue, owned by the scan driver.
#[derive(Debug)]
pub struct TriggerGate {
    rx: mpsc::Receiver<ScanTrigger>,
    poll_interval: Duration,
}

impl TriggerGate {
    /// Blocks until a scan is requested or shutdown begins.
    ///
    /// Consumes exactly one queued trigger per `Triggered` result. Shutdown
    /// takes priority over a queued trigger.
    pub async fn await_trigger(&mut self, shutdown: &CancellationToken) -> TriggerResult {
        loop {
            if shutdown.is_cancelled() {
                return TriggerResult::ShuttingDown;
            }

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    return TriggerResult::ShuttingDown;
                }

                received = tokio::time::timeout(self.poll_interval, self.rx.recv()) => {
                    match received {
                        Ok(Some(trigger)) => return TriggerResult::Triggered(trigger),
                        Ok(None) => {
                            info!("All trigger handles dropped, shutting down");
                            return TriggerResult::ShuttingDown;
                        }
                        Err(_) => trace!("No scan requested yet"),
                    }
                }
            }
        }
    }
}

/// Requests a scan every `interval` until `shutdown` is cancelled.
///
/// The first request is made immediately. A zero interval disables the
/// schedule. Returns early if the gate goes away.
pub async fn run_schedule(handle: TriggerHandle, interval: Duration, shutdown: CancellationToken) {
    if interval.is_zero() {
        debug!("Scan schedule disabled");
        return;
    }

    info!(interval_secs = interval.as_secs(), "Scan schedule started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => match handle.request(TriggerReason::Schedule) {
                Ok(outcome) => debug!(outcome = outcome.as_str(), "Scheduled scan requested"),
                Err(TriggerError::Closed) => break,
            },
        }
    }
    info!("Scan schedule stopped");
}
