//! The quota-budgeted incremental full scan.
//!
//! [`ScanDriver`] walks the source's id space in pages, keyed off a durable
//! cursor, and refreshes records whose last refresh is older than the
//! staleness threshold. It runs whenever the [`TriggerGate`] releases it and
//! yields as soon as the shared quota approaches its reserved minimum.
//!
//! # Module layout
//!
//! - [`gate`]: trigger queue, gate and periodic schedule
//! - [`quota`]: live quota reading and the reserved margin
//! - [`freshness`]: per-record staleness decision
//! - [`strategy`]: refresh strategy and pacing hook
//! - [`driver`]: the cycle and round state machine
//! - [`config`]: environment-driven configuration

pub mod config;
pub mod driver;
pub mod error;
pub mod freshness;
pub mod gate;
pub mod quota;
pub mod strategy;


pub use config::ScanConfig;
pub use driver::{CycleReport, DriverState, ScanDriver, StopReason};
pub use error::ScanError;
pub use freshness::{FreshnessPolicy, is_stale};
pub use gate::{
    ScanTrigger, TriggerError, TriggerGate, TriggerHandle, TriggerOutcome, TriggerReason,
    TriggerResult, run_schedule, trigger_channel,
};
pub use quota::{QuotaGuard, should_continue};
pub use strategy::{DetailRefresh, FixedDelay, Pacing, RefreshStrategy, Unpaced};
