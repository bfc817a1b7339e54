//! Errors that abort a scan cycle.
//!
//! Quota exhaustion, convergence and shutdown are not errors; they are
//! [`StopReason`](super::StopReason)s. Everything here means the cycle ended
//! early and the next trigger resumes from the last persisted cursor.

use thiserror::Error;

use crate::persistence::PersistenceError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during a scan cycle.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Building an authorized source client failed.
    #[error("failed to connect to source: {0}")]
    Connect(#[source] BoxError),

    /// A quota read, page fetch or detail refresh failed.
    #[error("source request failed: {0}")]
    External(#[source] BoxError),

    /// Reading or writing the record or cursor store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl ScanError {
    /// Wraps a connector error.
    pub fn connect(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ScanError::Connect(Box::new(err))
    }

    /// Wraps a source client error.
    pub fn external(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ScanError::External(Box::new(err))
    }
}

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;
