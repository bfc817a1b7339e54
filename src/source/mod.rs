//! Contracts for the external record source.
//!
//! The scan core never talks to GitHub directly. It goes through these traits,
//! which lets tests drive the scan with an in-memory source and keeps the
//! retry and rate-limit handling inside the client implementation.
//!
//! The GitHub implementation lives in [`crate::github`].

use std::future::Future;

use crate::types::{Record, RecordId};

/// A client for the external, rate-limited record source.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct FixedSource { records: Vec<Record> }
///
/// impl SourceClient for FixedSource {
///     type Error = std::io::Error;
///
///     async fn quota_remaining(&self) -> Result<u32, Self::Error> { Ok(5000) }
///
///     async fn list_records_since(&self, since: RecordId) -> Result<Vec<Record>, Self::Error> {
///         Ok(self.records.iter().filter(|r| r.id > since).cloned().collect())
///     }
///
///     async fn refresh_detail(&self, id: RecordId) -> Result<Record, Self::Error> {
///         self.records.iter().find(|r| r.id == id).cloned()
///             .ok_or_else(|| std::io::Error::other("not found"))
///     }
/// }
/// ```
pub trait SourceClient: Send + Sync {
    /// The error type returned by this client.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the remaining call budget. Always read live, never cached.
    fn quota_remaining(&self) -> impl Future<Output = Result<u32, Self::Error>> + Send;

    /// Returns the next page of records with `id > since`, ascending by id.
    ///
    /// An empty page means nothing newer exists yet.
    fn list_records_since(
        &self,
        since: RecordId,
    ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send;

    /// Fetches the full detail for one record.
    ///
    /// The returned record's `updated_at` is whatever the source reports; the
    /// refresh strategy stamps it when it stores the result.
    fn refresh_detail(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Record, Self::Error>> + Send;
}

/// Produces an authorized client at the start of every scan cycle.
///
/// Connecting per cycle means a long-running worker picks up rotated
/// credentials without a restart.
pub trait SourceConnector: Send + Sync {
    /// The client type produced by this connector.
    type Client: SourceClient;

    /// The error type returned when a client can't be built.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Builds a client for one scan cycle.
    fn connect(&self) -> impl Future<Output = Result<Self::Client, Self::Error>> + Send;
}
