//! GitHub-backed record source.
//!
//! This module provides the octocrab implementation of
//! [`SourceClient`](crate::source::SourceClient) and
//! [`SourceConnector`](crate::source::SourceConnector).
//!
//! Key features:
//! - Exponential backoff retry for transient failures
//! - Distinguishes transient vs permanent errors
//! - Token re-resolution at the start of every scan cycle

mod client;
mod error;
mod retry;
mod source;

pub use client::{OctocrabClient, TokenConnector, TokenSource};
pub use error::{GitHubApiError, GitHubErrorKind};
pub use retry::{RetryConfig, retry_with_backoff};
pub use source::USERS_PAGE_SIZE;
