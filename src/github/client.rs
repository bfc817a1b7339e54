//! Octocrab client wrapper and per-cycle connector.
//!
//! `OctocrabClient` carries the retry configuration alongside the octocrab
//! instance so every source call goes through the same backoff policy.
//! `TokenConnector` builds a fresh client at the start of every scan cycle,
//! re-reading the token file if one is configured.

use std::path::PathBuf;

use octocrab::Octocrab;
use tracing::debug;

use super::error::GitHubApiError;
use super::retry::RetryConfig;
use crate::source::SourceConnector;

/// A GitHub API client used by the full scan.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    retry: RetryConfig,
}

impl OctocrabClient {
    /// Wraps a pre-configured Octocrab instance with the default retry policy.
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            retry: RetryConfig::DEFAULT,
        }
    }

    /// Creates a client authenticated with a personal access token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client))
    }

    /// Overrides the retry policy applied to every call.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    /// Returns the retry policy applied to every call.
    pub fn retry(&self) -> RetryConfig {
        self.retry
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Where the connector gets its token from.
#[derive(Clone)]
pub enum TokenSource {
    /// A token fixed for the process lifetime.
    Static(String),
    /// A file re-read on every connect, so rotated tokens are picked up.
    File(PathBuf),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
            TokenSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl TokenSource {
    fn resolve(&self) -> Result<String, GitHubApiError> {
        let token = match self {
            TokenSource::Static(token) => token.clone(),
            TokenSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                GitHubApiError::permanent_without_source(format!(
                    "failed to read token file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(GitHubApiError::permanent_without_source("GitHub token is empty"));
        }
        Ok(token.to_string())
    }
}

/// Builds an [`OctocrabClient`] for each scan cycle.
#[derive(Debug, Clone)]
pub struct TokenConnector {
    token: TokenSource,
    retry: RetryConfig,
}

impl TokenConnector {
    pub fn new(token: TokenSource) -> Self {
        Self {
            token,
            retry: RetryConfig::DEFAULT,
        }
    }

    /// Overrides the retry policy of the clients this connector builds.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl SourceConnector for TokenConnector {
    type Client = OctocrabClient;
    type Error = GitHubApiError;

    async fn connect(&self) -> Result<OctocrabClient, GitHubApiError> {
        let token = self.token.resolve()?;
        let client = OctocrabClient::from_token(token).map_err(GitHubApiError::from_octocrab)?;
        debug!("Built GitHub client for scan cycle");
        Ok(client.with_retry(self.retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn static_token_is_trimmed() {
        let source = TokenSource::Static("  ghp_abc\n".to_string());
        assert_eq!(source.resolve().unwrap(), "ghp_abc");
    }

    #[test]
    fn token_file_is_reread() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        let source = TokenSource::File(path.clone());

        std::fs::write(&path, "first\n").unwrap();
        assert_eq!(source.resolve().unwrap(), "first");

        std::fs::write(&path, "second\n").unwrap();
        assert_eq!(source.resolve().unwrap(), "second");
    }

    #[test]
    fn missing_or_empty_token_is_permanent_error() {
        let dir = tempdir().unwrap();
        let missing = TokenSource::File(dir.path().join("absent"));
        assert!(!missing.resolve().unwrap_err().kind.is_retriable());

        let empty = TokenSource::Static("   ".to_string());
        assert!(!empty.resolve().unwrap_err().kind.is_retriable());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let source = TokenSource::Static("ghp_secret".to_string());
        assert!(!format!("{:?}", source).contains("ghp_secret"));
    }
}
