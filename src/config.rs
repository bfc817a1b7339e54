//! Process-level configuration read once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::github::{RetryConfig, TokenSource};
use crate::scan::ScanConfig;

const DEFAULT_STATE_DIR: &str = "./state";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Errors in the process environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither GITHUB_TOKEN_FILE nor GITHUB_TOKEN is set")]
    MissingToken,

    #[error("invalid FULL_SCAN_LISTEN_ADDR {value:?}: {source}")]
    InvalidListenAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid FULL_SCAN_RETRY {value:?}: expected default, patient or none")]
    InvalidRetry { value: String },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `cursors.json` and `records.json`.
    pub state_dir: PathBuf,
    pub listen_addr: SocketAddr,
    /// `GITHUB_TOKEN_FILE` wins over `GITHUB_TOKEN`; a file is re-read on
    /// every cycle.
    pub token: TokenSource,
    /// Backoff applied to every GitHub call, chosen by `FULL_SCAN_RETRY`.
    pub retry: RetryConfig,
    pub scan: ScanConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = match (non_empty("GITHUB_TOKEN_FILE"), non_empty("GITHUB_TOKEN")) {
            (Some(path), _) => TokenSource::File(PathBuf::from(path)),
            (None, Some(token)) => TokenSource::Static(token),
            (None, None) => return Err(ConfigError::MissingToken),
        };

        let listen_raw =
            non_empty("FULL_SCAN_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr {
                value: listen_raw.clone(),
                source,
            })?;

        let retry = match non_empty("FULL_SCAN_RETRY") {
            Some(value) => {
                RetryConfig::from_preset(&value).ok_or(ConfigError::InvalidRetry { value })?
            }
            None => RetryConfig::DEFAULT,
        };

        Ok(AppConfig {
            state_dir: non_empty("FULL_SCAN_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            listen_addr,
            token,
            retry,
            scan: ScanConfig::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn token_is_required() {
        let result = AppConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingToken)));
    }

    #[test]
    fn defaults_with_static_token() {
        let config = AppConfig::from_lookup(lookup(&[("GITHUB_TOKEN", "ghp_x")])).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("./state"));
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert!(matches!(config.token, TokenSource::Static(ref t) if t == "ghp_x"));
        assert_eq!(config.retry, RetryConfig::DEFAULT);
        assert_eq!(config.scan, ScanConfig::new());
    }

    #[test]
    fn token_file_wins() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("GITHUB_TOKEN_FILE", "/run/secrets/token"),
        ]))
        .unwrap();
        assert!(
            matches!(config.token, TokenSource::File(ref p) if p == &PathBuf::from("/run/secrets/token"))
        );
    }

    #[test]
    fn reads_paths_and_scan_settings() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("FULL_SCAN_STATE_DIR", "/var/lib/full-scan"),
            ("FULL_SCAN_LISTEN_ADDR", "127.0.0.1:8080"),
            ("FULL_SCAN_MAX_ROUNDS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/full-scan"));
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.scan.max_rounds, 2);
    }

    #[test]
    fn retry_preset_is_selectable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("FULL_SCAN_RETRY", "patient"),
        ]))
        .unwrap();
        assert_eq!(config.retry, RetryConfig::PATIENT);

        let config = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("FULL_SCAN_RETRY", "none"),
        ]))
        .unwrap();
        assert_eq!(config.retry, RetryConfig::NONE);
    }

    #[test]
    fn unknown_retry_preset_is_an_error() {
        let result = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("FULL_SCAN_RETRY", "forever"),
        ]));
        assert!(
            matches!(result, Err(ConfigError::InvalidRetry { ref value }) if value == "forever")
        );
    }

    #[test]
    fn bad_listen_addr_is_an_error() {
        let result = AppConfig::from_lookup(lookup(&[
            ("GITHUB_TOKEN", "ghp_x"),
            ("FULL_SCAN_LISTEN_ADDR", "not-an-addr"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidListenAddr { .. })));
    }
}
