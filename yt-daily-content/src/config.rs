//! Run configuration.
//!
//! There are no required flags. Everything has a default and can be overridden through
//! `YT_DAILY_*` environment variables.

use crate::aggregate::UploadOrdering;
use std::path::PathBuf;
use std::time::Duration;

/// Base URL of the YouTube Data API v3.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `token.json` and `credentials.json`.
    pub auth_dir: PathBuf,
    /// Base URL for all YouTube Data API requests.
    pub api_base: String,
    /// Timeout applied to every single HTTP request.
    pub request_timeout: Duration,
    /// How many channels are fetched at the same time.
    pub concurrency: usize,
    pub ordering: UploadOrdering,
    /// Whether a missing token cache may be filled by opening the browser for consent.
    pub interactive_login: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from("auth"),
            api_base: YOUTUBE_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            concurrency: 4,
            ordering: UploadOrdering::NewestFirst,
            interactive_login: true,
        }
    }
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source (e.g. for tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("YT_DAILY_AUTH_DIR") {
            config.auth_dir = PathBuf::from(dir);
        }
        if let Some(base) = lookup("YT_DAILY_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("YT_DAILY_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| eyre::eyre!("YT_DAILY_TIMEOUT_SECS={secs:?} is not a number: {e}"))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = lookup("YT_DAILY_CONCURRENCY") {
            config.concurrency = n
                .parse()
                .map_err(|e| eyre::eyre!("YT_DAILY_CONCURRENCY={n:?} is not a number: {e}"))?;
        }
        if is_set(lookup("YT_DAILY_FULL_SCAN")) {
            config.ordering = UploadOrdering::Unordered;
        }
        if is_set(lookup("YT_DAILY_NO_BROWSER")) {
            config.interactive_login = false;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        eyre::ensure!(
            !self.request_timeout.is_zero(),
            "YT_DAILY_TIMEOUT_SECS must be > 0"
        );
        eyre::ensure!(
            (1..=32).contains(&self.concurrency),
            "YT_DAILY_CONCURRENCY must be between 1 and 32, got {}",
            self.concurrency
        );
        eyre::ensure!(
            self.api_base.starts_with("http://") || self.api_base.starts_with("https://"),
            "YT_DAILY_API_BASE must be an http(s) URL, got {:?}",
            self.api_base
        );
        Ok(())
    }
}

fn is_set(value: Option<String>) -> bool {
    matches!(value.as_deref(), Some("1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> eyre::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = from_map(&[]).unwrap();
        assert_eq!(config.auth_dir, PathBuf::from("auth"));
        assert_eq!(config.api_base, YOUTUBE_API_BASE);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.ordering, UploadOrdering::NewestFirst);
        assert!(config.interactive_login);
    }

    #[test]
    fn overrides() {
        let config = from_map(&[
            ("YT_DAILY_AUTH_DIR", "/tmp/yt"),
            ("YT_DAILY_API_BASE", "http://127.0.0.1:9000/"),
            ("YT_DAILY_TIMEOUT_SECS", "5"),
            ("YT_DAILY_CONCURRENCY", "1"),
            ("YT_DAILY_FULL_SCAN", "1"),
            ("YT_DAILY_NO_BROWSER", "true"),
        ])
        .unwrap();
        assert_eq!(config.auth_dir, PathBuf::from("/tmp/yt"));
        assert_eq!(config.api_base, "http://127.0.0.1:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.ordering, UploadOrdering::Unordered);
        assert!(!config.interactive_login);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(from_map(&[("YT_DAILY_CONCURRENCY", "0")]).is_err());
        assert!(from_map(&[("YT_DAILY_CONCURRENCY", "many")]).is_err());
        assert!(from_map(&[("YT_DAILY_TIMEOUT_SECS", "0")]).is_err());
        assert!(from_map(&[("YT_DAILY_API_BASE", "ftp://example.com")]).is_err());
    }
}
