// Settings for reaching the Apollo Config Service

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the config service base URL
pub const BASE_URL_ENV: &str = "APOLLO_BASE_URL";

/// Environment variable overriding the upstream request timeout, in seconds
pub const TIMEOUT_ENV: &str = "APOLLO_TIMEOUT_SECS";

/// Upper bound on a single upstream request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApolloSettings {
    /// Base URL of the config service; requests fail until it is set
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl ApolloSettings {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read settings from the process environment
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV).ok();
        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|raw| timeout_override(&raw))
            .unwrap_or(DEFAULT_TIMEOUT);

        Self { base_url, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a non-empty base URL is configured
    pub fn has_base_url(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Log the startup warning for a missing base URL
    pub fn warn_if_unconfigured(&self) {
        if !self.has_base_url() {
            tracing::warn!(
                "{} is not set. Requests will fail until it is configured.",
                BASE_URL_ENV
            );
        }
    }
}

impl Default for ApolloSettings {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Load `.env` from the working directory or one of its parents.
///
/// Variables already set in the process environment are left untouched.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Load the `.env` file in `dir`, if there is one
pub fn load_dotenv_from(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(".env");
    dotenvy::from_path(&path).ok().map(|_| path)
}

/// Parse a timeout given in seconds, warning when it is unusable
pub fn timeout_override(raw: &str) -> Option<Duration> {
    let timeout = parse_timeout(raw);
    if timeout.is_none() {
        tracing::warn!("Ignoring invalid {}={:?}", TIMEOUT_ENV, raw);
    }
    timeout
}

fn parse_timeout(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
