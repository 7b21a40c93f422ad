// Fetcher configuration.
// Defaults, environment loading and CI detection.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::default_cache_dir;
use crate::http::{AuthScheme, DEFAULT_REQUEST_TIMEOUT, RetryPolicy};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_USER_AGENT: &str = concat!("repofetch/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`crate::Fetcher`].
#[derive(Clone)]
pub struct FetchConfig {
    /// API base URL used by [`crate::Fetcher::get`].
    pub api_url: String,
    /// Token used by [`crate::Fetcher::get`]. Empty strings count as absent.
    pub token: Option<String>,
    pub auth_scheme: AuthScheme,
    /// Directory of the persistent cache. `None` disables it.
    pub cache_dir: Option<PathBuf>,
    /// Refuse unauthenticated requests (set automatically on CI).
    pub require_token: bool,
    pub user_agent: String,
    pub accept_language: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Documentation link included in the missing-credential hint.
    pub docs_url: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            auth_scheme: AuthScheme::default(),
            cache_dir: None,
            require_token: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            docs_url: None,
        }
    }
}

impl FetchConfig {
    /// Build a configuration from the process environment.
    ///
    /// Reads `GITHUB_TOKEN` and `GITHUB_API_URL`, uses the platform cache
    /// directory, and requires a token when `CI` or `GITHUB_ACTIONS` is set.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup("GITHUB_API_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.api_url),
            token: lookup("GITHUB_TOKEN").filter(|token| !token.is_empty()),
            cache_dir: default_cache_dir(),
            require_token: is_truthy(lookup("CI").as_deref())
                || is_truthy(lookup("GITHUB_ACTIONS").as_deref()),
            ..defaults
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("auth_scheme", &self.auth_scheme)
            .field("cache_dir", &self.cache_dir)
            .field("require_token", &self.require_token)
            .field("user_agent", &self.user_agent)
            .field("accept_language", &self.accept_language)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("docs_url", &self.docs_url)
            .finish()
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )
    })
}
