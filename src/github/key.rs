// Normalized identity of one logical API request.
// Used as the in-process memoization key and to derive the full URL.

use std::fmt;

/// (host, path, token) with redundant slashes and empty tokens normalized away.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    host: String,
    path: String,
    token: Option<String>,
}

impl FetchKey {
    pub fn new(host: &str, path: &str, token: Option<&str>) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            path: path.trim_start_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Absolute URL `<host>/<path>`.
    pub fn url(&self) -> String {
        full_url(&self.host, &self.path)
    }
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn full_url(host: &str, path: &str) -> String {
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl fmt::Debug for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchKey")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
