// Rate limit snapshot parsed from response headers.
// Used to explain 403/429 failures to unauthenticated callers.

use reqwest::header::HeaderMap;

/// Rate limit information reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Unix epoch seconds at which the window resets.
    pub reset: Option<u64>,
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl RateLimit {
    /// Read `X-RateLimit-*` headers. Missing or malformed values stay `None`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_u64(headers, "x-ratelimit-limit"),
            remaining: header_u64(headers, "x-ratelimit-remaining"),
            reset: header_u64(headers, "x-ratelimit-reset"),
        }
    }

    /// True only when the server explicitly reported zero remaining requests.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Reset time formatted as `HH:MM:SS` UTC.
    pub fn reset_at(&self) -> Option<String> {
        let reset = i64::try_from(self.reset?).ok()?;
        chrono::DateTime::from_timestamp(reset, 0).map(|dt| dt.format("%H:%M:%S").to_string())
    }
}
