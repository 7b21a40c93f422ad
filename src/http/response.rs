// Response interpretation.
// Decompresses bodies, detects charsets and renders bounded error diagnostics.

use std::io::Read;
use std::sync::LazyLock;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};
use flate2::read::MultiGzDecoder;
use regex::Regex;
use reqwest::{
    Response, StatusCode,
    header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, RETRY_AFTER},
};

use crate::error::{FetchError, Result};

/// Bodies larger than this are summarized by size only in error messages.
pub const MAX_RENDERED_BODY: usize = 8 * 1024;

static TEXT_MEDIA_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:text|html|json|xml|javascript|css|yaml)\b")
        .expect("text media type pattern is valid")
});

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Read the whole body of a reqwest response.
    pub async fn read(response: Response) -> reqwest::Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }
}

/// Whether every Content-Encoding value is `gzip`.
pub fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    let mut encodings = headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .flat_map(|value| value.to_str().unwrap_or("\u{0}").split(','))
        .map(str::trim)
        .peekable();

    encodings.peek().is_some() && encodings.all(|encoding| encoding.eq_ignore_ascii_case("gzip"))
}

/// Body bytes with gzip content encoding removed. Other encodings pass through.
pub fn decompress(response: &RawResponse) -> Result<Bytes> {
    if !is_gzip_encoded(&response.headers) {
        return Ok(response.body.clone());
    }

    let mut plain = Vec::with_capacity(response.body.len() * 4);
    MultiGzDecoder::new(response.body.as_ref())
        .read_to_end(&mut plain)
        .map_err(FetchError::Decode)?;
    Ok(Bytes::from(plain))
}

/// Media type without parameters, plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentType {
    essence: String,
    params: Vec<(String, String)>,
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn parse_content_type(value: &str) -> Option<ContentType> {
    let mut parts = value.split(';');
    let essence = parts.next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    if !is_token(kind) || !is_token(subtype) {
        return None;
    }

    let mut params = Vec::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, value) = part.split_once('=')?;
        let name = name.trim();
        if !is_token(name) {
            return None;
        }
        let value = value.trim();
        let value = match value.strip_prefix('"') {
            Some(quoted) => quoted.strip_suffix('"')?,
            None => value,
        };
        params.push((name.to_ascii_lowercase(), value.to_string()));
    }

    Some(ContentType {
        essence: essence.to_ascii_lowercase(),
        params,
    })
}

fn content_type(headers: &HeaderMap) -> Option<ContentType> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_type)
}

/// Charset from the Content-Type header.
///
/// Any label known to the WHATWG encoding registry is accepted; an absent,
/// unknown or unparseable value falls back to UTF-8.
pub fn charset(headers: &HeaderMap) -> &'static Encoding {
    content_type(headers)
        .and_then(|ct| {
            ct.params
                .into_iter()
                .find(|(name, _)| name == "charset")
                .and_then(|(_, value)| Encoding::for_label(value.as_bytes()))
        })
        .unwrap_or(UTF_8)
}

/// Whether the Content-Type names a human-readable format.
pub fn is_text(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| TEXT_MEDIA_TYPE.is_match(&ct.essence))
}

/// Parse Retry-After as delta-seconds or an HTTP date relative to `now`.
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    at.with_timezone(&Utc).signed_duration_since(now).to_std().ok()
}

/// One-line (or one-block) description of a response body for error messages.
pub fn render_body(response: &RawResponse) -> String {
    if response.body.is_empty() {
        return "Response body is empty.".to_string();
    }

    let plain = decompress(response).unwrap_or_else(|_| response.body.clone());
    if plain.len() > MAX_RENDERED_BODY {
        format!("Response body of {} bytes.", plain.len())
    } else if is_text(&response.headers) {
        let (content, _) = charset(&response.headers).decode_without_bom_handling(&plain);
        format!("Response body:\n{}\n", content)
    } else {
        format!("Binary response body of {} bytes.", plain.len())
    }
}
