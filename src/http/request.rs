// Request descriptor for the executor.
// Holds method, URL, headers and an optional per-request timeout.

use std::time::Duration;

use reqwest::{
    Client, Method, RequestBuilder, Url,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};

use crate::error::{FetchError, Result};

/// How a token is presented in the Authorization header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    #[default]
    Bearer,
    /// Legacy `Authorization: token <token>`
    Token,
}

impl AuthScheme {
    pub fn header_value(&self, token: &str) -> String {
        match self {
            AuthScheme::Bearer => format!("Bearer {}", token),
            AuthScheme::Token => format!("token {}", token),
        }
    }
}

/// One logical HTTP request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| FetchError::InvalidRequest(format!("invalid URL {}: {}", url, e)))?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::InvalidRequest(format!("invalid {} header: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Attach credentials. The header value is marked sensitive.
    pub fn authorization(mut self, scheme: AuthScheme, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&scheme.header_value(token)).map_err(|_| {
            FetchError::InvalidRequest("token contains characters not allowed in a header".into())
        })?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Caller-provided timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Idempotent methods are safe to send more than once.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET
                | Method::HEAD
                | Method::PUT
                | Method::DELETE
                | Method::OPTIONS
                | Method::TRACE
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }

    pub(crate) fn build(&self, client: &Client, default_timeout: Duration) -> RequestBuilder {
        client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout.unwrap_or(default_timeout))
    }
}
