// GitHub REST API fetcher.
// Resolves requests through the memo cache, then the file cache, then the network.

use std::path::PathBuf;
use std::sync::Arc;

use encoding_rs::UTF_8;
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheDigest, CachedPayload, FileCache, MemoCache};
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::http::{Executor, RequestSpec, response};

use super::key::{FetchKey, full_url};

/// Caching, retrying client for JSON resources of the GitHub REST API.
///
/// One instance owns one memoization cache; construct it once per process
/// (or per test) and share it behind an `Arc`.
#[derive(Debug)]
pub struct Fetcher {
    config: FetchConfig,
    executor: Executor,
    file_cache: Option<FileCache>,
    memo: MemoCache<FetchKey, Arc<CachedPayload>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        let executor = Executor::new(client, config.retry)
            .with_label("GitHub REST API request")
            .with_credential_hint("GitHub REST API token")
            .with_default_timeout(config.request_timeout)
            .with_docs_url(config.docs_url.clone());
        let file_cache = config.cache_dir.clone().map(FileCache::new);

        Ok(Self {
            config,
            executor,
            file_cache,
            memo: MemoCache::new(),
        })
    }

    /// Create a fetcher configured from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(FetchConfig::from_env())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Path of the persistent cache file for a request, if caching is enabled.
    pub fn cache_file(&self, api_url: &str, relative_url: &str) -> Option<PathBuf> {
        let cache = self.file_cache.as_ref()?;
        Some(cache.path_for(&CacheDigest::of_url(&full_url(api_url, relative_url))))
    }

    /// Fetch `path` from the configured API URL with the configured token.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        self.fetch(&self.config.api_url, path, self.config.token.as_deref(), cancel)
            .await
    }

    /// Fetch `<host>/<path>` and deserialize the JSON body.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        host: &str,
        path: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T> {
        let payload = self.fetch_payload(host, path, token, cancel).await?;
        Ok(serde_json::from_str(&payload.text())?)
    }

    /// Fetch `<host>/<path>` and return the decoded body text.
    pub async fn fetch_text(
        &self,
        host: &str,
        path: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let payload = self.fetch_payload(host, path, token, cancel).await?;
        Ok(payload.text().into_owned())
    }

    async fn fetch_payload(
        &self,
        host: &str,
        path: &str,
        token: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Arc<CachedPayload>> {
        let key = FetchKey::new(host, path, token);
        if key.token().is_none() && self.config.require_token {
            return Err(FetchError::MissingToken);
        }

        let key_ref = &key;
        self.memo
            .get_or_compute(key_ref, || self.load(key_ref, cancel))
            .await
    }

    async fn load(
        &self,
        key: &FetchKey,
        cancel: Option<&CancellationToken>,
    ) -> Result<Arc<CachedPayload>> {
        let Some(cache) = &self.file_cache else {
            return Ok(Arc::new(self.download(key, cancel).await?));
        };

        let digest = CacheDigest::of_url(&key.url());
        let bytes = cache
            .get_or_create(&digest, || async move {
                let payload = self.download(key, cancel).await?;
                Ok(payload.to_utf8())
            })
            .await?;
        Ok(Arc::new(CachedPayload::new(bytes, UTF_8)))
    }

    async fn download(
        &self,
        key: &FetchKey,
        cancel: Option<&CancellationToken>,
    ) -> Result<CachedPayload> {
        let mut request = RequestSpec::get(&key.url())?
            .header(ACCEPT, "application/json")?
            .header(ACCEPT_LANGUAGE, &self.config.accept_language)?
            .header(ACCEPT_ENCODING, "gzip")?;
        if let Some(token) = key.token() {
            request = request.authorization(self.config.auth_scheme, token)?;
        }

        let raw = self.executor.send(&request, cancel).await?;
        let body = response::decompress(&raw)?;
        let charset = response::charset(&raw.headers);
        debug!(url = %request.url(), bytes = body.len(), charset = charset.name(), "downloaded");
        Ok(CachedPayload::new(body, charset))
    }
}
