// repofetch: resilient, cached retrieval of JSON resources from the GitHub REST API.
// Requests go through an in-process memo cache, a cross-process file cache and a retrying executor.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod http;

pub use cache::{CacheDigest, CachedPayload, FileCache, MemoCache};
pub use config::FetchConfig;
pub use error::{FetchError, Result};
pub use github::{FetchKey, Fetcher};
pub use http::{AuthScheme, Executor, RequestSpec, RetryDecision, RetryPolicy};
