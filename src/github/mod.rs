// GitHub API module.
// The caching fetcher and the normalized request key it is built around.

pub mod client;
pub mod key;

pub use client::Fetcher;
pub use key::FetchKey;
