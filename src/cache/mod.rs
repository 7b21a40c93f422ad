// Cache module.
// In-process memoization plus a durable, lock-guarded file cache shared across processes.

pub mod memo;
pub mod paths;
pub mod payload;
pub mod store;

pub use memo::MemoCache;
pub use paths::{CacheDigest, default_cache_dir};
pub use payload::CachedPayload;
pub use store::FileCache;
