// Cache path utilities.
// Derives on-disk entry names from URL digests and locates the default cache directory.

use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha512};

/// Get the base cache directory (~/.cache/repofetch on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repofetch").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// SHA-512 of a normalized absolute URL, hex encoded.
///
/// Credentials never take part in the digest, so entry names cannot leak them
/// and an entry is shared by every caller of the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheDigest(String);

impl CacheDigest {
    pub fn of_url(url: &str) -> Self {
        Self(hex::encode(Sha512::digest(url.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the data file for this entry.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }

    /// Name of the lock file guarding creation of this entry.
    pub fn lock_file_name(&self) -> String {
        format!("{}.json.lock", self.0)
    }
}

impl fmt::Display for CacheDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to the data file of an entry.
pub fn entry_path(dir: &Path, digest: &CacheDigest) -> PathBuf {
    dir.join(digest.file_name())
}

/// Path to the lock file of an entry.
pub fn lock_path(dir: &Path, digest: &CacheDigest) -> PathBuf {
    dir.join(digest.lock_file_name())
}
