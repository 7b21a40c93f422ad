// Persistent file cache.
// Maps a URL digest to an immutable file, creating it at most once across processes.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use fs2::FileExt;
use tracing::{debug, trace};

use crate::error::{FetchError, Result};

use super::paths::{CacheDigest, entry_path, lock_path};

/// Directory of `<digest>.json` entries, each guarded by a sibling lock file.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the data file for `digest`, whether or not it exists yet.
    pub fn path_for(&self, digest: &CacheDigest) -> PathBuf {
        entry_path(&self.dir, digest)
    }

    /// Read the entry if it exists, without locking.
    pub async fn get(&self, digest: &CacheDigest) -> Result<Option<Bytes>> {
        read_if_exists(&self.path_for(digest)).await
    }

    /// Return the entry for `digest`, running `create` to produce it if absent.
    ///
    /// Readers never lock. Writers serialize on `<digest>.json.lock`, re-check
    /// for the entry once the lock is held, and publish the data with an atomic
    /// rename from a temp file in the same directory. Errors from `create` are
    /// returned unchanged and leave no entry behind.
    pub async fn get_or_create<F, Fut>(&self, digest: &CacheDigest, create: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let path = self.path_for(digest);
        if let Some(bytes) = read_if_exists(&path).await? {
            trace!(path = %path.display(), "file cache hit");
            return Ok(bytes);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FetchError::cache(&self.dir, e))?;

        let _lock = EntryLock::acquire(lock_path(&self.dir, digest)).await?;

        // Another process may have published the entry while we waited.
        if let Some(bytes) = read_if_exists(&path).await? {
            debug!(path = %path.display(), "file cache entry created by another writer");
            return Ok(bytes);
        }

        let data = create().await?;

        let dir = self.dir.clone();
        let target = path.clone();
        let data = tokio::task::spawn_blocking(move || {
            write_atomic(&dir, &target, &data).map(|_| data)
        })
        .await
        .map_err(|e| FetchError::cache(&path, io::Error::other(e)))?
        .map_err(|e| {
            FetchError::cache(
                &path,
                io::Error::new(e.kind(), format!("failed to create cache file: {}", e)),
            )
        })?;

        debug!(path = %path.display(), bytes = data.len(), "file cache entry written");
        Ok(Bytes::from(data))
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(Bytes::from(bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FetchError::cache(path, e)),
    }
}

/// Write via a temp file in `dir` and rename it onto `path`.
/// The temp file is removed on every failure path.
fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let prefix = path
        .file_name()
        .map(|name| format!("{}-", name.to_string_lossy()))
        .unwrap_or_default();

    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Exclusive advisory lock on an entry's lock file, released on drop.
#[derive(Debug)]
struct EntryLock {
    file: File,
    path: PathBuf,
}

impl EntryLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        let lock_path = path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<Self> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            trace!(path = %lock_path.display(), "waiting for cache lock");
            FileExt::lock_exclusive(&file)?;
            Ok(Self {
                file,
                path: lock_path,
            })
        })
        .await
        .map_err(|e| FetchError::cache(&path, io::Error::other(e)))?
        .map_err(|e| FetchError::cache(&path, e))
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %e, "failed to release cache lock");
        }
    }
}
