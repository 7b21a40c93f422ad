// In-process memoization cache.
// Deduplicates concurrent and repeated computations for the same key.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;

use crate::error::Result;

/// Unbounded get-or-compute cache.
///
/// Each key owns a cell; the map lock is held only to find or insert the cell,
/// never while computing, so distinct keys proceed in parallel. Callers that
/// arrive while a computation for their key is running wait for it and share
/// its value. A failed computation stores nothing: the next caller for that
/// key (including one already waiting) runs its own attempt.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<V>> {
        Arc::clone(self.slots().entry(key.clone()).or_default())
    }

    /// Value for `key`, running `compute` if no value has been stored yet.
    pub async fn get_or_compute<F, Fut>(&self, key: &K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = self.cell(key);
        cell.get_or_try_init(compute).await.cloned()
    }

    /// Stored value for `key`, if a computation already succeeded.
    pub fn get(&self, key: &K) -> Option<V> {
        self.slots().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Number of keys with a stored value.
    pub fn len(&self) -> usize {
        self.slots().values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
