//! Per-call fetch memoization
//!
//! Lives for one collection call only. Concurrent requesters of the same
//! key share one in-flight fetch; later requesters get the stored value.

use crate::error::Result;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Coalescing cache keyed by an upstream call signature
pub struct BatchCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<Arc<V>>>>,
    fetches: AtomicUsize,
}

impl<K, V> BatchCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Return the value for `key`, running `fetch` only if no other caller
    /// has produced it. A failed fetch is not stored.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        // The map guard must be released before awaiting
        let cell = Arc::clone(&*self.entries.entry(key).or_default());

        let value = cell
            .get_or_try_init(|| async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                fetch().await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(value))
    }

    /// Stored value for `key`, if a fetch for it has succeeded
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries
            .get(key)
            .and_then(|entry| entry.value().get().cloned())
    }

    /// Number of fetches started
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of distinct keys seen
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for BatchCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
