//! # Caches
//!
//! Process-wide memoization of downloaded and decoded artifacts.
//!
//! - Keyed by value, see [`CacheKey`]
//! - Optional LRU bound over finished values, `None` means the cache only grows
//! - At most one in-flight initialization per key, concurrent callers await the first one.
//!   In-flight cells sit outside the LRU, so eviction never splits a key's waiters
//! - Failed initializations leave the slot empty so the next caller retries
use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};

use lru::LruCache;
use tokio::sync::OnceCell;

use crate::storage::FileRef;

/// Identity of a stored file: id, name and content version (checksum or modification time).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
}

impl From<&FileRef> for CacheKey {
    fn from(file: &FileRef) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            version: file.version(),
        }
    }
}

struct Entries<K: Hash + Eq, V> {
    ready: LruCache<K, V>,
    pending: HashMap<K, Arc<OnceCell<V>>>,
}

pub struct MemoCache<K: Hash + Eq, V> {
    entries: Mutex<Entries<K, V>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        let ready = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };

        Self {
            entries: Mutex::new(Entries {
                ready,
                pending: HashMap::new(),
            }),
        }
    }

    /// `0` means unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity))
    }

    fn lock(&self) -> MutexGuard<'_, Entries<K, V>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut entries = self.lock();
            if let Some(value) = entries.ready.get(&key) {
                return Ok(value.clone());
            }
            entries
                .pending
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell.get_or_try_init(init).await.cloned();

        let mut entries = self.lock();
        let owned = entries
            .pending
            .get(&key)
            .is_some_and(|pending| Arc::ptr_eq(pending, &cell));
        match &result {
            Ok(value) if owned => {
                entries.pending.remove(&key);
                entries.ready.put(key, value.clone());
            }
            // Map plus this caller: nobody else is waiting to retry on the empty cell.
            Err(_) if owned && Arc::strong_count(&cell) == 2 => {
                entries.pending.remove(&key);
            }
            _ => {}
        }

        result
    }

    /// Initialized value, if any. Refreshes recency.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().ready.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().ready.contains(key)
    }

    /// Number of finished values.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.ready.clear();
        entries.pending.clear();
    }
}
