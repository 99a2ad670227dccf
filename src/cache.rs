//! Bounded LRU cache of polygon records, fronting the store so a hot
//! `FenceByID` lookup skips the deserialization round trip.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::store::LoopRecord;

/// Thin wrapper over [`lru::LruCache`], safe to share across reader
/// threads behind a single mutex. Capacity `0` disables caching
/// entirely — every [`FenceCache::get`] then misses and every
/// [`FenceCache::insert`] is a no-op, which is the simplest way to let
/// callers turn caching off without a separate code path.
pub struct FenceCache {
    inner: Option<Mutex<LruCache<u64, LoopRecord>>>,
}

impl FenceCache {
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner }
    }

    pub fn get(&self, id: u64) -> Option<LoopRecord> {
        self.inner.as_ref()?.lock().get(&id).cloned()
    }

    pub fn insert(&self, id: u64, record: LoopRecord) {
        if let Some(inner) = &self.inner {
            inner.lock().put(id, record);
        }
    }

    /// Current number of cached entries, used by callers that expose
    /// cache occupancy in diagnostics.
    pub fn len(&self) -> usize {
        self.inner.as_ref().map(|c| c.lock().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
