use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{CoverRecord, FenceStore, LoopRecord};
use crate::error::StoreError;

/// In-memory [`FenceStore`], used in tests that exercise engine and
/// import behavior without paying for `sled`'s disk I/O.
#[derive(Default)]
pub struct MemoryFenceStore {
    records: RwLock<BTreeMap<u64, (LoopRecord, CoverRecord)>>,
    next_id: AtomicU64,
    read_only: bool,
}

impl MemoryFenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store that rejects writes, pre-seeded with `records`
    /// (keyed by polygon ID), mirroring an engine reopened read-only.
    pub fn read_only_with(records: BTreeMap<u64, (LoopRecord, CoverRecord)>) -> Self {
        let next_id = records.keys().next_back().map(|id| id + 1).unwrap_or(0);
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(next_id),
            read_only: true,
        }
    }
}

impl FenceStore for MemoryFenceStore {
    fn get_loop(&self, id: u64) -> Result<Option<LoopRecord>, StoreError> {
        Ok(self.records.read().get(&id).map(|(l, _)| l.clone()))
    }

    fn get_cover(&self, id: u64) -> Result<Option<CoverRecord>, StoreError> {
        Ok(self.records.read().get(&id).map(|(_, c)| c.clone()))
    }

    fn put_fence(&self, loop_rec: &LoopRecord, cover_rec: &CoverRecord) -> Result<u64, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .insert(id, (loop_rec.clone(), cover_rec.clone()));
        Ok(id)
    }

    fn scan_covers(&self) -> Result<Vec<(u64, CoverRecord)>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|(&id, (_, c))| (id, c.clone()))
            .collect())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
