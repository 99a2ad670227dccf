use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use sled::transaction::Transactional;
use sled::{Db, Tree};

use super::{decode_key, decode_record, encode_key, encode_record, CoverRecord, FenceStore, LoopRecord};
use crate::error::StoreError;

/// Default names for the two keyspaces, overridable at open time so a
/// caller can keep several independently-versioned fence sets inside
/// one `sled` database.
pub const DEFAULT_LOOP_KEYSPACE: &str = "loop";
pub const DEFAULT_COVER_KEYSPACE: &str = "cover";

/// Persistent [`FenceStore`] backed by `sled`, an embedded ordered
/// key-value store (the Rust analogue of BoltDB).
pub struct SledFenceStore {
    loops: Tree,
    covers: Tree,
    next_id: AtomicU64,
    read_only: bool,
    // Keeps the database handle (and its background flush thread) alive
    // for as long as the store is.
    _db: Db,
}

impl SledFenceStore {
    /// Opens (creating if absent) a `sled` database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self, StoreError> {
        Self::open_with_keyspaces(path, read_only, DEFAULT_LOOP_KEYSPACE, DEFAULT_COVER_KEYSPACE)
    }

    /// Opens with explicit keyspace names.
    pub fn open_with_keyspaces<P: AsRef<Path>>(
        path: P,
        read_only: bool,
        loop_keyspace: &str,
        cover_keyspace: &str,
    ) -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .path(path)
            .read_only(read_only)
            .open()?;
        let loops = db.open_tree(loop_keyspace)?;
        let covers = db.open_tree(cover_keyspace)?;

        let next_id = covers
            .iter()
            .keys()
            .last()
            .transpose()?
            .map(|k| decode_key(&k) + 1)
            .unwrap_or(0);

        Ok(Self {
            loops,
            covers,
            next_id: AtomicU64::new(next_id),
            read_only,
            _db: db,
        })
    }
}

impl FenceStore for SledFenceStore {
    fn get_loop(&self, id: u64) -> Result<Option<LoopRecord>, StoreError> {
        match self.loops.get(encode_key(id))? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_cover(&self, id: u64) -> Result<Option<CoverRecord>, StoreError> {
        match self.covers.get(encode_key(id))? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_fence(&self, loop_rec: &LoopRecord, cover_rec: &CoverRecord) -> Result<u64, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let key = encode_key(id);
        let loop_bytes = encode_record(loop_rec)?;
        let cover_bytes = encode_record(cover_rec)?;

        // Both keyspaces must land together: a crash between two
        // independent inserts would orphan a loop record with no cover
        // (or vice versa), wasting this ID in the rehydrated tree.
        (&self.loops, &self.covers)
            .transaction(|(loops, covers)| {
                loops.insert(&key, loop_bytes.clone())?;
                covers.insert(&key, cover_bytes.clone())?;
                Ok(())
            })
            .map_err(|err| StoreError::Io(err.to_string()))?;

        // sled batches writes internally; an explicit flush keeps the
        // committed transaction durable rather than racing the
        // background flusher.
        self.loops.flush()?;

        Ok(id)
    }

    fn scan_covers(&self) -> Result<Vec<(u64, CoverRecord)>, StoreError> {
        let mut out = Vec::new();
        for entry in self.covers.iter() {
            let (key, value) = entry?;
            out.push((decode_key(&key), decode_record(&value)?));
        }
        Ok(out)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (LoopRecord, CoverRecord) {
        (
            LoopRecord {
                points: vec![super::VertexRecord { lat: 48.85, lng: 2.30 }],
                data: Default::default(),
            },
            CoverRecord { cell_ids: vec![42] },
        )
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledFenceStore::open(dir.path(), false).unwrap();
        let (loop_rec, cover_rec) = sample();
        let id = store.put_fence(&loop_rec, &cover_rec).unwrap();
        assert_eq!(store.get_loop(id).unwrap(), Some(loop_rec));
        assert_eq!(store.get_cover(id).unwrap(), Some(cover_rec));
    }

    #[test]
    fn ids_are_monotone_and_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (loop_rec, cover_rec) = sample();
        {
            let store = SledFenceStore::open(dir.path(), false).unwrap();
            let first = store.put_fence(&loop_rec, &cover_rec).unwrap();
            let second = store.put_fence(&loop_rec, &cover_rec).unwrap();
            assert_eq!(first, 0);
            assert_eq!(second, 1);
        }
        let store = SledFenceStore::open(dir.path(), false).unwrap();
        let third = store.put_fence(&loop_rec, &cover_rec).unwrap();
        assert_eq!(third, 2);
        assert_eq!(store.scan_covers().unwrap().len(), 3);
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledFenceStore::open(dir.path(), false).unwrap();
            let (loop_rec, cover_rec) = sample();
            store.put_fence(&loop_rec, &cover_rec).unwrap();
        }
        let store = SledFenceStore::open(dir.path(), true).unwrap();
        let (loop_rec, cover_rec) = sample();
        assert!(matches!(
            store.put_fence(&loop_rec, &cover_rec),
            Err(StoreError::ReadOnly)
        ));
        assert_eq!(store.scan_covers().unwrap().len(), 1);
    }

    #[test]
    fn missing_id_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledFenceStore::open(dir.path(), false).unwrap();
        assert_eq!(store.get_loop(999).unwrap(), None);
    }
}
