//! Fence Store: a persistent, ordered key-value store with two
//! keyspaces — one for polygon geometry + metadata, one for its cell
//! cover — addressed by monotone 64-bit polygon IDs.
//!
//! The engine depends on the [`FenceStore`] trait rather than a concrete
//! store type, so an in-memory backend ([`memory::MemoryFenceStore`]) can
//! stand in for the persistent one ([`sled_store::SledFenceStore`]) in
//! tests without touching disk.

mod memory;
mod sled_store;

pub use memory::MemoryFenceStore;
pub use sled_store::{SledFenceStore, DEFAULT_COVER_KEYSPACE, DEFAULT_LOOP_KEYSPACE};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A lat/lng vertex as persisted: 32-bit floats are sufficient precision
/// for polygon boundaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VertexRecord {
    pub lat: f32,
    pub lng: f32,
}

/// The loop-keyspace record: a polygon's vertex ring plus its opaque
/// user metadata. `#[serde(default)]` on every field keeps the format
/// schema-evolvable — a record written by a future version with extra
/// fields still deserializes here, and one written by an older version
/// missing a field added later still deserializes too.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoopRecord {
    #[serde(default)]
    pub points: Vec<VertexRecord>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// The cover-keyspace record: the set of cell IDs approximately covering
/// a polygon.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverRecord {
    #[serde(default)]
    pub cell_ids: Vec<u64>,
}

/// Capability a concrete backend must provide. Modeled as a trait
/// (rather than the engine inheriting a concrete store type) so
/// multiple backends can share one [`crate::engine::FenceEngine`]
/// implementation.
pub trait FenceStore: Send + Sync {
    /// Reads the loop record for `id`, or `None` if absent.
    fn get_loop(&self, id: u64) -> Result<Option<LoopRecord>, StoreError>;

    /// Reads the cover record for `id`, or `None` if absent.
    fn get_cover(&self, id: u64) -> Result<Option<CoverRecord>, StoreError>;

    /// Allocates the next polygon ID and writes both records under it,
    /// atomically with the ID allocation. Fails with
    /// [`StoreError::ReadOnly`] if the store was opened read-only.
    fn put_fence(&self, loop_rec: &LoopRecord, cover_rec: &CoverRecord) -> Result<u64, StoreError>;

    /// Forward scan of the cover keyspace in key (i.e. polygon ID) order,
    /// used to rehydrate the interval index at [`crate::engine::FenceEngine::open`].
    fn scan_covers(&self) -> Result<Vec<(u64, CoverRecord)>, StoreError>;

    /// Whether this store rejects writes.
    fn is_read_only(&self) -> bool;
}

pub(crate) fn encode_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

pub(crate) fn decode_key(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

/// Encodes a record as a field-tagged MessagePack map (`to_vec_named`),
/// not a positional array — a reader must be able to ignore a field it
/// doesn't recognize rather than have every later field silently shift.
pub(crate) fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec_named(value).map_err(|e| StoreError::Corruption(e.to_string()))
}

pub(crate) fn decode_record<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::Corruption(e.to_string()))
}
