//! Options accepted at each layer: opening the engine, running a query,
//! and importing a GeoJSON feature collection.

use std::collections::HashMap;

use crate::store::{DEFAULT_COVER_KEYSPACE, DEFAULT_LOOP_KEYSPACE};

/// Controls how [`crate::engine::FenceEngine::open`] opens its store.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Opens the underlying store read-only; all mutating calls then fail
    /// with `ReadOnly`.
    pub read_only: bool,
    /// Capacity of the fence cache; `0` disables it.
    pub cache_size: usize,
    /// Enables verbose per-operation logging at `debug` level, on top of
    /// the `info`-level open/close/store lifecycle logging that's always
    /// on.
    pub debug: bool,
    pub loop_keyspace: String,
    pub cover_keyspace: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            cache_size: 1024,
            debug: false,
            loop_keyspace: DEFAULT_LOOP_KEYSPACE.to_string(),
            cover_keyspace: DEFAULT_COVER_KEYSPACE.to_string(),
        }
    }
}

/// Controls a single [`crate::engine::FenceEngine::stubbing_query`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Returns every containing fence, largest-area first, instead of
    /// just the smallest enclosing one.
    pub multiple_fences: bool,
}

/// Controls a GeoJSON import.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// If non-empty, only these GeoJSON property keys are copied into a
    /// fence's metadata; an empty list means "copy everything".
    pub import_fields: Vec<String>,
    /// Properties to attach to every imported fence regardless of what
    /// the source feature carries, overriding an import field of the
    /// same name.
    pub force_fields: HashMap<String, String>,
    /// Renames a GeoJSON property key to a different metadata key as it
    /// is copied; applied after `import_fields` filtering.
    pub rename_fields: HashMap<String, String>,
    /// Treats the input as a single bare `Feature` (or geometry) rather
    /// than a `FeatureCollection`.
    pub single_feature: bool,
}
