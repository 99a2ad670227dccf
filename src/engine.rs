//! Fence Engine: the orchestrator tying the interval index, the store
//! and the cache together behind the query protocol.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use s2::cap::Cap;
use s2::cellid::CellID;
use s2::rect::Rect;
use s2::region::{Region, RegionCoverer};
use s2::s1::angle::{Angle, Rad};

use crate::config::{EngineOptions, QueryOptions};
use crate::error::EngineError;
use crate::cache::FenceCache;
use crate::geometry::{cover_loop, default_coverer, degrees_from_point, leaf_cell, point_from_degrees, single_cell_coverer, Loop};
use crate::interval_tree::CellIntervalIndex;
use crate::store::{FenceStore, LoopRecord, SledFenceStore, VertexRecord};

/// Mean Earth circumference in meters, used by the radius-query cap-area
/// approximation.
const EARTH_CIRCUMFERENCE_METERS: f64 = 40_075_017.0;

/// A materialized polygon: its loop and whatever metadata was attached
/// at import time.
#[derive(Debug, Clone)]
pub struct Fence {
    pub id: u64,
    pub loop_: Loop,
    pub data: BTreeMap<String, String>,
}

fn loop_record_from(loop_: &Loop, data: BTreeMap<String, String>) -> LoopRecord {
    LoopRecord {
        points: loop_
            .vertices()
            .iter()
            .map(|&p| {
                let (lat, lng) = degrees_from_point(p);
                VertexRecord {
                    lat: lat as f32,
                    lng: lng as f32,
                }
            })
            .collect(),
        data,
    }
}

fn fence_from_record(id: u64, rec: &LoopRecord) -> Option<Fence> {
    let points = rec
        .points
        .iter()
        .map(|v| point_from_degrees(v.lat as f64, v.lng as f64))
        .collect();
    match Loop::from_points(points) {
        Ok(loop_) => Some(Fence {
            id,
            loop_,
            data: rec.data.clone(),
        }),
        Err(err) => {
            log::warn!("fence {id} has a corrupt loop record: {err}");
            None
        }
    }
}

/// Cache hit/miss counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct FenceEngine {
    store: Box<dyn FenceStore>,
    tree: RwLock<CellIntervalIndex>,
    cache: FenceCache,
    options: EngineOptions,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl FenceEngine {
    /// Opens a persistent, `sled`-backed engine at `path`.
    pub fn open(path: impl AsRef<Path>, options: EngineOptions) -> Result<Self, EngineError> {
        let store = SledFenceStore::open_with_keyspaces(
            path,
            options.read_only,
            &options.loop_keyspace,
            &options.cover_keyspace,
        )?;
        Self::open_with_store(Box::new(store), options)
    }

    /// Opens an engine over any [`FenceStore`] implementation — the entry
    /// point tests use with [`crate::store::MemoryFenceStore`].
    pub fn open_with_store(store: Box<dyn FenceStore>, options: EngineOptions) -> Result<Self, EngineError> {
        if options.debug {
            log::set_max_level(log::LevelFilter::Debug);
        }

        let mut tree = CellIntervalIndex::new();
        let covers = store.scan_covers()?;
        let loaded = covers.len();
        for (id, cover) in covers {
            for &raw in &cover.cell_ids {
                tree.insert(CellID(raw), id);
            }
        }
        log::info!("rehydrated {loaded} fences from store");

        Ok(Self {
            store,
            tree: RwLock::new(tree),
            cache: FenceCache::new(options.cache_size),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            options,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    /// Per-open cache hit/miss counters, refreshed on every
    /// [`Self::fence_by_id`]-driven load.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.cache_hits.load(Ordering::Relaxed),
            misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    fn load_fence(&self, id: u64) -> Option<Fence> {
        if let Some(rec) = self.cache.get(id) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return fence_from_record(id, &rec);
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        match self.store.get_loop(id) {
            Ok(Some(rec)) => {
                let fence = fence_from_record(id, &rec);
                if fence.is_some() {
                    self.cache.insert(id, rec);
                }
                fence
            }
            Ok(None) => None,
            Err(err) => {
                log::warn!("fence {id} failed to load: {err}");
                None
            }
        }
    }

    /// Inserts a polygon, covering it with the default coverer and
    /// writing both store entries plus the in-memory interval tree
    /// update atomically against the store write.
    pub fn store_fence(&self, loop_: &Loop, data: BTreeMap<String, String>) -> Result<u64, EngineError> {
        if self.options.read_only {
            return Err(EngineError::ReadOnly);
        }
        let cover = cover_loop(loop_, &default_coverer());
        let cell_ids: Vec<u64> = cover.0.iter().map(|c| c.0).collect();

        let loop_rec = loop_record_from(loop_, data);
        let cover_rec = crate::store::CoverRecord {
            cell_ids: cell_ids.clone(),
        };

        let id = self.store.put_fence(&loop_rec, &cover_rec)?;

        let mut tree = self.tree.write();
        for raw in &cell_ids {
            tree.insert(CellID(*raw), id);
        }
        drop(tree);

        log::debug!("stored fence {id} with {} cover cells", cell_ids.len());
        Ok(id)
    }

    /// Cache-first read of a polygon by ID.
    pub fn fence_by_id(&self, id: u64) -> Option<Fence> {
        self.load_fence(id)
    }

    /// Point-in-polygon query, returning either the single smallest
    /// enclosing polygon or, with `opts.multiple_fences`, every
    /// enclosing polygon largest-first.
    pub fn stubbing_query(&self, lat: f64, lng: f64, opts: QueryOptions) -> Vec<Fence> {
        let cell = leaf_cell(lat, lng);
        let candidates: Vec<u64> = {
            let tree = self.tree.read();
            let mut ids = Vec::new();
            for entry in tree.query_point(cell) {
                for &id in &entry.polygon_ids {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            ids
        };

        let point = point_from_degrees(lat, lng);
        let mut matches: Vec<Fence> = candidates
            .into_iter()
            .filter_map(|id| self.load_fence(id))
            .filter(|fence| fence.loop_.contains_point(point))
            .collect();

        if opts.multiple_fences {
            matches.sort_by(|a, b| {
                rect_area(&b.loop_.rect_bound())
                    .partial_cmp(&rect_area(&a.loop_.rect_bound()))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            return matches;
        }

        // Asymmetric nesting tie-break: B wins unless F's first vertex
        // falls inside B, in which case F is the more deeply nested match.
        let mut best: Option<Fence> = None;
        for candidate in matches {
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    if current.loop_.contains_point(candidate.loop_.vertex(0)) {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.into_iter().collect()
    }

    /// Rectangle window query. Covers the rectangle with exactly one
    /// cell; fails with [`EngineError::ImpossibleCovering`] if that
    /// doesn't resolve. Retains a candidate iff the window rectangle
    /// fully contains the candidate's rectangular bound — containment,
    /// not intersection, preserved from the historical behavior this
    /// engine is modeled on.
    pub fn rect_query(&self, ur_lat: f64, ur_lng: f64, bl_lat: f64, bl_lng: f64) -> Result<Vec<Fence>, EngineError> {
        let window = Rect::from_degrees(bl_lat, bl_lng, ur_lat, ur_lng);
        let cover = single_cell_coverer().covering(&window);
        if cover.0.len() != 1 {
            return Err(EngineError::ImpossibleCovering);
        }
        let cell = cover.0[0];

        let candidates: Vec<u64> = {
            let tree = self.tree.read();
            let mut ids = Vec::new();
            for entry in tree.query_point(cell) {
                for &id in &entry.polygon_ids {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            ids
        };

        Ok(candidates
            .into_iter()
            .filter_map(|id| self.load_fence(id))
            .filter(|fence| window.contains(&fence.loop_.rect_bound()))
            .collect())
    }

    /// Radius query around a point. Coarse filter only: every fence
    /// whose cover intersects the query cap is returned, with no exact
    /// spherical intersection refinement.
    pub fn radius_query(&self, lat: f64, lng: f64, radius_meters: f64) -> Vec<Fence> {
        let center = point_from_degrees(lat, lng);
        let r = 2.0 * std::f64::consts::PI * radius_meters / EARTH_CIRCUMFERENCE_METERS;
        let cap = Cap::from_center_angle(&center, &Angle::from(Rad(r)));

        let coverer = default_coverer();
        let cover = coverer.covering(&cap);

        let candidates: Vec<u64> = {
            let tree = self.tree.read();
            let mut ids = Vec::new();
            for &cell in &cover.0 {
                for entry in tree.query_point(cell) {
                    for &id in &entry.polygon_ids {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
            }
            ids
        };

        candidates.into_iter().filter_map(|id| self.load_fence(id)).collect()
    }
}

fn rect_area(rect: &Rect) -> f64 {
    let lat_span = (rect.lat.hi - rect.lat.lo).max(0.0);
    let lng_span = (rect.lng.hi - rect.lng.lo).max(0.0);
    lat_span * lng_span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point_from_degrees;
    use crate::store::MemoryFenceStore;

    fn square(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Loop {
        Loop::from_points(vec![
            point_from_degrees(min_lat, min_lng),
            point_from_degrees(min_lat, max_lng),
            point_from_degrees(max_lat, max_lng),
            point_from_degrees(max_lat, min_lng),
        ])
        .unwrap()
    }

    fn engine() -> FenceEngine {
        FenceEngine::open_with_store(Box::new(MemoryFenceStore::new()), EngineOptions::default()).unwrap()
    }

    #[test]
    fn stores_and_retrieves_by_id() {
        let engine = engine();
        let loop_ = square(48.80, 2.25, 48.90, 2.43);
        let id = engine.store_fence(&loop_, BTreeMap::new()).unwrap();
        assert!(engine.fence_by_id(id).is_some());
        assert!(engine.fence_by_id(id + 1).is_none());
    }

    #[test]
    fn stubbing_query_finds_innermost_nested_polygon() {
        let engine = engine();
        let mut bigoutter = BTreeMap::new();
        bigoutter.insert("name".to_string(), "bigoutter".to_string());
        let mut outter = BTreeMap::new();
        outter.insert("name".to_string(), "outter".to_string());
        let mut inner = BTreeMap::new();
        inner.insert("name".to_string(), "inner".to_string());

        engine
            .store_fence(&square(48.70, 2.10, 49.00, 2.55), bigoutter)
            .unwrap();
        engine
            .store_fence(&square(48.80, 2.20, 48.92, 2.46), outter)
            .unwrap();
        engine
            .store_fence(&square(48.83, 2.27, 48.88, 2.37), inner)
            .unwrap();

        let hits = engine.stubbing_query(48.85206549830757, 2.3064422607421875, QueryOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].data.get("name").map(String::as_str), Some("inner"));
    }

    #[test]
    fn stubbing_query_multiple_fences_orders_largest_first() {
        let engine = engine();
        let mut bigoutter = BTreeMap::new();
        bigoutter.insert("name".to_string(), "bigoutter".to_string());
        let mut outter = BTreeMap::new();
        outter.insert("name".to_string(), "outter".to_string());
        let mut inner = BTreeMap::new();
        inner.insert("name".to_string(), "inner".to_string());

        engine
            .store_fence(&square(48.70, 2.10, 49.00, 2.55), bigoutter)
            .unwrap();
        engine
            .store_fence(&square(48.80, 2.20, 48.92, 2.46), outter)
            .unwrap();
        engine
            .store_fence(&square(48.83, 2.27, 48.88, 2.37), inner)
            .unwrap();

        let hits = engine.stubbing_query(
            48.85206549830757,
            2.3064422607421875,
            QueryOptions { multiple_fences: true },
        );
        let names: Vec<_> = hits.iter().map(|f| f.data["name"].clone()).collect();
        assert_eq!(names, vec!["bigoutter", "outter", "inner"]);
    }

    #[test]
    fn stubbing_query_empty_multiple_fences_is_empty_not_missing() {
        let engine = engine();
        let hits = engine.stubbing_query(0.0, 0.0, QueryOptions { multiple_fences: true });
        assert!(hits.is_empty());
    }

    #[test]
    fn rect_query_requires_full_containment_of_bound() {
        let engine = engine();
        let loop_ = square(48.80, 2.25, 48.90, 2.43);
        engine.store_fence(&loop_, BTreeMap::new()).unwrap();

        let contained = engine.rect_query(49.0, 2.5, 48.7, 2.1).unwrap();
        assert_eq!(contained.len(), 1);

        let too_small = engine.rect_query(48.85, 2.30, 48.81, 2.26).unwrap();
        assert!(too_small.is_empty());
    }

    #[test]
    fn radius_query_is_coarse_but_finds_nearby_fence() {
        let engine = engine();
        let loop_ = square(48.80, 2.25, 48.90, 2.43);
        engine.store_fence(&loop_, BTreeMap::new()).unwrap();

        let hits = engine.radius_query(48.85, 2.34, 50_000.0);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn read_only_engine_rejects_store_fence() {
        let store = MemoryFenceStore::read_only_with(Default::default());
        let engine = FenceEngine::open_with_store(
            Box::new(store),
            EngineOptions { read_only: true, ..Default::default() },
        )
        .unwrap();
        let loop_ = square(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(engine.store_fence(&loop_, BTreeMap::new()), Err(EngineError::ReadOnly)));
    }
}
