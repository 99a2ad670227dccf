//! Import Pipeline: turns GeoJSON features into stored fences.
//!
//! Ring selection, orientation, and cover rejection follow the same
//! order the original importer used: exterior ring only, reorient to
//! counter-clockwise, drop the GeoJSON closing vertex, cover, then
//! reject anything whose cover degenerates to a near-global cell.

use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, PointType, Value};

use crate::config::ImportOptions;
use crate::engine::FenceEngine;
use crate::error::ImportError;
use crate::geometry::{cover_loop, default_coverer, point_from_degrees, validate_cover, Loop};

/// Outcome of importing a feature collection: which polygon IDs were
/// stored, and how many features were skipped along the way.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub stored: Vec<u64>,
    pub skipped: usize,
}

/// Parses `text` as GeoJSON and imports it. `opts.single_feature` picks
/// which of the two code paths below applies: a bare `Feature` document,
/// or a `FeatureCollection`.
pub fn import_geojson(engine: &FenceEngine, text: &str, opts: &ImportOptions) -> Result<ImportReport, ImportError> {
    if opts.single_feature {
        let feature: Feature = text
            .parse()
            .map_err(|err: geojson::Error| ImportError::UnknownGeometry(err.to_string()))?;
        let mut report = ImportReport::default();
        import_feature(engine, &feature, opts, &mut report)?;
        return Ok(report);
    }

    let collection: FeatureCollection = text
        .parse()
        .map_err(|err: geojson::Error| ImportError::UnknownGeometry(err.to_string()))?;
    import_collection(engine, &collection, opts)
}

/// Imports every feature in `collection`. `UnknownGeometry` and
/// `InvalidCover` are logged and skipped feature-by-feature; engine-level
/// failures (`ReadOnly`, I/O) abort the whole import.
pub fn import_collection(engine: &FenceEngine, collection: &FeatureCollection, opts: &ImportOptions) -> Result<ImportReport, ImportError> {
    let mut report = ImportReport::default();
    for feature in &collection.features {
        match import_feature(engine, feature, opts, &mut report) {
            Ok(()) => {}
            Err(ImportError::UnknownGeometry(msg)) => {
                log::warn!("skipping feature: unknown geometry: {msg}");
                report.skipped += 1;
            }
            Err(ImportError::InvalidCover(msg)) => {
                log::warn!("skipping feature: invalid cover: {msg}");
                report.skipped += 1;
            }
            Err(err @ ImportError::Engine(_)) => return Err(err),
        }
    }
    Ok(report)
}

/// Imports a single bare `Feature` (the `featureImport` config path),
/// storing one polygon per ring the feature's geometry yields (more than
/// one for a `MultiPolygon`). Each ring's ID is pushed into `report` as
/// soon as it's stored, so a later ring's failure never discards an
/// earlier ring's already-persisted ID. The returned `Err`, if any,
/// reports only the ring that failed, not the whole feature's outcome.
pub fn import_feature(
    engine: &FenceEngine,
    feature: &Feature,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    let rings = exterior_rings(feature)?;
    let data = extract_properties(feature.properties.as_ref(), opts);

    for ring in rings {
        let loop_ = build_loop(ring)?;
        let cover = cover_loop(&loop_, &default_coverer());
        validate_cover(&cover.0).map_err(|err| ImportError::InvalidCover(err.to_string()))?;
        let id = engine.store_fence(&loop_, data.clone())?;
        report.stored.push(id);
    }
    Ok(())
}

fn exterior_rings(feature: &Feature) -> Result<Vec<Vec<PointType>>, ImportError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| ImportError::UnknownGeometry("feature has no geometry".to_string()))?;

    match &geometry.value {
        Value::Polygon(rings) => {
            let exterior = rings
                .first()
                .ok_or_else(|| ImportError::UnknownGeometry("polygon has no rings".to_string()))?;
            Ok(vec![exterior.clone()])
        }
        Value::MultiPolygon(polygons) => Ok(polygons
            .iter()
            .filter_map(|rings| rings.first().cloned())
            .collect()),
        other => Err(ImportError::UnknownGeometry(format!("{other:?}"))),
    }
}

/// Reorients `ring` counter-clockwise when the shoelace sum indicates
/// clockwise or degenerate winding, then drops the GeoJSON closing
/// vertex (first == last).
fn orient_ccw(ring: Vec<PointType>) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = ring.iter().map(|p| (p[0], p[1])).collect();

    let mut signed_area = 0.0;
    for i in 0..pts.len().saturating_sub(1) {
        let (x1, y1) = pts[i];
        let (x2, y2) = pts[i + 1];
        signed_area += (x2 - x1) * (y2 + y1);
    }
    if signed_area >= 0.0 {
        pts.reverse();
    }
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

fn build_loop(ring: Vec<PointType>) -> Result<Loop, ImportError> {
    let pts = orient_ccw(ring);
    let points = pts.into_iter().map(|(lng, lat)| point_from_degrees(lat, lng)).collect();
    Loop::from_points(points).map_err(|err| ImportError::InvalidCover(err.to_string()))
}

fn json_value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn extract_properties(properties: Option<&JsonObject>, opts: &ImportOptions) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    if let Some(props) = properties {
        for (key, value) in props {
            if !opts.import_fields.is_empty() && !opts.import_fields.contains(key) {
                continue;
            }
            let out_key = opts.rename_fields.get(key).cloned().unwrap_or_else(|| key.clone());
            data.insert(out_key, json_value_to_string(value));
        }
    }
    for (key, value) in &opts.force_fields {
        data.insert(key.clone(), value.clone());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use crate::store::MemoryFenceStore;

    fn engine() -> FenceEngine {
        FenceEngine::open_with_store(Box::new(MemoryFenceStore::new()), EngineOptions::default()).unwrap()
    }

    const PARIS_COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "bigoutter"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [2.10, 48.70], [2.55, 48.70], [2.55, 49.00], [2.10, 49.00], [2.10, 48.70]
                ]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "outter"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [2.20, 48.80], [2.46, 48.80], [2.46, 48.92], [2.20, 48.92], [2.20, 48.80]
                ]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "inner"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [2.27, 48.83], [2.37, 48.83], [2.37, 48.88], [2.27, 48.88], [2.27, 48.83]
                ]]}
            }
        ]
    }"#;

    #[test]
    fn imports_collection_and_stores_every_feature() {
        let engine = engine();
        let report = import_geojson(&engine, PARIS_COLLECTION, &ImportOptions::default()).unwrap();
        assert_eq!(report.stored.len(), 3);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn import_fields_filters_properties() {
        let engine = engine();
        let opts = ImportOptions {
            import_fields: vec!["missing".to_string()],
            ..Default::default()
        };
        let report = import_geojson(&engine, PARIS_COLLECTION, &opts).unwrap();
        let fence = engine.fence_by_id(report.stored[0]).unwrap();
        assert!(fence.data.is_empty());
    }

    #[test]
    fn force_fields_override_import() {
        let engine = engine();
        let mut force = std::collections::HashMap::new();
        force.insert("country".to_string(), "FR".to_string());
        let opts = ImportOptions {
            force_fields: force,
            ..Default::default()
        };
        let report = import_geojson(&engine, PARIS_COLLECTION, &opts).unwrap();
        let fence = engine.fence_by_id(report.stored[0]).unwrap();
        assert_eq!(fence.data.get("country").map(String::as_str), Some("FR"));
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let engine = engine();
        let point_feature: &str = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [2.3, 48.8]}
        }"#;
        let opts = ImportOptions { single_feature: true, ..Default::default() };
        let result = import_geojson(&engine, point_feature, &opts);
        assert!(matches!(result, Err(ImportError::UnknownGeometry(_))));
    }

    #[test]
    fn multi_polygon_keeps_earlier_stored_rings_when_a_later_ring_fails() {
        let engine = engine();
        let multi_polygon = r#"{
            "type": "Feature",
            "properties": {"name": "split"},
            "geometry": {"type": "MultiPolygon", "coordinates": [
                [[
                    [2.10, 48.70], [2.55, 48.70], [2.55, 49.00], [2.10, 49.00], [2.10, 48.70]
                ]],
                [[
                    [3.00, 48.70], [3.50, 48.90], [3.00, 48.70]
                ]]
            ]}
        }"#;
        let feature: Feature = multi_polygon.parse().unwrap();
        let mut report = ImportReport::default();
        let result = import_feature(&engine, &feature, &ImportOptions::default(), &mut report);

        assert!(matches!(result, Err(ImportError::InvalidCover(_))));
        assert_eq!(report.stored.len(), 1);
        assert!(engine.fence_by_id(report.stored[0]).is_some());
    }

    #[test]
    fn clockwise_ring_is_normalized_and_still_imports() {
        let engine = engine();
        let clockwise = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "cw"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [2.10, 48.70], [2.10, 49.00], [2.55, 49.00], [2.55, 48.70], [2.10, 48.70]
                ]]}
            }]
        }"#;
        let report = import_geojson(&engine, clockwise, &ImportOptions::default()).unwrap();
        assert_eq!(report.stored.len(), 1);
        let fence = engine.fence_by_id(report.stored[0]).unwrap();
        assert!(fence.loop_.contains_point(point_from_degrees(48.85, 2.30)));
    }
}
