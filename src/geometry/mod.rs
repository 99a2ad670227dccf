//! Spherical Geometry Primitives.
//!
//! Point/cell/region primitives (unit-sphere points, hierarchical cell
//! IDs, caps, lat/lng rectangles, the region coverer) come straight from
//! the `s2` crate. What lives here is the glue the rest of the crate
//! needs on top of it: lat/lng <-> `Point` conversions, the minimum
//! acceptable cover level, and — because exact polygon containment is the
//! one piece of geometry this crate cannot simply delegate — the `Loop`
//! type and its [`LoopRegion`] adapter.

mod cover;
mod loop_;
mod region;

pub use cover::{cover_loop, default_coverer, single_cell_coverer, validate_cover, CoverError};
pub use loop_::{Loop, LoopError};
pub use region::LoopRegion;

use s2::cellid::CellID;
use s2::latlng::LatLng;
use s2::point::Point;

/// Finest cell resolution; a lat/lng point's leaf cell is its unique
/// containing cell at this level.
pub const LEAF_LEVEL: u8 = 30;

/// No stored cover may contain a cell coarser (lower-level) than this —
/// a coarser cell suggests the cover degenerated to cover half the globe.
pub const MIN_LEVEL: u8 = 3;

/// Converts a lat/lng pair (degrees) to a point on the unit sphere.
pub fn point_from_degrees(lat: f64, lng: f64) -> Point {
    Point::from(LatLng::from_degrees(lat, lng))
}

/// The leaf (level 30) cell containing the given lat/lng point.
pub fn leaf_cell(lat: f64, lng: f64) -> CellID {
    CellID::from(LatLng::from_degrees(lat, lng))
}

/// Converts a point on the unit sphere back to degrees, as `(lat, lng)`.
pub fn degrees_from_point(p: Point) -> (f64, f64) {
    let ll = LatLng::from(p);
    (ll.lat.deg(), ll.lng.deg())
}
