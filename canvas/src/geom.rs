//! Geometry kernel: points, distances, and area primitives.
//!
//! Everything here is pure and total. Degenerate inputs (zero-length
//! segments, collapsed triangles) fall back to simpler measurements instead
//! of failing, so the shape predicates built on top never need an error
//! path.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use serde::{Deserialize, Serialize};

/// A point on the canvas in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Componentwise equality within `tolerance`.
    #[must_use]
    pub fn approx_eq(self, other: Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Euclidean distance between two points.
#[must_use]
pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Shortest distance from `p` to the segment `a`–`b`.
///
/// A near-zero-length segment has no usable direction, so it is measured as
/// plain point-to-point distance to `a` instead.
#[must_use]
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < f64::EPSILON {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, Point::new(a.x + t * dx, a.y + t * dy))
}

/// Area of triangle `a b c` via the shoelace formula. Always non-negative.
#[must_use]
pub fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    ((a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y)) / 2.0).abs()
}

/// Signed double-area of `a b c`. The sign encodes the orientation of the
/// turn `a → b → c`; comparing signs against a triangle's three edges is
/// the barycentric containment test used by [`crate::shape`].
#[must_use]
pub fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}
