//! Shape model: identity, variants, and the geometric capability set.
//!
//! A [`Shape`] is one drawable entity: a variant geometry ([`ShapeKind`]),
//! stroke/fill colors, and a stacking order. Shapes serialize to the wire
//! format directly (`{id, type, geometry, strokeColor, fillColor, zIndex}`),
//! so the types here double as the protocol payload.
//!
//! IDENTITY
//! ========
//! [`ShapeId`] keeps the two ID spaces apart at the type level. Previews
//! carry `Ephemeral` IDs from the session-owned [`EphemeralIds`] counter and
//! exist only inside one client; the store assigns a `Persistent` ID when a
//! shape is finalized, and only persistent IDs serialize — an ephemeral ID
//! reaching the codec is an error, never silent data.

#[cfg(test)]
#[path = "shape_test.rs"]
mod shape_test;

use std::fmt;

use serde::de::{Deserializer, Error as _};
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_FILL, DEFAULT_STROKE, EQUALITY_TOLERANCE, GEOM_EPSILON};
use crate::geom::{Point, distance, orientation, point_segment_distance, triangle_area};
use crate::render::{Paint, Surface};
use crate::selection::RemoteSelection;

/// Identifier for a shape, split into the two ID spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeId {
    /// Preview-only identity from the session-local counter. Never leaves
    /// the process.
    Ephemeral(u64),
    /// Authoritative identity assigned at finalization; the only space that
    /// crosses the wire.
    Persistent(i64),
}

impl ShapeId {
    #[must_use]
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral(_))
    }

    /// The wire representation, if this is a persistent ID.
    #[must_use]
    pub fn as_persistent(self) -> Option<i64> {
        match self {
            Self::Persistent(n) => Some(n),
            Self::Ephemeral(_) => None,
        }
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ephemeral(n) => write!(f, "~{n}"),
            Self::Persistent(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for ShapeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Persistent(n) => serializer.serialize_i64(n),
            Self::Ephemeral(n) => Err(S::Error::custom(format!(
                "ephemeral shape id ~{n} cannot cross the wire"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = i64::deserialize(deserializer)
            .map_err(|e| D::Error::custom(format!("shape id must be an integer: {e}")))?;
        Ok(Self::Persistent(n))
    }
}

/// Allocator for preview identities.
///
/// Owned by one canvas session and discarded with it, so counters from
/// different sessions never mix and a fresh session restarts from zero.
#[derive(Debug, Default)]
pub struct EphemeralIds {
    next: u64,
}

impl EphemeralIds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next preview ID. Monotonically increasing within the
    /// owning session.
    pub fn next_id(&mut self) -> ShapeId {
        self.next += 1;
        ShapeId::Ephemeral(self.next)
    }
}

/// Variant geometry of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "geometry", rename_all = "lowercase")]
pub enum ShapeKind {
    /// Straight segment between two endpoints.
    Line { a: Point, b: Point },
    /// Circle from center and radius.
    Circle { center: Point, radius: f64 },
    /// Triangle over three vertices.
    Triangle { a: Point, b: Point, c: Point },
    /// Axis-aligned rectangle from a corner plus extents. Extents may be
    /// negative while dragging; predicates normalize.
    Rect { origin: Point, width: f64, height: f64 },
}

impl ShapeKind {
    /// The points a local-selection overlay shows handles at.
    #[must_use]
    pub fn defining_points(&self) -> Vec<Point> {
        match *self {
            Self::Line { a, b } => vec![a, b],
            Self::Circle { center, radius } => {
                vec![center, Point::new(center.x + radius, center.y)]
            }
            Self::Triangle { a, b, c } => vec![a, b, c],
            Self::Rect { origin, width, height } => vec![
                origin,
                Point::new(origin.x + width, origin.y),
                Point::new(origin.x + width, origin.y + height),
                Point::new(origin.x, origin.y + height),
            ],
        }
    }

    /// Boundary edges for polygonal variants; empty for circles.
    #[must_use]
    pub fn edges(&self) -> Vec<(Point, Point)> {
        match *self {
            Self::Line { a, b } => vec![(a, b)],
            Self::Circle { .. } => Vec::new(),
            Self::Triangle { a, b, c } => vec![(a, b), (b, c), (c, a)],
            Self::Rect { .. } => {
                let corners = self.defining_points();
                vec![
                    (corners[0], corners[1]),
                    (corners[1], corners[2]),
                    (corners[2], corners[3]),
                    (corners[3], corners[0]),
                ]
            }
        }
    }
}

/// A drawable shape as held by the store and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    /// Identity; ephemeral while previewing, persistent once finalized.
    pub id: ShapeId,
    /// Variant geometry.
    #[serde(flatten)]
    pub kind: ShapeKind,
    /// Outline color; `"transparent"` suppresses the outline.
    pub stroke_color: String,
    /// Interior color; `"transparent"` suppresses the fill.
    pub fill_color: String,
    /// Stacking order; higher values draw on top.
    pub z_index: i64,
}

impl Shape {
    /// New shape with the variant style defaults. Tools restyle it from the
    /// active stroke/fill state at finalize.
    #[must_use]
    pub fn new(id: ShapeId, kind: ShapeKind) -> Self {
        Self {
            id,
            kind,
            stroke_color: DEFAULT_STROKE.to_string(),
            fill_color: DEFAULT_FILL.to_string(),
            z_index: 0,
        }
    }

    /// Same shape with the given colors.
    #[must_use]
    pub fn with_colors(mut self, stroke: impl Into<String>, fill: impl Into<String>) -> Self {
        self.stroke_color = stroke.into();
        self.fill_color = fill.into();
        self
    }

    /// Same shape with the given stacking order.
    #[must_use]
    pub fn with_z_index(mut self, z_index: i64) -> Self {
        self.z_index = z_index;
        self
    }

    /// Deep value copy under a fresh identity. The duplicate shares no
    /// state with the original: geometry, colors, and z-order are copied by
    /// value, so mutating one never shows through the other.
    #[must_use]
    pub fn duplicate(&self, id: ShapeId) -> Self {
        Self { id, ..self.clone() }
    }

    /// Exact containment test for `p`.
    ///
    /// Lines contain only their own points; circles contain their disc;
    /// triangles use the barycentric sign test; rects use normalized
    /// bounds. Degenerate variants (collapsed triangle, zero extents)
    /// degrade to their boundary.
    #[must_use]
    pub fn contains_point(&self, p: Point) -> bool {
        match self.kind {
            ShapeKind::Line { a, b } => point_segment_distance(p, a, b) <= GEOM_EPSILON,
            ShapeKind::Circle { center, radius } => {
                distance(p, center) <= radius.abs() + GEOM_EPSILON
            }
            ShapeKind::Triangle { a, b, c } => {
                if triangle_area(a, b, c) < GEOM_EPSILON {
                    // Collapsed triangle: containment degrades to its edges.
                    return self.boundary_distance(p) <= GEOM_EPSILON;
                }
                let d1 = orientation(a, b, p);
                let d2 = orientation(b, c, p);
                let d3 = orientation(c, a, p);
                let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
                let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
                !(has_neg && has_pos)
            }
            ShapeKind::Rect { origin, width, height } => {
                let x0 = origin.x.min(origin.x + width);
                let x1 = origin.x.max(origin.x + width);
                let y0 = origin.y.min(origin.y + height);
                let y1 = origin.y.max(origin.y + height);
                p.x >= x0 - GEOM_EPSILON
                    && p.x <= x1 + GEOM_EPSILON
                    && p.y >= y0 - GEOM_EPSILON
                    && p.y <= y1 + GEOM_EPSILON
            }
        }
    }

    /// Pick/hover test: true when `p` is inside the shape or within
    /// `tolerance` of its boundary. Looser than [`Self::contains_point`].
    #[must_use]
    pub fn hit_test(&self, p: Point, tolerance: f64) -> bool {
        if self.contains_point(p) {
            return true;
        }
        self.boundary_distance(p) <= tolerance + GEOM_EPSILON
    }

    /// Minimum distance from `p` to this shape's boundary.
    fn boundary_distance(&self, p: Point) -> f64 {
        match self.kind {
            ShapeKind::Circle { center, radius } => (distance(p, center) - radius.abs()).abs(),
            _ => self
                .kind
                .edges()
                .into_iter()
                .map(|(a, b)| point_segment_distance(p, a, b))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Structural equivalence for deduplication. Variant-specific:
    ///
    /// - Lines match when their endpoints match in either order.
    /// - Circles match when centers and radii agree.
    /// - Triangles match when stroke and fill agree, computed areas agree,
    ///   and the two share at least one vertex.
    /// - Rects match when origins and extents agree.
    ///
    /// All comparisons use [`EQUALITY_TOLERANCE`] so shapes still compare
    /// equal after a network round-trip. Identity and z-order never
    /// participate.
    #[must_use]
    pub fn approx_eq(&self, other: &Shape) -> bool {
        const TOL: f64 = EQUALITY_TOLERANCE;
        match (self.kind, other.kind) {
            (ShapeKind::Line { a, b }, ShapeKind::Line { a: oa, b: ob }) => {
                (a.approx_eq(oa, TOL) && b.approx_eq(ob, TOL))
                    || (a.approx_eq(ob, TOL) && b.approx_eq(oa, TOL))
            }
            (
                ShapeKind::Circle { center, radius },
                ShapeKind::Circle { center: oc, radius: onr },
            ) => center.approx_eq(oc, TOL) && (radius - onr).abs() <= TOL,
            (
                ShapeKind::Triangle { a, b, c },
                ShapeKind::Triangle { a: oa, b: ob, c: oc },
            ) => {
                self.stroke_color == other.stroke_color
                    && self.fill_color == other.fill_color
                    && (triangle_area(a, b, c) - triangle_area(oa, ob, oc)).abs() <= TOL
                    && [a, b, c]
                        .iter()
                        .any(|v| [oa, ob, oc].iter().any(|o| v.approx_eq(*o, TOL)))
            }
            (
                ShapeKind::Rect { origin, width, height },
                ShapeKind::Rect { origin: oo, width: ow, height: oh },
            ) => {
                origin.approx_eq(oo, TOL)
                    && (width - ow).abs() <= TOL
                    && (height - oh).abs() <= TOL
            }
            _ => false,
        }
    }

    /// Render this shape onto `surface`.
    ///
    /// Selection precedence: a local selection shows handles at the
    /// defining points; a remote selection shows a dashed outline in the
    /// remote user's color, but only when the shape is *not* also selected
    /// locally.
    pub fn draw(
        &self,
        surface: &mut dyn Surface,
        locally_selected: bool,
        remote: Option<&RemoteSelection>,
    ) {
        let paint = Paint::solid(&self.stroke_color, &self.fill_color);
        self.paint_geometry(surface, &paint);

        if locally_selected {
            for p in self.kind.defining_points() {
                surface.handle(p);
            }
        } else if let Some(remote) = remote {
            let outline = Paint::dashed(&remote.color);
            self.paint_geometry(surface, &outline);
        }
    }

    fn paint_geometry(&self, surface: &mut dyn Surface, paint: &Paint<'_>) {
        match self.kind {
            ShapeKind::Line { a, b } => surface.line(a, b, paint),
            ShapeKind::Circle { center, radius } => surface.circle(center, radius.abs(), paint),
            ShapeKind::Triangle { a, b, c } => surface.polygon(&[a, b, c], paint),
            ShapeKind::Rect { .. } => surface.polygon(&self.kind.defining_points(), paint),
        }
    }
}
