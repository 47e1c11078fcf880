//! Shared numeric constants and style defaults for the canvas crate.

// ── Tolerances ──────────────────────────────────────────────────

/// Tolerance for structural shape equality: coordinates, radii, and
/// computed areas are compared within this band so shapes survive a JSON
/// round-trip over the network and still compare equal.
pub const EQUALITY_TOLERANCE: f64 = 0.001;

/// Absolute slack added to boundary comparisons so a point computed *onto*
/// a boundary still registers despite floating-point rounding.
pub const GEOM_EPSILON: f64 = 1e-9;

/// Default pick/hover slop in world units for `hit_test`.
pub const PICK_TOLERANCE: f64 = 5.0;

// ── Styling ─────────────────────────────────────────────────────

/// Sentinel color meaning "do not paint".
pub const TRANSPARENT: &str = "transparent";

/// Stroke color a shape is born with when no active style is available.
pub const DEFAULT_STROKE: &str = "#1F1A17";

/// Fill color a shape is born with when no active style is available.
pub const DEFAULT_FILL: &str = "transparent";

// ── Selection rendering ─────────────────────────────────────────

/// Radius of a local-selection handle marker, in world units.
pub const HANDLE_RADIUS: f64 = 4.0;

/// Dash segment length for remote-selection outlines, in world units.
pub const SELECTION_DASH: f64 = 4.0;
