//! Presentation pass over the store.
//!
//! The engine never paints pixels itself; the embedding UI implements
//! [`Surface`] and [`render_scene`] walks the store in z-order, drawing
//! each shape with its selection adornment and the in-progress preview on
//! top. The pass is deterministic: same store and selection state, same
//! sequence of surface calls.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use crate::consts::{SELECTION_DASH, TRANSPARENT};
use crate::geom::Point;
use crate::selection::SelectionModel;
use crate::store::ShapeStore;

/// Stroke/fill styling for one paint call. `dash` is the dash length for
/// selection outlines; `None` paints solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint<'a> {
    pub stroke: &'a str,
    pub fill: &'a str,
    pub dash: Option<f64>,
}

impl<'a> Paint<'a> {
    #[must_use]
    pub fn solid(stroke: &'a str, fill: &'a str) -> Self {
        Self { stroke, fill, dash: None }
    }

    /// Unfilled dashed outline, as used for remote-selection echoes.
    #[must_use]
    pub fn dashed(stroke: &'a str) -> Self {
        Self { stroke, fill: TRANSPARENT, dash: Some(SELECTION_DASH) }
    }
}

/// Drawing capability the embedding UI provides. The sentinel color
/// `"transparent"` means skip that stroke or fill.
pub trait Surface {
    fn line(&mut self, a: Point, b: Point, paint: &Paint<'_>);
    fn circle(&mut self, center: Point, radius: f64, paint: &Paint<'_>);
    fn polygon(&mut self, points: &[Point], paint: &Paint<'_>);
    /// A selection handle centered at `at`; implementations typically use
    /// [`crate::consts::HANDLE_RADIUS`].
    fn handle(&mut self, at: Point);
}

/// Draw the whole scene: persisted shapes in render order, each with its
/// selection adornment, then the preview (never adorned) on top.
pub fn render_scene(store: &ShapeStore, selection: &SelectionModel, surface: &mut dyn Surface) {
    for shape in store.ordered_shapes() {
        let locally = selection.is_selected_locally(shape.id);
        let remote = selection.remote_for(shape.id);
        shape.draw(surface, locally, remote);
    }
    if let Some(preview) = store.preview() {
        preview.draw(surface, false, None);
    }
}
