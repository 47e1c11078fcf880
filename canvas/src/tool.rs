//! Tool factories: pointer gestures in, shapes out.
//!
//! One factory per drawing tool, each a small state machine over
//! `handle_mouse_down` / `handle_mouse_move` / `handle_mouse_up`. A factory
//! touches the store in exactly two ways: it upserts the single ephemeral
//! preview for the gesture in progress (one ID per gesture, reused every
//! move), and on completion it inserts exactly one finalized shape, which
//! ends the preview.
//!
//! Single-step tools (line, circle, rect) run press → drag → release.
//! The triangle tool collects a vertex per press and finalizes on the
//! third; it never finalizes on release.
//!
//! [`Toolbox`] owns one factory per tool and forwards pointer events to the
//! active one. Switching tools cancels the in-progress gesture: factory
//! state resets and the preview is removed.

#[cfg(test)]
#[path = "tool_test.rs"]
mod tool_test;

use crate::geom::{Point, distance};
use crate::shape::{EphemeralIds, Shape, ShapeId, ShapeKind};
use crate::store::ShapeStore;

/// Active stroke/fill state, owned by the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleState {
    pub stroke_color: String,
    pub fill_color: String,
}

/// Everything a factory needs to act on a pointer event. `style` may be
/// absent; shapes then keep the variant defaults — degraded, not an error.
pub struct ToolContext<'a> {
    pub store: &'a mut ShapeStore,
    pub ids: &'a mut EphemeralIds,
    pub style: Option<&'a StyleState>,
}

impl ToolContext<'_> {
    fn styled(&self, shape: Shape) -> Shape {
        match self.style {
            Some(s) => shape.with_colors(s.stroke_color.clone(), s.fill_color.clone()),
            None => shape,
        }
    }

    fn preview(&mut self, id: ShapeId, kind: ShapeKind) {
        let shape = self.styled(Shape::new(id, kind));
        self.store.add_shape(shape, true, true);
    }

    fn finalize(&mut self, id: ShapeId, kind: ShapeKind) {
        let shape = self.styled(Shape::new(id, kind));
        self.store.add_shape(shape, false, false);
    }
}

/// The pointer-event contract every drawing tool implements.
pub trait ToolFactory {
    fn handle_mouse_down(&mut self, ctx: &mut ToolContext<'_>, p: Point);
    fn handle_mouse_move(&mut self, ctx: &mut ToolContext<'_>, p: Point);
    fn handle_mouse_up(&mut self, ctx: &mut ToolContext<'_>, p: Point);
    /// Back to the initial step, dropping any partially collected points.
    /// Does not touch the store; the caller removes the preview.
    fn reset_state(&mut self);
}

/// In-progress drag for the single-step tools.
#[derive(Debug, Clone, Copy)]
struct Drag {
    id: ShapeId,
    start: Point,
}

// ── Line ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LineTool {
    drag: Option<Drag>,
}

impl LineTool {
    fn kind(start: Point, current: Point) -> ShapeKind {
        ShapeKind::Line { a: start, b: current }
    }
}

impl ToolFactory for LineTool {
    fn handle_mouse_down(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        let id = ctx.ids.next_id();
        self.drag = Some(Drag { id, start: p });
        ctx.preview(id, Self::kind(p, p));
    }

    fn handle_mouse_move(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(drag) = self.drag {
            ctx.preview(drag.id, Self::kind(drag.start, p));
        }
    }

    fn handle_mouse_up(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(drag) = self.drag.take() {
            ctx.finalize(drag.id, Self::kind(drag.start, p));
        }
    }

    fn reset_state(&mut self) {
        self.drag = None;
    }
}

// ── Circle ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CircleTool {
    drag: Option<Drag>,
}

impl CircleTool {
    fn kind(start: Point, current: Point) -> ShapeKind {
        ShapeKind::Circle { center: start, radius: distance(start, current) }
    }
}

impl ToolFactory for CircleTool {
    fn handle_mouse_down(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        let id = ctx.ids.next_id();
        self.drag = Some(Drag { id, start: p });
        ctx.preview(id, Self::kind(p, p));
    }

    fn handle_mouse_move(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(drag) = self.drag {
            ctx.preview(drag.id, Self::kind(drag.start, p));
        }
    }

    fn handle_mouse_up(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(drag) = self.drag.take() {
            ctx.finalize(drag.id, Self::kind(drag.start, p));
        }
    }

    fn reset_state(&mut self) {
        self.drag = None;
    }
}

// ── Rect ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RectTool {
    drag: Option<Drag>,
}

impl RectTool {
    fn kind(start: Point, current: Point) -> ShapeKind {
        // Extents may go negative while dragging up/left; predicates and
        // renderers normalize.
        ShapeKind::Rect {
            origin: start,
            width: current.x - start.x,
            height: current.y - start.y,
        }
    }
}

impl ToolFactory for RectTool {
    fn handle_mouse_down(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        let id = ctx.ids.next_id();
        self.drag = Some(Drag { id, start: p });
        ctx.preview(id, Self::kind(p, p));
    }

    fn handle_mouse_move(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(drag) = self.drag {
            ctx.preview(drag.id, Self::kind(drag.start, p));
        }
    }

    fn handle_mouse_up(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(drag) = self.drag.take() {
            ctx.finalize(drag.id, Self::kind(drag.start, p));
        }
    }

    fn reset_state(&mut self) {
        self.drag = None;
    }
}

// ── Triangle ────────────────────────────────────────────────────────────────

/// Three-click tool: each press records a vertex, the third finalizes.
#[derive(Debug, Default)]
pub struct TriangleTool {
    id: Option<ShapeId>,
    points: Vec<Point>,
}

impl TriangleTool {
    /// Vertices collected so far in the current gesture; 0 when idle.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.points.len()
    }

    /// Full triangle with the pointer standing in for missing vertices.
    fn padded_kind(&self, cursor: Point) -> ShapeKind {
        let vertex = |i: usize| self.points.get(i).copied().unwrap_or(cursor);
        ShapeKind::Triangle { a: vertex(0), b: vertex(1), c: vertex(2) }
    }
}

impl ToolFactory for TriangleTool {
    fn handle_mouse_down(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        let id = match self.id {
            Some(id) => id,
            None => {
                let id = ctx.ids.next_id();
                self.id = Some(id);
                id
            }
        };
        self.points.push(p);

        if self.points.len() == 3 {
            let kind = self.padded_kind(p);
            self.reset_state();
            ctx.finalize(id, kind);
        } else {
            ctx.preview(id, self.padded_kind(p));
        }
    }

    fn handle_mouse_move(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        if let Some(id) = self.id {
            ctx.preview(id, self.padded_kind(p));
        }
    }

    // Presses drive the triangle; release is not a step.
    fn handle_mouse_up(&mut self, _ctx: &mut ToolContext<'_>, _p: Point) {}

    fn reset_state(&mut self) {
        self.id = None;
        self.points.clear();
    }
}

// ── Toolbox ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Line,
    Circle,
    Triangle,
    Rect,
}

/// Owns one factory per tool and routes pointer events to the active one.
#[derive(Debug, Default)]
pub struct Toolbox {
    line: LineTool,
    circle: CircleTool,
    triangle: TriangleTool,
    rect: RectTool,
    active: ToolKind,
}

impl Toolbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active(&self) -> ToolKind {
        self.active
    }

    /// Switch tools, cancelling any gesture in progress: the outgoing
    /// factory resets and the preview is removed.
    pub fn set_active(&mut self, kind: ToolKind, store: &mut ShapeStore) {
        if kind == self.active {
            return;
        }
        self.active_tool().reset_state();
        store.remove_temporary_shape();
        self.active = kind;
    }

    pub fn handle_mouse_down(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        self.active_tool().handle_mouse_down(ctx, p);
    }

    pub fn handle_mouse_move(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        self.active_tool().handle_mouse_move(ctx, p);
    }

    pub fn handle_mouse_up(&mut self, ctx: &mut ToolContext<'_>, p: Point) {
        self.active_tool().handle_mouse_up(ctx, p);
    }

    /// Step count of the triangle tool's current gesture.
    #[must_use]
    pub fn triangle_steps(&self) -> usize {
        self.triangle.steps()
    }

    fn active_tool(&mut self) -> &mut dyn ToolFactory {
        match self.active {
            ToolKind::Line => &mut self.line,
            ToolKind::Circle => &mut self.circle,
            ToolKind::Triangle => &mut self.triangle,
            ToolKind::Rect => &mut self.rect,
        }
    }
}
