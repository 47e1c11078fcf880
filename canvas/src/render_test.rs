#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;
use crate::shape::{EphemeralIds, Shape, ShapeId, ShapeKind};

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn circle(n: i64, r: f64) -> Shape {
    Shape::new(ShapeId::Persistent(n), ShapeKind::Circle { center: pt(0.0, 0.0), radius: r })
}

fn rect(n: i64) -> Shape {
    Shape::new(
        ShapeId::Persistent(n),
        ShapeKind::Rect { origin: pt(0.0, 0.0), width: 4.0, height: 4.0 },
    )
}

#[derive(Debug, Default)]
struct Recorder {
    ops: Vec<Op>,
}

#[derive(Debug, PartialEq)]
enum Op {
    Line,
    Circle { dashed: bool },
    Polygon { dashed: bool },
    Handle,
}

impl Surface for Recorder {
    fn line(&mut self, _a: Point, _b: Point, _paint: &Paint<'_>) {
        self.ops.push(Op::Line);
    }

    fn circle(&mut self, _center: Point, _radius: f64, paint: &Paint<'_>) {
        self.ops.push(Op::Circle { dashed: paint.dash.is_some() });
    }

    fn polygon(&mut self, _points: &[Point], paint: &Paint<'_>) {
        self.ops.push(Op::Polygon { dashed: paint.dash.is_some() });
    }

    fn handle(&mut self, _at: Point) {
        self.ops.push(Op::Handle);
    }
}

// ===== scene ordering =====

#[test]
fn scene_draws_in_z_order() {
    let mut store = ShapeStore::new();
    store.add_shape(circle(1, 5.0).with_z_index(2), false, true);
    store.add_shape(rect(2).with_z_index(1), false, true);

    let selection = SelectionModel::new();
    let mut surface = Recorder::default();
    render_scene(&store, &selection, &mut surface);

    assert_eq!(
        surface.ops,
        vec![Op::Polygon { dashed: false }, Op::Circle { dashed: false }]
    );
}

#[test]
fn preview_draws_last_and_unadorned() {
    let mut store = ShapeStore::new();
    let mut ids = EphemeralIds::new();
    store.add_shape(rect(1), false, true);

    let preview_id = ids.next_id();
    store.add_shape(circle(0, 3.0).duplicate(preview_id), true, true);

    // Even a selection claiming every shape leaves the preview alone.
    let mut selection = SelectionModel::new();
    selection.select(preview_id);

    let mut surface = Recorder::default();
    render_scene(&store, &selection, &mut surface);

    assert_eq!(
        surface.ops,
        vec![Op::Polygon { dashed: false }, Op::Circle { dashed: false }]
    );
}

// ===== adornments =====

#[test]
fn locally_selected_shapes_get_handles() {
    let mut store = ShapeStore::new();
    store.add_shape(rect(1), false, true);

    let mut selection = SelectionModel::new();
    selection.select(ShapeId::Persistent(1));

    let mut surface = Recorder::default();
    render_scene(&store, &selection, &mut surface);

    let handles = surface.ops.iter().filter(|op| matches!(op, Op::Handle)).count();
    assert_eq!(handles, 4);
}

#[test]
fn remotely_selected_shapes_get_dashed_outline() {
    let mut store = ShapeStore::new();
    store.add_shape(circle(1, 5.0), false, true);

    let mut selection = SelectionModel::new();
    selection.apply_remote_selection("user-2", "#60A5FA", &[ShapeId::Persistent(1)]);

    let mut surface = Recorder::default();
    render_scene(&store, &selection, &mut surface);

    assert_eq!(
        surface.ops,
        vec![Op::Circle { dashed: false }, Op::Circle { dashed: true }]
    );
}

#[test]
fn local_selection_wins_over_remote() {
    let mut store = ShapeStore::new();
    store.add_shape(circle(1, 5.0), false, true);

    let mut selection = SelectionModel::new();
    selection.select(ShapeId::Persistent(1));
    selection.apply_remote_selection("user-2", "#60A5FA", &[ShapeId::Persistent(1)]);

    let mut surface = Recorder::default();
    render_scene(&store, &selection, &mut surface);

    assert!(surface.ops.contains(&Op::Handle));
    assert!(!surface.ops.contains(&Op::Circle { dashed: true }));
}

// ===== paint =====

#[test]
fn dashed_paint_has_no_fill() {
    let paint = Paint::dashed("#123456");
    assert_eq!(paint.fill, TRANSPARENT);
    assert_eq!(paint.dash, Some(SELECTION_DASH));
}
