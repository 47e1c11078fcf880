#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

fn id(n: i64) -> ShapeId {
    ShapeId::Persistent(n)
}

// ===== local set =====

#[test]
fn select_reports_changes_only() {
    let mut model = SelectionModel::new();
    assert!(model.select(id(1)));
    assert!(!model.select(id(1)));
    assert!(model.is_selected_locally(id(1)));
}

#[test]
fn deselect_reports_changes_only() {
    let mut model = SelectionModel::new();
    model.select(id(1));
    assert!(model.deselect(id(1)));
    assert!(!model.deselect(id(1)));
    assert!(!model.is_selected_locally(id(1)));
}

#[test]
fn local_ids_are_ordered_and_complete() {
    let mut model = SelectionModel::new();
    model.select(id(7));
    model.select(id(3));
    model.select(id(5));
    assert_eq!(model.local_ids(), vec![id(3), id(5), id(7)]);
}

#[test]
fn clear_local_empties_the_set() {
    let mut model = SelectionModel::new();
    model.select(id(1));
    model.select(id(2));
    assert!(model.clear_local());
    assert!(!model.clear_local());
    assert!(model.local_ids().is_empty());
}

// ===== remote map =====

#[test]
fn remote_selection_replaces_prior_entries() {
    let mut model = SelectionModel::new();
    model.apply_remote_selection("user-1", "#F00", &[id(5), id(7)]);
    model.apply_remote_selection("user-1", "#F00", &[id(9)]);

    assert!(model.remote_for(id(5)).is_none());
    assert!(model.remote_for(id(7)).is_none());
    assert_eq!(model.remote_for(id(9)).map(|r| r.user_id.as_str()), Some("user-1"));
}

#[test]
fn last_claim_on_a_shape_wins() {
    let mut model = SelectionModel::new();
    model.apply_remote_selection("user-1", "#F00", &[id(5)]);
    model.apply_remote_selection("user-2", "#0F0", &[id(5)]);

    let owner = model.remote_for(id(5)).unwrap();
    assert_eq!(owner.user_id, "user-2");
    assert_eq!(owner.color, "#0F0");
    assert_eq!(model.remote_len(), 1);
}

#[test]
fn empty_notification_clears_a_user() {
    let mut model = SelectionModel::new();
    model.apply_remote_selection("user-1", "#F00", &[id(5), id(6)]);
    model.apply_remote_selection("user-1", "#F00", &[]);
    assert_eq!(model.remote_len(), 0);
}

#[test]
fn shape_may_be_local_and_remote_at_once() {
    let mut model = SelectionModel::new();
    model.select(id(5));
    model.apply_remote_selection("user-1", "#F00", &[id(5)]);

    assert!(model.is_selected_locally(id(5)));
    assert!(model.remote_for(id(5)).is_some());
}

// ===== purging =====

#[test]
fn purge_shape_clears_both_sides() {
    let mut model = SelectionModel::new();
    model.select(id(5));
    model.apply_remote_selection("user-1", "#F00", &[id(5)]);

    model.purge_shape(id(5));
    assert!(!model.is_selected_locally(id(5)));
    assert!(model.remote_for(id(5)).is_none());
}

#[test]
fn purge_user_keeps_other_users() {
    let mut model = SelectionModel::new();
    model.apply_remote_selection("user-1", "#F00", &[id(5)]);
    model.apply_remote_selection("user-2", "#0F0", &[id(6)]);

    model.purge_user("user-1");
    assert!(model.remote_for(id(5)).is_none());
    assert!(model.remote_for(id(6)).is_some());
}
