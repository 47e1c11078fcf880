#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use canvas::geom::Point;
use canvas::shape::ShapeKind;
use tokio::sync::mpsc;

use super::*;

fn state() -> AppState {
    AppState::new()
}

fn circle(id: i64, x: f64, y: f64, radius: f64) -> Shape {
    Shape::new(ShapeId::Persistent(id), ShapeKind::Circle { center: Point::new(x, y), radius })
}

async fn join(
    state: &AppState,
    canvas_id: &str,
    user_id: &str,
) -> (Uuid, mpsc::Receiver<ServerMessage>, JoinSnapshot) {
    let (tx, rx) = mpsc::channel(16);
    let client_id = Uuid::new_v4();
    let snapshot = register(state, canvas_id, client_id, user_id, user_id, tx).await;
    (client_id, rx, snapshot)
}

fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

// ===== color assignment =====

#[test]
fn fnv1a_is_deterministic_and_spreads() {
    assert_eq!(fnv1a("user-a"), fnv1a("user-a"));
    assert_ne!(fnv1a("user-a"), fnv1a("user-b"));
}

#[test]
fn pick_prefers_the_hash_slot() {
    let color = pick_user_color("user-a", &[]);
    let slot = fnv1a("user-a") as usize % USER_COLORS.len();
    assert_eq!(color, USER_COLORS[slot]);
}

#[test]
fn pick_scans_forward_past_taken_colors() {
    let slot = fnv1a("user-a") as usize % USER_COLORS.len();
    let taken = vec![USER_COLORS[slot].to_string()];
    let color = pick_user_color("user-a", &taken);
    assert_eq!(color, USER_COLORS[(slot + 1) % USER_COLORS.len()]);
}

#[test]
fn pick_varies_once_the_palette_is_exhausted() {
    let taken: Vec<String> = USER_COLORS.iter().map(|c| (*c).to_string()).collect();
    let color = pick_user_color("user-a", &taken);
    assert!(color.starts_with('#'));
    assert_eq!(color.len(), 7);
    assert!(!USER_COLORS.contains(&color.as_str()), "variation must leave the palette");
    assert_eq!(color, pick_user_color("user-a", &taken), "variation is deterministic");
}

#[test]
fn color_variation_shifts_channels() {
    let varied = color_variation("#FF6B6B", 17);
    assert_ne!(varied, "#FF6B6B");
    assert!(varied.starts_with('#'));
}

// ===== registration =====

#[tokio::test]
async fn concurrent_users_get_distinct_colors() {
    let state = state();
    let (_, _rx_a, snap_a) = join(&state, "canvas-1", "user-a").await;
    let (_, _rx_b, snap_b) = join(&state, "canvas-1", "user-b").await;
    assert_ne!(snap_a.user_color, snap_b.user_color);
}

#[tokio::test]
async fn reconnecting_user_keeps_color_without_announcement() {
    let state = state();
    let (_, mut rx_tab1, snap1) = join(&state, "canvas-1", "user-a").await;
    let (_, _rx_tab2, snap2) = join(&state, "canvas-1", "user-a").await;

    assert_eq!(snap1.user_color, snap2.user_color);
    assert!(
        drain(&mut rx_tab1).is_empty(),
        "second tab of the same user must not announce user_joined"
    );
}

#[tokio::test]
async fn join_announces_new_users_to_peers_only() {
    let state = state();
    let (_, mut rx_a, _) = join(&state, "canvas-1", "user-a").await;
    let (_, mut rx_b, _) = join(&state, "canvas-1", "user-b").await;

    let seen_by_a = drain(&mut rx_a);
    match seen_by_a.as_slice() {
        [ServerMessage::UserJoined { user }] => assert_eq!(user.user_id, "user-b"),
        other => panic!("expected one user_joined, got {other:?}"),
    }
    assert!(drain(&mut rx_b).is_empty(), "joiner never hears its own announcement");
}

#[tokio::test]
async fn join_snapshot_replays_shapes_in_stacking_order() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    apply_shape_add(&state, "canvas-1", id_a, circle(2, 0.0, 0.0, 5.0).with_z_index(1)).await;
    apply_shape_add(&state, "canvas-1", id_a, circle(1, 9.0, 9.0, 5.0)).await;

    let (_, _rx_b, snapshot) = join(&state, "canvas-1", "user-b").await;
    let ids: Vec<ShapeId> = snapshot.shapes.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![ShapeId::Persistent(1), ShapeId::Persistent(2)]);
}

#[tokio::test]
async fn rooms_are_isolated_per_canvas() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    apply_shape_add(&state, "canvas-1", id_a, circle(1, 0.0, 0.0, 5.0)).await;

    let (_, _rx_b, snapshot) = join(&state, "canvas-2", "user-b").await;
    assert!(snapshot.shapes.is_empty());
    assert!(snapshot.users.iter().all(|u| u.user_id != "user-a"));
}

#[tokio::test]
async fn canvas_content_survives_everyone_leaving() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    apply_shape_add(&state, "canvas-1", id_a, circle(1, 0.0, 0.0, 5.0)).await;
    unregister(&state, "canvas-1", id_a).await;

    let (_, _rx_b, snapshot) = join(&state, "canvas-1", "user-b").await;
    assert_eq!(snapshot.shapes.len(), 1);
}

// ===== shape relay =====

#[tokio::test]
async fn shape_add_reaches_peers_but_not_the_sender() {
    let state = state();
    let (id_a, mut rx_a, _) = join(&state, "canvas-1", "user-a").await;
    let (_, mut rx_b, _) = join(&state, "canvas-1", "user-b").await;
    drain(&mut rx_a);

    apply_shape_add(&state, "canvas-1", id_a, circle(1, 0.0, 0.0, 5.0)).await;

    match drain(&mut rx_b).as_slice() {
        [ServerMessage::ShapeAdd { canvas_id, shape }] => {
            assert_eq!(canvas_id, "canvas-1");
            assert_eq!(shape.id, ShapeId::Persistent(1));
        }
        other => panic!("expected one shape_add, got {other:?}"),
    }
    assert!(drain(&mut rx_a).is_empty(), "no echo to the sender");
}

#[tokio::test]
async fn shape_updates_overwrite_by_id() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    apply_shape_add(&state, "canvas-1", id_a, circle(1, 0.0, 0.0, 5.0)).await;
    apply_shape_update(&state, "canvas-1", id_a, circle(1, 50.0, 50.0, 5.0)).await;

    let rooms = state.rooms.read().await;
    let room = rooms.get("canvas-1").unwrap();
    assert_eq!(room.shapes.len(), 1);
    match room.shapes.get(&ShapeId::Persistent(1)).unwrap().kind {
        ShapeKind::Circle { center, .. } => assert_eq!(center, Point::new(50.0, 50.0)),
        ref other => panic!("expected circle, got {other:?}"),
    }
}

#[tokio::test]
async fn shape_remove_also_frees_its_selection() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    apply_shape_add(&state, "canvas-1", id_a, circle(1, 0.0, 0.0, 5.0)).await;
    apply_selection(&state, "canvas-1", id_a, &[ShapeId::Persistent(1)]).await;

    apply_shape_remove(&state, "canvas-1", id_a, ShapeId::Persistent(1)).await;

    let rooms = state.rooms.read().await;
    let room = rooms.get("canvas-1").unwrap();
    assert!(room.shapes.is_empty());
    assert!(room.selections.is_empty());
}

// ===== selection relay =====

#[tokio::test]
async fn selection_replaces_the_senders_entries() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    apply_selection(&state, "canvas-1", id_a, &[ShapeId::Persistent(1), ShapeId::Persistent(2)])
        .await;
    apply_selection(&state, "canvas-1", id_a, &[ShapeId::Persistent(2), ShapeId::Persistent(3)])
        .await;

    let rooms = state.rooms.read().await;
    let room = rooms.get("canvas-1").unwrap();
    assert!(!room.selections.contains_key(&ShapeId::Persistent(1)));
    assert!(room.selections.contains_key(&ShapeId::Persistent(2)));
    assert!(room.selections.contains_key(&ShapeId::Persistent(3)));
}

#[tokio::test]
async fn later_selection_claim_displaces_the_earlier_owner() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    let (id_b, _rx_b, _) = join(&state, "canvas-1", "user-b").await;
    apply_selection(&state, "canvas-1", id_a, &[ShapeId::Persistent(1)]).await;
    apply_selection(&state, "canvas-1", id_b, &[ShapeId::Persistent(1)]).await;

    let rooms = state.rooms.read().await;
    let room = rooms.get("canvas-1").unwrap();
    assert_eq!(room.selections.get(&ShapeId::Persistent(1)).unwrap().user_id, "user-b");
}

#[tokio::test]
async fn selection_broadcast_carries_registered_identity() {
    let state = state();
    let (id_a, _rx_a, snap_a) = join(&state, "canvas-1", "user-a").await;
    let (_, mut rx_b, _) = join(&state, "canvas-1", "user-b").await;

    apply_selection(&state, "canvas-1", id_a, &[ShapeId::Persistent(1)]).await;

    match drain(&mut rx_b).as_slice() {
        [ServerMessage::Selection { user_id, user_color, shape_ids, .. }] => {
            assert_eq!(user_id, "user-a");
            assert_eq!(*user_color, snap_a.user_color);
            assert_eq!(*shape_ids, vec![ShapeId::Persistent(1)]);
        }
        other => panic!("expected one selection, got {other:?}"),
    }
}

// ===== departures =====

#[tokio::test]
async fn last_tab_leaving_clears_selection_and_announces() {
    let state = state();
    let (id_a, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    let (_, mut rx_b, _) = join(&state, "canvas-1", "user-b").await;
    apply_selection(&state, "canvas-1", id_a, &[ShapeId::Persistent(1)]).await;
    drain(&mut rx_b);

    unregister(&state, "canvas-1", id_a).await;

    let seen = drain(&mut rx_b);
    assert_eq!(seen.len(), 2, "empty selection then user_left: {seen:?}");
    match &seen[0] {
        ServerMessage::Selection { user_id, shape_ids, .. } => {
            assert_eq!(user_id, "user-a");
            assert!(shape_ids.is_empty());
        }
        other => panic!("expected selection first, got {other:?}"),
    }
    match &seen[1] {
        ServerMessage::UserLeft { user } => assert_eq!(user.user_id, "user-a"),
        other => panic!("expected user_left second, got {other:?}"),
    }

    let rooms = state.rooms.read().await;
    assert!(rooms.get("canvas-1").unwrap().selections.is_empty());
}

#[tokio::test]
async fn closing_one_of_two_tabs_stays_silent() {
    let state = state();
    let (tab1, _rx_tab1, _) = join(&state, "canvas-1", "user-a").await;
    let (_, _rx_tab2, _) = join(&state, "canvas-1", "user-a").await;
    let (_, mut rx_b, _) = join(&state, "canvas-1", "user-b").await;

    unregister(&state, "canvas-1", tab1).await;

    assert!(drain(&mut rx_b).is_empty(), "user still present via the other tab");
    assert_eq!(roster(&state, "canvas-1").await.len(), 2);
}

#[tokio::test]
async fn roster_dedups_users_across_tabs() {
    let state = state();
    let _a1 = join(&state, "canvas-1", "user-a").await;
    let _a2 = join(&state, "canvas-1", "user-a").await;
    let _b = join(&state, "canvas-1", "user-b").await;

    let users = roster(&state, "canvas-1").await;
    let ids: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec!["user-a", "user-b"]);
}

// ===== maintenance =====

#[tokio::test]
async fn stale_sweep_unregisters_closed_connections() {
    let state = state();
    let (_, mut rx_a, _) = join(&state, "canvas-1", "user-a").await;
    let (_, rx_b, _) = join(&state, "canvas-1", "user-b").await;
    drain(&mut rx_a);
    drop(rx_b);

    let dropped = cleanup_stale(&state).await;
    assert_eq!(dropped, 1);

    match drain(&mut rx_a).as_slice() {
        [ServerMessage::UserLeft { user }] => assert_eq!(user.user_id, "user-b"),
        other => panic!("expected user_left, got {other:?}"),
    }
    assert_eq!(roster(&state, "canvas-1").await.len(), 1);
}

#[tokio::test]
async fn sweep_with_healthy_connections_is_a_no_op() {
    let state = state();
    let (_, _rx_a, _) = join(&state, "canvas-1", "user-a").await;
    assert_eq!(cleanup_stale(&state).await, 0);
    assert_eq!(roster(&state, "canvas-1").await.len(), 1);
}

#[tokio::test]
async fn broadcast_skips_full_channels_without_failing() {
    let state = state();
    let (tx, _rx) = mpsc::channel(1);
    let client_id = Uuid::new_v4();
    register(&state, "canvas-1", client_id, "user-a", "user-a", tx).await;
    let (id_b, _rx_b, _) = join(&state, "canvas-1", "user-b").await;

    // user-a's single-slot channel already holds the user_joined for b.
    apply_shape_add(&state, "canvas-1", id_b, circle(1, 0.0, 0.0, 5.0)).await;
    apply_shape_add(&state, "canvas-1", id_b, circle(2, 0.0, 0.0, 5.0)).await;

    let rooms = state.rooms.read().await;
    assert_eq!(rooms.get("canvas-1").unwrap().shapes.len(), 2);
}
