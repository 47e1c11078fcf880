use std::time::{Duration, Instant};

use super::*;

fn user(id: &str, color: &str) -> WireUser {
    WireUser {
        user_id: id.to_string(),
        display_name: format!("name-{id}"),
        user_color: color.to_string(),
    }
}

// ===== roster =====

#[test]
fn replace_all_swaps_the_roster() {
    let mut roster = Roster::new();
    roster.upsert(user("user-1", "#F00"));
    roster.replace_all(vec![user("user-2", "#0F0"), user("user-3", "#00F")]);

    assert!(!roster.contains("user-1"));
    assert_eq!(roster.len(), 2);
}

#[test]
fn upsert_updates_in_place() {
    let mut roster = Roster::new();
    roster.upsert(user("user-1", "#F00"));
    roster.upsert(user("user-2", "#0F0"));
    roster.upsert(user("user-1", "#ABC"));

    assert_eq!(roster.len(), 2);
    assert_eq!(roster.get("user-1").unwrap().user_color, "#ABC");
    // Arrival order is preserved across updates.
    let order: Vec<&str> = roster.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(order, vec!["user-1", "user-2"]);
}

#[test]
fn remove_returns_the_entry() {
    let mut roster = Roster::new();
    roster.upsert(user("user-1", "#F00"));

    let gone = roster.remove("user-1").unwrap();
    assert_eq!(gone.user_id, "user-1");
    assert!(roster.is_empty());
    assert!(roster.remove("user-1").is_none());
}

// ===== throttle =====

#[test]
fn first_request_fires_immediately() {
    let mut throttle = PresenceThrottle::new(Duration::from_millis(400));
    assert!(throttle.request(false, Instant::now()));
}

#[test]
fn burst_coalesces_into_one_pending() {
    let mut throttle = PresenceThrottle::new(Duration::from_millis(400));
    let start = Instant::now();

    assert!(throttle.request(false, start));
    assert!(!throttle.request(false, start + Duration::from_millis(10)));
    assert!(!throttle.request(false, start + Duration::from_millis(20)));
    assert!(throttle.has_pending());

    // Still inside the window: nothing fires.
    assert!(!throttle.poll(start + Duration::from_millis(100)));

    // Window reopens: the one coalesced refresh fires.
    assert!(throttle.poll(start + Duration::from_millis(400)));
    assert!(!throttle.has_pending());
    assert!(!throttle.poll(start + Duration::from_millis(401)));
}

#[test]
fn immediate_bypasses_the_window() {
    let mut throttle = PresenceThrottle::new(Duration::from_millis(400));
    let start = Instant::now();

    assert!(throttle.request(false, start));
    assert!(throttle.request(true, start + Duration::from_millis(1)));
}

#[test]
fn immediate_clears_a_pending_refresh() {
    let mut throttle = PresenceThrottle::new(Duration::from_millis(400));
    let start = Instant::now();

    throttle.request(false, start);
    throttle.request(false, start + Duration::from_millis(1));
    assert!(throttle.has_pending());

    assert!(throttle.request(true, start + Duration::from_millis(2)));
    assert!(!throttle.has_pending());
    assert!(!throttle.poll(start + Duration::from_secs(1)));
}

#[test]
fn request_after_window_fires_directly() {
    let mut throttle = PresenceThrottle::new(Duration::from_millis(400));
    let start = Instant::now();

    assert!(throttle.request(false, start));
    assert!(throttle.request(false, start + Duration::from_millis(500)));
}
