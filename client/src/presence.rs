//! Roster mirror and the presence-refresh throttle.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::time::{Duration, Instant};

use wire::WireUser;

/// Default coalescing window for presence refreshes.
pub const PRESENCE_WINDOW: Duration = Duration::from_millis(400);

/// The client's view of who is on the canvas. Entries keep arrival order;
/// an update to a known user replaces in place.
#[derive(Debug, Default)]
pub struct Roster {
    users: Vec<WireUser>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster, as delivered by a join ack or a `users`
    /// answer.
    pub fn replace_all(&mut self, users: Vec<WireUser>) {
        self.users = users;
    }

    /// Insert or update one user.
    pub fn upsert(&mut self, user: WireUser) {
        match self.users.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
    }

    /// Drop a user, returning the entry if it was present.
    pub fn remove(&mut self, user_id: &str) -> Option<WireUser> {
        let idx = self.users.iter().position(|u| u.user_id == user_id)?;
        Some(self.users.remove(idx))
    }

    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<&WireUser> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WireUser> {
        self.users.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Debounce for presence refreshes.
///
/// Bursts inside the window coalesce into one pending refresh that fires
/// when the window reopens; an immediate request (navigation) bypasses the
/// window entirely. Time is passed in, never read from a clock, so callers
/// and tests control it.
#[derive(Debug)]
pub struct PresenceThrottle {
    window: Duration,
    last_sent: Option<Instant>,
    pending: bool,
}

impl PresenceThrottle {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, last_sent: None, pending: false }
    }

    /// Ask for a refresh. Returns true when it should go out now; false
    /// records it as pending for a later [`Self::poll`].
    pub fn request(&mut self, immediate: bool, now: Instant) -> bool {
        if immediate || self.window_open(now) {
            self.last_sent = Some(now);
            self.pending = false;
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Fire the pending refresh once the window has reopened. Returns true
    /// when a refresh should go out now.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.pending && self.window_open(now) {
            self.last_sent = Some(now);
            self.pending = false;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_sent.is_none_or(|sent| now.duration_since(sent) >= self.window)
    }
}
