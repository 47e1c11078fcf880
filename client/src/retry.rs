//! Backoff queue for outbound messages the transport refused.
//!
//! A refused send is never an error to the caller; the message parks here
//! and the session re-offers it on its tick. Backoff doubles from
//! [`RETRY_BASE`] up to [`RETRY_MAX`]; after [`RETRY_ATTEMPTS`] failures
//! the message is dropped with a [`Notice`], and the canvas converges again
//! on the next full resync.

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use wire::ClientMessage;

pub const RETRY_BASE: Duration = Duration::from_millis(500);
pub const RETRY_MAX: Duration = Duration::from_secs(5);
pub const RETRY_ATTEMPTS: u32 = 6;

/// Non-blocking user-facing notice about outbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// A send failed; retry `attempt` is scheduled.
    Retrying { op: &'static str, attempt: u32 },
    /// Retries exhausted; the message was dropped.
    Dropped { op: &'static str },
}

#[derive(Debug)]
struct Parked {
    msg: ClientMessage,
    /// Failed sends so far.
    attempt: u32,
    due: Instant,
}

/// FIFO of refused sends with per-message due times.
#[derive(Debug, Default)]
pub struct RetryQueue {
    parked: VecDeque<Parked>,
}

impl RetryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before retry number `attempt + 1`, doubling per failure.
    #[must_use]
    pub fn backoff(attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        RETRY_BASE.saturating_mul(2_u32.saturating_pow(exp)).min(RETRY_MAX)
    }

    /// Park a message after its `attempt`-th failed send.
    pub fn push(&mut self, msg: ClientMessage, attempt: u32, now: Instant) {
        self.parked.push_back(Parked { msg, attempt, due: now + Self::backoff(attempt) });
    }

    /// Remove and return every message whose due time has passed, oldest
    /// first, paired with its failure count so far.
    pub fn due(&mut self, now: Instant) -> Vec<(ClientMessage, u32)> {
        let mut ready = Vec::new();
        let mut keep = VecDeque::with_capacity(self.parked.len());
        for parked in self.parked.drain(..) {
            if parked.due <= now {
                ready.push((parked.msg, parked.attempt));
            } else {
                keep.push_back(parked);
            }
        }
        self.parked = keep;
        ready
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parked.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}
