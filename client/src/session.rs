//! Canvas session: one client's participation in one canvas.
//!
//! The session owns the whole client-side engine state for a canvas — the
//! shape store, the selection model, the ephemeral-ID counter, the toolbox,
//! and the roster mirror — and bridges it to the network over a pair of
//! channels. It is deliberately transport-agnostic: `net::connect` hands it
//! real WebSocket-backed channels, tests hand it bare ones.
//!
//! LIFECYCLE
//! =========
//! `Disconnected → Registering → Joined → Leaving → Disconnected`.
//!
//! [`CanvasSession::join`] sends the join and suspends until the server
//! acknowledges; local edits made before the ack queue in the store and
//! flush on transition. [`CanvasSession::leave`] sends the leave and
//! suspends for at most the configured timeout — an unacknowledged leave
//! still completes, the server's stale sweep covers the rest. A leave, once
//! started, always resolves.
//!
//! While joined, the embedding drives two loops: inbound,
//! `recv().await` → [`CanvasSession::apply_message`]; and a coarse timer
//! calling [`CanvasSession::tick`] for retries and throttled presence.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use canvas::consts::PICK_TOLERANCE;
use canvas::geom::Point;
use canvas::render::{Surface, render_scene};
use canvas::selection::SelectionModel;
use canvas::shape::{EphemeralIds, Shape, ShapeId};
use canvas::store::{ShapeDelta, ShapeStore};
use canvas::tool::{StyleState, ToolContext, ToolKind, Toolbox};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use wire::{ClientMessage, ServerMessage};

use crate::presence::{PRESENCE_WINDOW, PresenceThrottle, Roster};
use crate::retry::{Notice, RETRY_ATTEMPTS, RetryQueue};

/// Default bound on waiting for the leave acknowledgment.
pub const LEAVE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Registering,
    Joined,
    Leaving,
}

/// How a leave resolved. None of these is an error: navigation proceeds in
/// every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The server acknowledged the leave.
    Acked,
    /// No acknowledgment within the timeout.
    TimedOut,
    /// The transport closed before an acknowledgment could arrive.
    ChannelClosed,
}

/// State changes the embedding UI reacts to, drained via
/// [`CanvasSession::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The join ack arrived; carries the server-assigned user color.
    Joined { user_color: String },
    ShapesChanged,
    SelectionChanged,
    RosterChanged,
    Notice(Notice),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The transport closed before the join acknowledgment.
    #[error("channel closed before the join acknowledgment")]
    ChannelClosed,
    /// `join` is only valid from `Disconnected`.
    #[error("join attempted while session is {0:?}")]
    AlreadyActive(Phase),
}

/// Static parameters of one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub canvas_id: String,
    pub user_id: String,
    pub leave_timeout: Duration,
    pub presence_window: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn new(canvas_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            user_id: user_id.into(),
            leave_timeout: LEAVE_TIMEOUT,
            presence_window: PRESENCE_WINDOW,
        }
    }

    #[must_use]
    pub fn with_leave_timeout(mut self, timeout: Duration) -> Self {
        self.leave_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_presence_window(mut self, window: Duration) -> Self {
        self.presence_window = window;
        self
    }
}

/// One client's session on one canvas, join to leave.
pub struct CanvasSession {
    config: SessionConfig,
    phase: Phase,
    store: ShapeStore,
    selection: SelectionModel,
    ids: EphemeralIds,
    toolbox: Toolbox,
    style: Option<StyleState>,
    roster: Roster,
    user_color: Option<String>,
    throttle: PresenceThrottle,
    retry: RetryQueue,
    events: VecDeque<SessionEvent>,
    tx: mpsc::Sender<ClientMessage>,
    rx: mpsc::Receiver<ServerMessage>,
}

impl CanvasSession {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        tx: mpsc::Sender<ClientMessage>,
        rx: mpsc::Receiver<ServerMessage>,
    ) -> Self {
        let throttle = PresenceThrottle::new(config.presence_window);
        Self {
            config,
            phase: Phase::Disconnected,
            store: ShapeStore::new(),
            selection: SelectionModel::new(),
            ids: EphemeralIds::new(),
            toolbox: Toolbox::new(),
            style: None,
            roster: Roster::new(),
            user_color: None,
            throttle,
            retry: RetryQueue::new(),
            events: VecDeque::new(),
            tx,
            rx,
        }
    }

    // ── views ───────────────────────────────────────────────────────────────

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn canvas_id(&self) -> &str {
        &self.config.canvas_id
    }

    /// Server-assigned color, available once joined.
    #[must_use]
    pub fn user_color(&self) -> Option<&str> {
        self.user_color.as_deref()
    }

    #[must_use]
    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Next pending state-change event, if any.
    pub fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Draw the session's current scene.
    pub fn render(&self, surface: &mut dyn Surface) {
        render_scene(&self.store, &self.selection, surface);
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Register on the canvas and suspend until the server acknowledges.
    ///
    /// Messages arriving before the ack are discarded; edits made locally
    /// in the meantime stay queued and flush on transition to `Joined`.
    pub async fn join(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Disconnected {
            return Err(SessionError::AlreadyActive(self.phase));
        }
        self.phase = Phase::Registering;
        info!(canvas_id = %self.config.canvas_id, "joining canvas");

        let join = ClientMessage::Join { canvas_id: self.config.canvas_id.clone() };
        if self.tx.send(join).await.is_err() {
            self.phase = Phase::Disconnected;
            return Err(SessionError::ChannelClosed);
        }

        loop {
            let Some(msg) = self.rx.recv().await else {
                self.phase = Phase::Disconnected;
                return Err(SessionError::ChannelClosed);
            };
            match msg {
                ServerMessage::Joined { canvas_id, shapes, users, user_color }
                    if canvas_id == self.config.canvas_id =>
                {
                    self.store.load_snapshot(shapes);
                    self.roster.replace_all(users);
                    self.user_color = Some(user_color.clone());
                    self.phase = Phase::Joined;
                    info!(canvas_id = %self.config.canvas_id, %user_color, "joined canvas");
                    self.events.push_back(SessionEvent::Joined { user_color });
                    self.flush_outbound();
                    return Ok(());
                }
                other => {
                    debug!(op = other.op(), "discarding message before join ack");
                }
            }
        }
    }

    /// Unregister from the canvas, waiting at most the configured timeout
    /// for the acknowledgment. Always leaves the session `Disconnected`.
    pub async fn leave(&mut self) -> LeaveOutcome {
        if self.phase == Phase::Disconnected {
            return LeaveOutcome::Acked;
        }
        self.phase = Phase::Leaving;
        info!(canvas_id = %self.config.canvas_id, "leaving canvas");

        let leave = ClientMessage::Leave { canvas_id: self.config.canvas_id.clone() };
        if self.tx.send(leave).await.is_err() {
            warn!(canvas_id = %self.config.canvas_id, "channel closed before leave was sent");
            self.phase = Phase::Disconnected;
            return LeaveOutcome::ChannelClosed;
        }

        let deadline = self.config.leave_timeout;
        let rx = &mut self.rx;
        let wait = async move {
            loop {
                match rx.recv().await {
                    Some(ServerMessage::Left) => return LeaveOutcome::Acked,
                    Some(other) => debug!(op = other.op(), "discarding message while leaving"),
                    None => return LeaveOutcome::ChannelClosed,
                }
            }
        };
        let outcome = tokio::time::timeout(deadline, wait)
            .await
            .unwrap_or(LeaveOutcome::TimedOut);

        if outcome != LeaveOutcome::Acked {
            warn!(canvas_id = %self.config.canvas_id, ?outcome, "leave unacknowledged; proceeding");
        }
        self.phase = Phase::Disconnected;
        outcome
    }

    /// Next raw message from the transport; `None` means it closed.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.rx.recv().await
    }

    // ── inbound ─────────────────────────────────────────────────────────────

    /// Merge one server message into local state.
    pub fn apply_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::ShapeAdd { canvas_id, shape } => {
                if self.other_canvas(&canvas_id) {
                    return;
                }
                self.store.apply_remote_update(ShapeDelta::Added(shape));
                self.events.push_back(SessionEvent::ShapesChanged);
            }
            ServerMessage::ShapeUpdate { canvas_id, shape } => {
                if self.other_canvas(&canvas_id) {
                    return;
                }
                self.store.apply_remote_update(ShapeDelta::Updated(shape));
                self.events.push_back(SessionEvent::ShapesChanged);
            }
            ServerMessage::ShapeRemove { canvas_id, shape_id } => {
                if self.other_canvas(&canvas_id) {
                    return;
                }
                self.store.apply_remote_update(ShapeDelta::Removed(shape_id));
                self.selection.purge_shape(shape_id);
                self.events.push_back(SessionEvent::ShapesChanged);
            }
            ServerMessage::Selection { canvas_id, user_id, user_color, shape_ids } => {
                if self.other_canvas(&canvas_id) {
                    return;
                }
                // Our own selection echoed back (another tab); the local
                // view stands.
                if user_id == self.config.user_id {
                    return;
                }
                self.selection.apply_remote_selection(&user_id, &user_color, &shape_ids);
                self.events.push_back(SessionEvent::SelectionChanged);
            }
            ServerMessage::Users { canvas_id, users } => {
                if self.other_canvas(&canvas_id) {
                    return;
                }
                self.roster.replace_all(users);
                self.events.push_back(SessionEvent::RosterChanged);
            }
            ServerMessage::UserJoined { user } => {
                self.roster.upsert(user);
                self.events.push_back(SessionEvent::RosterChanged);
            }
            ServerMessage::UserLeft { user } => {
                self.selection.purge_user(&user.user_id);
                self.roster.remove(&user.user_id);
                self.events.push_back(SessionEvent::RosterChanged);
                self.events.push_back(SessionEvent::SelectionChanged);
            }
            ServerMessage::Pong { .. } => {}
            other @ (ServerMessage::Joined { .. } | ServerMessage::Left) => {
                debug!(op = other.op(), phase = ?self.phase, "lifecycle ack outside its phase");
            }
        }
    }

    // ── tools and pointer input ─────────────────────────────────────────────

    #[must_use]
    pub fn active_tool(&self) -> ToolKind {
        self.toolbox.active()
    }

    pub fn set_tool(&mut self, kind: ToolKind) {
        self.toolbox.set_active(kind, &mut self.store);
    }

    pub fn set_style(&mut self, stroke: impl Into<String>, fill: impl Into<String>) {
        self.style = Some(StyleState { stroke_color: stroke.into(), fill_color: fill.into() });
    }

    pub fn clear_style(&mut self) {
        self.style = None;
    }

    pub fn pointer_down(&mut self, p: Point) {
        let mut ctx =
            ToolContext { store: &mut self.store, ids: &mut self.ids, style: self.style.as_ref() };
        self.toolbox.handle_mouse_down(&mut ctx, p);
        self.flush_outbound();
    }

    pub fn pointer_move(&mut self, p: Point) {
        let mut ctx =
            ToolContext { store: &mut self.store, ids: &mut self.ids, style: self.style.as_ref() };
        self.toolbox.handle_mouse_move(&mut ctx, p);
    }

    pub fn pointer_up(&mut self, p: Point) {
        let mut ctx =
            ToolContext { store: &mut self.store, ids: &mut self.ids, style: self.style.as_ref() };
        self.toolbox.handle_mouse_up(&mut ctx, p);
        self.flush_outbound();
    }

    // ── selection ───────────────────────────────────────────────────────────

    /// Pick at `p`: select the topmost hit, or clear the selection on a
    /// miss. Either way the complete selection is broadcast on change.
    pub fn select_shape_at(&mut self, p: Point) -> Option<ShapeId> {
        match self.store.hit_topmost(p, PICK_TOLERANCE) {
            Some(id) => {
                self.select_shape(id);
                Some(id)
            }
            None => {
                self.clear_selection();
                None
            }
        }
    }

    pub fn select_shape(&mut self, id: ShapeId) {
        if self.selection.select(id) {
            self.events.push_back(SessionEvent::SelectionChanged);
            self.broadcast_selection();
        }
    }

    pub fn deselect_shape(&mut self, id: ShapeId) {
        if self.selection.deselect(id) {
            self.events.push_back(SessionEvent::SelectionChanged);
            self.broadcast_selection();
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear_local() {
            self.events.push_back(SessionEvent::SelectionChanged);
            self.broadcast_selection();
        }
    }

    // ── direct shape mutation ───────────────────────────────────────────────

    /// Upsert a shape under its persistent ID (move, restyle, re-stack) and
    /// broadcast the change.
    pub fn update_shape(&mut self, shape: Shape) -> ShapeId {
        let id = self.store.add_shape(shape, false, false);
        self.events.push_back(SessionEvent::ShapesChanged);
        self.flush_outbound();
        id
    }

    /// Remove one shape and broadcast the removal.
    pub fn remove_shape(&mut self, id: ShapeId) -> bool {
        let removed = self.store.remove_shape(id);
        if removed {
            self.selection.purge_shape(id);
            self.events.push_back(SessionEvent::ShapesChanged);
            self.flush_outbound();
        }
        removed
    }

    /// Remove every locally selected shape. Returns how many went.
    pub fn remove_selected(&mut self) -> usize {
        let ids = self.selection.local_ids();
        let mut removed = 0;
        for id in ids {
            if self.store.remove_shape(id) {
                removed += 1;
            }
            self.selection.purge_shape(id);
        }
        if removed > 0 {
            self.events.push_back(SessionEvent::ShapesChanged);
            self.events.push_back(SessionEvent::SelectionChanged);
            self.broadcast_selection();
            self.flush_outbound();
        }
        removed
    }

    // ── presence and upkeep ─────────────────────────────────────────────────

    /// Ask for a roster refresh. `immediate` bypasses the throttle window
    /// (navigation); otherwise bursts coalesce.
    pub fn refresh_presence(&mut self, immediate: bool) {
        if self.phase != Phase::Joined {
            return;
        }
        if self.throttle.request(immediate, Instant::now()) {
            self.send_presence_refresh();
        }
    }

    /// Periodic upkeep: fire a coalesced presence refresh once its window
    /// reopens, and re-offer parked sends that have come due.
    pub fn tick(&mut self, now: Instant) {
        if self.phase != Phase::Joined {
            return;
        }
        if self.throttle.poll(now) {
            self.send_presence_refresh();
        }
        for (msg, attempt) in self.retry.due(now) {
            self.offer(msg, attempt + 1, now);
        }
    }

    // ── outbound plumbing ───────────────────────────────────────────────────

    /// Drain the store's broadcast queue toward the transport. A no-op
    /// until `Joined`; that is the whole queue-until-ack mechanism.
    fn flush_outbound(&mut self) {
        if self.phase != Phase::Joined {
            return;
        }
        let now = Instant::now();
        while let Some(delta) = self.store.pop_outbound() {
            let msg = self.delta_message(delta);
            self.offer(msg, 1, now);
        }
    }

    /// Hand one message to the transport; park it for retry when refused.
    /// `attempt` is which failure this would be.
    fn offer(&mut self, msg: ClientMessage, attempt: u32, now: Instant) {
        let sent_id = shape_id_of(&msg);
        match self.tx.try_send(msg) {
            Ok(()) => {
                if let Some(id) = sent_id {
                    self.store.mark_sent(id);
                }
            }
            Err(TrySendError::Full(msg) | TrySendError::Closed(msg)) => {
                if attempt >= RETRY_ATTEMPTS {
                    warn!(op = msg.op(), attempts = attempt, "dropping message after retries");
                    self.events.push_back(SessionEvent::Notice(Notice::Dropped { op: msg.op() }));
                } else {
                    debug!(op = msg.op(), attempt, "transport refused send; retry scheduled");
                    self.events
                        .push_back(SessionEvent::Notice(Notice::Retrying { op: msg.op(), attempt }));
                    self.retry.push(msg, attempt, now);
                }
            }
        }
    }

    /// Broadcast the complete current local selection.
    fn broadcast_selection(&mut self) {
        if self.phase != Phase::Joined {
            return;
        }
        let msg = ClientMessage::Selection {
            canvas_id: self.config.canvas_id.clone(),
            user_id: self.config.user_id.clone(),
            user_color: self.user_color.clone().unwrap_or_default(),
            shape_ids: self.selection.local_ids(),
        };
        self.offer(msg, 1, Instant::now());
    }

    fn send_presence_refresh(&mut self) {
        let msg = ClientMessage::PresenceRefresh { canvas_id: self.config.canvas_id.clone() };
        // Best effort: a refused refresh is superseded by the next one.
        if self.tx.try_send(msg).is_err() {
            debug!("presence refresh dropped; transport busy");
        }
    }

    fn delta_message(&self, delta: ShapeDelta) -> ClientMessage {
        let canvas_id = self.config.canvas_id.clone();
        match delta {
            ShapeDelta::Added(shape) => ClientMessage::ShapeAdd { canvas_id, shape },
            ShapeDelta::Updated(shape) => ClientMessage::ShapeUpdate { canvas_id, shape },
            ShapeDelta::Removed(id) => ClientMessage::ShapeRemove { canvas_id, shape_id: id },
        }
    }

    fn other_canvas(&self, canvas_id: &str) -> bool {
        if canvas_id == self.config.canvas_id {
            false
        } else {
            debug!(%canvas_id, "message for another canvas; ignoring");
            true
        }
    }
}

/// The shape a message carries, for marking it sent on transport accept.
fn shape_id_of(msg: &ClientMessage) -> Option<ShapeId> {
    match msg {
        ClientMessage::ShapeAdd { shape, .. } | ClientMessage::ShapeUpdate { shape, .. } => {
            Some(shape.id)
        }
        _ => None,
    }
}
