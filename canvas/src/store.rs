//! Authoritative ordered shape collection for one canvas session.
//!
//! The store is the single point of mutation for shapes: tools, the session
//! bridge, and remote updates all go through it. It owns three pieces of
//! state that the rest of the engine reads:
//!
//! - the persisted entries, ordered by `(z_index, insertion)`,
//! - the single in-progress preview slot,
//! - the outbound delta queue the session drains toward the network.
//!
//! FINALIZATION
//! ============
//! A non-temporary insert carrying an ephemeral ID is a finalization: the
//! store assigns the next persistent ID, stamps the next z-order slot, and
//! clears a preview left over from the same gesture. A non-temporary insert
//! carrying a persistent ID is an upsert under that ID.
//!
//! RECONCILIATION
//! ==============
//! Remote updates always win over the advisory preview, but a locally
//! finalized shape whose broadcast has not yet been accepted by the
//! transport is protected: snapshots and remote removals leave it in place
//! until [`ShapeStore::mark_sent`] releases it. Persistent IDs observed
//! from the network bump the local ID cursor past them so later
//! finalizations never reuse a server-known ID.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::{HashSet, VecDeque};

use crate::geom::Point;
use crate::shape::{Shape, ShapeId};

/// One shape mutation, as queued for broadcast or applied from the network.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeDelta {
    Added(Shape),
    Updated(Shape),
    Removed(ShapeId),
}

#[derive(Debug)]
struct Entry {
    shape: Shape,
    /// Insertion order; breaks z-index ties.
    seq: u64,
}

/// The authoritative shape collection for one session.
#[derive(Debug, Default)]
pub struct ShapeStore {
    entries: Vec<Entry>,
    preview: Option<Shape>,
    outbound: VecDeque<ShapeDelta>,
    /// Locally finalized shapes the transport has not yet accepted.
    unsent: HashSet<ShapeId>,
    next_persistent: i64,
    next_seq: u64,
}

impl ShapeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a shape.
    ///
    /// Temporary shapes go to the single preview slot, replacing whatever
    /// preview was there; they are never broadcast, whatever
    /// `suppress_broadcast` says. Non-temporary inserts are finalizations
    /// (ephemeral ID: the store assigns a persistent one) or upserts
    /// (persistent ID), and enqueue a broadcast delta unless suppressed.
    ///
    /// Returns the ID the shape is stored under.
    pub fn add_shape(
        &mut self,
        mut shape: Shape,
        is_temporary: bool,
        suppress_broadcast: bool,
    ) -> ShapeId {
        if is_temporary {
            let id = shape.id;
            self.preview = Some(shape);
            return id;
        }

        match shape.id {
            ShapeId::Ephemeral(_) => {
                // Finalization: the gesture's preview is done with this ID.
                if self.preview.as_ref().is_some_and(|p| p.id == shape.id) {
                    self.preview = None;
                }
                self.next_persistent += 1;
                shape.id = ShapeId::Persistent(self.next_persistent);
                shape.z_index = self.max_z() + 1;
                let id = shape.id;
                self.push_entry(shape.clone());
                if !suppress_broadcast {
                    self.unsent.insert(id);
                    self.outbound.push_back(ShapeDelta::Added(shape));
                }
                id
            }
            ShapeId::Persistent(n) => {
                self.next_persistent = self.next_persistent.max(n);
                let id = shape.id;
                let existed = self.upsert_entry(shape.clone());
                if !suppress_broadcast {
                    self.unsent.insert(id);
                    let delta = if existed {
                        ShapeDelta::Updated(shape)
                    } else {
                        ShapeDelta::Added(shape)
                    };
                    self.outbound.push_back(delta);
                }
                id
            }
        }
    }

    /// Remove a persisted shape locally, queueing the removal for
    /// broadcast. Returns whether anything was removed.
    pub fn remove_shape(&mut self, id: ShapeId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.shape.id != id);
        if self.entries.len() == before {
            return false;
        }
        self.unsent.remove(&id);
        self.outbound.push_back(ShapeDelta::Removed(id));
        true
    }

    /// Clear the active preview, if any. Persisted shapes are untouched.
    pub fn remove_temporary_shape(&mut self) -> bool {
        self.preview.take().is_some()
    }

    /// The in-progress preview shape, if a gesture is active.
    #[must_use]
    pub fn preview(&self) -> Option<&Shape> {
        self.preview.as_ref()
    }

    /// Merge one authoritative delta from the network.
    ///
    /// Inserts and updates upsert by ID; removals delete. A shape in the
    /// unsent set is left alone in all three cases — the local finalized
    /// copy stands until its own broadcast goes out. Nothing applied here
    /// is re-queued for broadcast.
    pub fn apply_remote_update(&mut self, delta: ShapeDelta) {
        match delta {
            ShapeDelta::Added(shape) | ShapeDelta::Updated(shape) => {
                if let Some(n) = shape.id.as_persistent() {
                    self.next_persistent = self.next_persistent.max(n);
                }
                if self.unsent.contains(&shape.id) {
                    return;
                }
                self.upsert_entry(shape);
            }
            ShapeDelta::Removed(id) => {
                if self.unsent.contains(&id) {
                    return;
                }
                self.entries.retain(|e| e.shape.id != id);
            }
        }
    }

    /// Replace the collection from a join acknowledgment.
    ///
    /// Entries in the unsent set survive the replacement; everything else
    /// is dropped in favor of the snapshot. The ID cursor moves past every
    /// snapshot ID.
    pub fn load_snapshot(&mut self, shapes: Vec<Shape>) {
        self.entries.retain(|e| self.unsent.contains(&e.shape.id));
        for shape in shapes {
            if let Some(n) = shape.id.as_persistent() {
                self.next_persistent = self.next_persistent.max(n);
            }
            if self.unsent.contains(&shape.id) {
                continue;
            }
            self.push_entry(shape);
        }
    }

    /// Shapes in render order: `z_index` ascending, insertion order within
    /// a z level. The preview is not included; renderers draw it last.
    #[must_use]
    pub fn ordered_shapes(&self) -> Vec<&Shape> {
        let mut refs: Vec<&Entry> = self.entries.iter().collect();
        refs.sort_by_key(|e| (e.shape.z_index, e.seq));
        refs.into_iter().map(|e| &e.shape).collect()
    }

    /// Topmost persisted shape within `tolerance` of `p`, if any. The
    /// preview never participates in picking.
    #[must_use]
    pub fn hit_topmost(&self, p: Point, tolerance: f64) -> Option<ShapeId> {
        self.ordered_shapes()
            .into_iter()
            .rev()
            .find(|s| s.hit_test(p, tolerance))
            .map(|s| s.id)
    }

    #[must_use]
    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.entries.iter().find(|e| e.shape.id == id).map(|e| &e.shape)
    }

    #[must_use]
    pub fn contains(&self, id: ShapeId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Next broadcast delta, if any. The session drains this only while
    /// joined; queued deltas are how edits made before the join ack wait.
    pub fn pop_outbound(&mut self) -> Option<ShapeDelta> {
        self.outbound.pop_front()
    }

    #[must_use]
    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Release `id` from the unsent set once the transport accepts its
    /// broadcast; from here on the network copy is authoritative.
    pub fn mark_sent(&mut self, id: ShapeId) {
        self.unsent.remove(&id);
    }

    #[must_use]
    pub fn is_unsent(&self, id: ShapeId) -> bool {
        self.unsent.contains(&id)
    }

    fn max_z(&self) -> i64 {
        self.entries.iter().map(|e| e.shape.z_index).max().unwrap_or(0)
    }

    fn push_entry(&mut self, shape: Shape) {
        self.next_seq += 1;
        self.entries.push(Entry { shape, seq: self.next_seq });
    }

    /// Replace in place (keeping insertion order) or append. Returns
    /// whether the ID already existed.
    fn upsert_entry(&mut self, shape: Shape) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.shape.id == shape.id) {
            entry.shape = shape;
            true
        } else {
            self.push_entry(shape);
            false
        }
    }
}
