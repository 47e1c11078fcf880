//! Selection model: the local user's selection set vs. peers' selections.
//!
//! Local and remote selections are deliberately asymmetric. The local set
//! is just shape IDs; the remote side maps each shape to the one peer that
//! currently claims it (`last selection notification wins`). Rendering
//! resolves overlap in favor of the local user — see `Shape::draw`.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use std::collections::{BTreeSet, HashMap};

use crate::shape::ShapeId;

/// A peer's claim on one shape: who and what color to outline with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSelection {
    pub user_id: String,
    pub color: String,
}

/// Tracks which shapes the local user has selected and which shapes peers
/// have selected. One instance per canvas session.
#[derive(Debug, Default)]
pub struct SelectionModel {
    local: BTreeSet<ShapeId>,
    remote: HashMap<ShapeId, RemoteSelection>,
}

impl SelectionModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the local selection. Returns whether the set changed, so
    /// the caller knows whether a selection broadcast is due.
    pub fn select(&mut self, id: ShapeId) -> bool {
        self.local.insert(id)
    }

    /// Remove `id` from the local selection. Returns whether the set
    /// changed.
    pub fn deselect(&mut self, id: ShapeId) -> bool {
        self.local.remove(&id)
    }

    /// Empty the local selection. Returns whether anything was selected.
    pub fn clear_local(&mut self) -> bool {
        let had = !self.local.is_empty();
        self.local.clear();
        had
    }

    #[must_use]
    pub fn is_selected_locally(&self, id: ShapeId) -> bool {
        self.local.contains(&id)
    }

    /// The complete current local selection, in ID order. Selection
    /// broadcasts always carry this full set, never a delta.
    #[must_use]
    pub fn local_ids(&self) -> Vec<ShapeId> {
        self.local.iter().copied().collect()
    }

    /// The peer claim on `id`, if any.
    #[must_use]
    pub fn remote_for(&self, id: ShapeId) -> Option<&RemoteSelection> {
        self.remote.get(&id)
    }

    /// Replace `user_id`'s remote selection with `ids`.
    ///
    /// A notification carries the sender's complete selection, so this is a
    /// full replace: every prior entry owned by `user_id` is dropped first.
    /// A shape already claimed by a different peer is re-claimed — at most
    /// one color per shape, last notification wins.
    pub fn apply_remote_selection(&mut self, user_id: &str, color: &str, ids: &[ShapeId]) {
        self.remote.retain(|_, owner| owner.user_id != user_id);
        for &id in ids {
            self.remote.insert(
                id,
                RemoteSelection { user_id: user_id.to_string(), color: color.to_string() },
            );
        }
    }

    /// Forget a shape everywhere; called when it is removed from the store.
    pub fn purge_shape(&mut self, id: ShapeId) {
        self.local.remove(&id);
        self.remote.remove(&id);
    }

    /// Drop all remote entries owned by `user_id`; called when that user
    /// leaves the canvas.
    pub fn purge_user(&mut self, user_id: &str) {
        self.remote.retain(|_, owner| owner.user_id != user_id);
    }

    /// Number of shapes peers currently claim.
    #[must_use]
    pub fn remote_len(&self) -> usize {
        self.remote.len()
    }
}
