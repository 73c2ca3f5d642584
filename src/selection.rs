//! Which edges are selected or hovered, and so show their drag handles.

use crate::transitions::TransitionId;
use std::collections::HashSet;

/// Selected and hovered edges.
///
/// An edge shows its drag handles while it is selected, hovered, or being
/// dragged.
#[derive(Debug, Default)]
pub struct EdgeSelection {
    selected: HashSet<TransitionId>,
    hovered: Option<TransitionId>,
}

impl EdgeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a click on an edge based on interaction modifiers
    pub fn handle_interaction(&mut self, id: &TransitionId, shift_held: bool) {
        if shift_held {
            if !self.selected.remove(id) {
                self.selected.insert(id.clone());
            }
        } else {
            if self.selected.len() == 1 && self.selected.contains(id) {
                return;
            }
            self.selected.clear();
            self.selected.insert(id.clone());
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn contains(&self, id: &TransitionId) -> bool {
        self.selected.contains(id)
    }

    /// Set the edge under the pointer. Returns `true` if it changed.
    pub fn set_hovered(&mut self, id: Option<TransitionId>) -> bool {
        if self.hovered == id {
            return false;
        }
        self.hovered = id;
        true
    }

    pub fn hovered(&self) -> Option<&TransitionId> {
        self.hovered.as_ref()
    }

    pub fn handles_visible(&self, id: &TransitionId, dragging: bool) -> bool {
        dragging || self.contains(id) || self.hovered.as_ref() == Some(id)
    }

    /// Forget edges that no longer exist.
    pub fn retain<F>(&mut self, mut exists: F)
    where
        F: FnMut(&TransitionId) -> bool,
    {
        self.selected.retain(|id| exists(id));
        if self.hovered.as_ref().is_some_and(|id| !exists(id)) {
            self.hovered = None;
        }
    }

    /// Selected ids in a stable order.
    pub fn sorted(&self) -> Vec<TransitionId> {
        let mut ids: Vec<_> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
