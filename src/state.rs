//! States and the registry that owns them.
//!
//! The registry also owns the two state-level attributes of an automaton:
//! the start state and the accepting set. Removal is crate-private because a
//! state may only disappear together with its incident transitions; see
//! [`Automaton::remove_state`](crate::Automaton::remove_state).

use crate::error::{Error, Result};
use crate::path::{normalize_degrees, Point};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Handle angles every new state starts with: top, right, bottom, left.
pub const DEFAULT_HANDLE_ANGLES: [f32; 4] = [-90.0, 0.0, 90.0, 180.0];

/// Identifier of a state, `q0`, `q1`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `q<n>` id for index `n`.
    pub fn indexed(n: usize) -> Self {
        Self(format!("q{n}"))
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for StateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for StateId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A state of the automaton as drawn on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: StateId,
    /// Center of the state circle in model space.
    pub position: Point,
    /// Angles (degrees) of the connection handles around the rim.
    pub handle_angles: Vec<f32>,
    /// Mirrors membership in the accepting set; kept in sync by the registry.
    pub is_final: bool,
}

impl State {
    pub fn new(id: StateId, position: Point) -> Self {
        Self {
            id,
            position,
            handle_angles: DEFAULT_HANDLE_ANGLES.to_vec(),
            is_final: false,
        }
    }
}

/// Owns the states, the start state and the accepting set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateRegistry {
    states: Vec<State>,
    start: Option<StateId>,
    accepting: BTreeSet<StateId>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with the lowest free `q<n>` id.
    ///
    /// The new state is placed at a position derived from its index and becomes
    /// the start state when none is set.
    pub fn add_state(&mut self) -> StateId {
        let index = (0..)
            .find(|&i| !self.contains(&StateId::indexed(i)))
            .unwrap_or_default();
        let id = StateId::indexed(index);
        let position = Point::new(100.0 + index as f32 * 100.0, 150.0 + (index % 2) as f32 * 50.0);

        self.states.push(State::new(id.clone(), position));
        if self.start.is_none() {
            self.start = Some(id.clone());
        }
        debug!(state = %id, x = position.x, y = position.y, "added state");
        id
    }

    /// Build a registry from fully specified states.
    ///
    /// `start` must name one of `states`; callers check ids beforehand.
    pub(crate) fn from_states(states: Vec<State>, start: Option<StateId>) -> Self {
        let accepting = states.iter().filter(|s| s.is_final).map(|s| s.id.clone()).collect();
        Self {
            states,
            start,
            accepting,
        }
    }

    /// Remove a state together with its start/accepting marks.
    pub(crate) fn remove(&mut self, id: &StateId) -> Option<State> {
        let index = self.states.iter().position(|s| &s.id == id)?;
        let state = self.states.remove(index);
        self.accepting.remove(id);
        if self.start.as_ref() == Some(id) {
            self.start = None;
        }
        Some(state)
    }

    /// Flip membership of `id` in the accepting set.
    ///
    /// Returns whether the state is accepting afterwards.
    pub fn toggle_accepting(&mut self, id: &StateId) -> Result<bool> {
        let state = self
            .states
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::UnknownState(id.clone()))?;

        let now_final = if self.accepting.remove(id) {
            false
        } else {
            self.accepting.insert(id.clone());
            true
        };
        state.is_final = now_final;
        debug!(state = %id, accepting = now_final, "toggled accepting");
        Ok(now_final)
    }

    /// Overwrite handle `index` of state `id`, normalized into `[0, 360)`.
    pub fn rotate_handle(&mut self, id: &StateId, index: usize, angle_deg: f32) -> Result<()> {
        let state = self.get_mut(id).ok_or_else(|| Error::UnknownState(id.clone()))?;
        let slot = state.handle_angles.get_mut(index).ok_or_else(|| Error::UnknownHandle {
            state: id.clone(),
            index,
        })?;
        *slot = normalize_degrees(angle_deg);
        Ok(())
    }

    pub fn move_state(&mut self, id: &StateId, position: Point) -> Result<()> {
        let state = self.get_mut(id).ok_or_else(|| Error::UnknownState(id.clone()))?;
        state.position = position;
        Ok(())
    }

    /// Set or clear the start state.
    pub fn set_start(&mut self, id: Option<StateId>) -> Result<()> {
        if let Some(id) = &id {
            if !self.contains(id) {
                return Err(Error::UnknownState(id.clone()));
            }
        }
        self.start = id;
        Ok(())
    }

    pub fn start(&self) -> Option<&StateId> {
        self.start.as_ref()
    }

    pub fn is_accepting(&self, id: &StateId) -> bool {
        self.accepting.contains(id)
    }

    /// Accepting states in id order.
    pub fn accepting(&self) -> impl Iterator<Item = &StateId> + '_ {
        self.accepting.iter()
    }

    pub fn contains(&self, id: &StateId) -> bool {
        self.states.iter().any(|s| &s.id == id)
    }

    pub fn get(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|s| &s.id == id)
    }

    pub fn get_mut(&mut self, id: &StateId) -> Option<&mut State> {
        self.states.iter_mut().find(|s| &s.id == id)
    }

    /// States in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, State> {
        self.states.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &StateId> + '_ {
        self.states.iter().map(|s| &s.id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // add_state()
    // ========================================================================

    #[test]
    fn test_add_state_assigns_sequential_ids() {
        let mut registry = StateRegistry::new();
        assert_eq!(registry.add_state(), "q0");
        assert_eq!(registry.add_state(), "q1");
        assert_eq!(registry.add_state(), "q2");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_add_state_defaults() {
        let mut registry = StateRegistry::new();
        let id = registry.add_state();
        let state = registry.get(&id).unwrap();
        assert_eq!(state.handle_angles, vec![-90.0, 0.0, 90.0, 180.0]);
        assert!(!state.is_final);
        assert_eq!(state.position, Point::new(100.0, 150.0));
    }

    #[test]
    fn test_add_state_position_derives_from_index() {
        let mut registry = StateRegistry::new();
        registry.add_state();
        let q1 = registry.add_state();
        assert_eq!(registry.get(&q1).unwrap().position, Point::new(200.0, 200.0));
    }

    #[test]
    fn test_first_state_becomes_start() {
        let mut registry = StateRegistry::new();
        let q0 = registry.add_state();
        registry.add_state();
        assert_eq!(registry.start(), Some(&q0));
    }

    #[test]
    fn test_add_state_reuses_lowest_free_id() {
        let mut registry = StateRegistry::new();
        registry.add_state();
        let q1 = registry.add_state();
        registry.add_state();

        registry.remove(&q1);
        assert_eq!(registry.add_state(), "q1");
        assert_eq!(registry.add_state(), "q3");
    }

    // ========================================================================
    // remove()
    // ========================================================================

    #[test]
    fn test_remove_clears_start_and_accepting() {
        let mut registry = StateRegistry::new();
        let q0 = registry.add_state();
        registry.toggle_accepting(&q0).unwrap();

        let removed = registry.remove(&q0).unwrap();
        assert_eq!(removed.id, q0);
        assert!(registry.start().is_none());
        assert!(!registry.is_accepting(&q0));
        assert!(registry.remove(&q0).is_none());
    }

    // ========================================================================
    // toggle_accepting()
    // ========================================================================

    #[test]
    fn test_toggle_accepting_flips_and_mirrors_flag() {
        let mut registry = StateRegistry::new();
        let q0 = registry.add_state();

        assert!(registry.toggle_accepting(&q0).unwrap());
        assert!(registry.is_accepting(&q0));
        assert!(registry.get(&q0).unwrap().is_final);

        assert!(!registry.toggle_accepting(&q0).unwrap());
        assert!(!registry.is_accepting(&q0));
        assert!(!registry.get(&q0).unwrap().is_final);
    }

    #[test]
    fn test_toggle_accepting_unknown_state() {
        let mut registry = StateRegistry::new();
        let err = registry.toggle_accepting(&StateId::from("q9")).unwrap_err();
        assert!(matches!(err, Error::UnknownState(id) if id == "q9"));
        assert_eq!(registry.accepting().count(), 0);
    }

    // ========================================================================
    // rotate_handle()
    // ========================================================================

    #[test]
    fn test_rotate_handle_normalizes() {
        let mut registry = StateRegistry::new();
        let q0 = registry.add_state();

        registry.rotate_handle(&q0, 0, -45.0).unwrap();
        registry.rotate_handle(&q0, 2, 450.0).unwrap();

        let angles = &registry.get(&q0).unwrap().handle_angles;
        assert_eq!(angles[0], 315.0);
        assert_eq!(angles[1], 0.0);
        assert_eq!(angles[2], 90.0);
    }

    #[test]
    fn test_rotate_handle_out_of_range() {
        let mut registry = StateRegistry::new();
        let q0 = registry.add_state();
        let err = registry.rotate_handle(&q0, 4, 10.0).unwrap_err();
        assert!(matches!(err, Error::UnknownHandle { index: 4, .. }));
    }

    // ========================================================================
    // set_start()
    // ========================================================================

    #[test]
    fn test_set_start_requires_existing_state() {
        let mut registry = StateRegistry::new();
        let q0 = registry.add_state();
        let q1 = registry.add_state();

        registry.set_start(Some(q1.clone())).unwrap();
        assert_eq!(registry.start(), Some(&q1));

        assert!(registry.set_start(Some(StateId::from("q7"))).is_err());
        assert_eq!(registry.start(), Some(&q1));

        registry.set_start(None).unwrap();
        assert!(registry.start().is_none());
        assert!(registry.contains(&q0));
    }
}
