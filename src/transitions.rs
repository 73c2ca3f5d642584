//! Transitions and the store that owns them.
//!
//! The store keeps transitions in insertion order (which is also the order
//! simulation scans them in) and re-derives the sibling fan-out of every
//! transition after each structural change.
//!
//! # Example
//!
//! ```
//! use dfa_canvas::{StateId, TransitionStore};
//!
//! let q0 = StateId::from("q0");
//! let q1 = StateId::from("q1");
//!
//! let mut store = TransitionStore::new(10.0);
//! let a = store.connect(&q0, &q1, "a").unwrap();
//! let b = store.connect(&q0, &q1, "b, c").unwrap();
//!
//! assert_eq!(store.get(&a).unwrap().geometry.anchor_offset, -5.0);
//! assert_eq!(store.get(&b).unwrap().geometry.anchor_offset, 5.0);
//! assert!(store.get(&b).unwrap().accepts('c'));
//! ```

use crate::error::{Error, Result};
use crate::path::Point;
use crate::state::StateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Identifier of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(String);

impl TransitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransitionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for TransitionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for TransitionId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Straight,
    SelfLoop,
}

impl TransitionKind {
    pub fn between(source: &StateId, target: &StateId) -> Self {
        if source == target {
            TransitionKind::SelfLoop
        } else {
            TransitionKind::Straight
        }
    }
}

/// Visual overrides stored on a transition.
///
/// `c1`, `c2` and `loop_angle` replace the computed defaults verbatim when set.
/// `anchor_offset` is owned by the store's fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGeometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c1: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c2: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_angle: Option<f32>,
    #[serde(default)]
    pub anchor_offset: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    pub source: StateId,
    pub target: StateId,
    /// The label as the user typed it.
    pub label: String,
    pub symbols: BTreeSet<char>,
    pub kind: TransitionKind,
    pub geometry: EdgeGeometry,
    /// Handle index on the source state the edge was drawn from, if known.
    pub source_handle: Option<usize>,
    /// Handle index on the target state the edge was drawn to, if known.
    pub target_handle: Option<usize>,
}

impl Transition {
    /// Build a transition from a raw label, validating the symbol list.
    pub fn new(id: TransitionId, source: StateId, target: StateId, raw_label: &str) -> Result<Self> {
        let symbols = parse_symbols(raw_label)?;
        Ok(Self {
            id,
            kind: TransitionKind::between(&source, &target),
            source,
            target,
            label: raw_label.trim().to_owned(),
            symbols,
            geometry: EdgeGeometry::default(),
            source_handle: None,
            target_handle: None,
        })
    }

    /// A transition on a single symbol; needs no label validation.
    pub fn on_symbol(id: TransitionId, source: StateId, target: StateId, symbol: char) -> Self {
        Self {
            id,
            kind: TransitionKind::between(&source, &target),
            source,
            target,
            label: symbol.to_string(),
            symbols: BTreeSet::from([symbol]),
            geometry: EdgeGeometry::default(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn accepts(&self, symbol: char) -> bool {
        self.symbols.contains(&symbol)
    }

    pub fn is_self_loop(&self) -> bool {
        self.kind == TransitionKind::SelfLoop
    }

    pub fn touches(&self, state: &StateId) -> bool {
        &self.source == state || &self.target == state
    }
}

/// Split a user-entered label into its symbol set.
///
/// Entries are separated by commas and trimmed. A label that is blank as a
/// whole is [`Error::EmptyLabel`]; an empty entry inside a list or an entry
/// longer than one character is [`Error::InvalidSymbol`].
pub fn parse_symbols(raw_label: &str) -> Result<BTreeSet<char>> {
    if raw_label.trim().is_empty() {
        return Err(Error::EmptyLabel);
    }

    raw_label
        .split(',')
        .map(str::trim)
        .map(|entry| {
            let mut chars = entry.chars();
            match (chars.next(), chars.next()) {
                (Some(symbol), None) => Ok(symbol),
                _ => Err(Error::InvalidSymbol {
                    entry: entry.to_owned(),
                }),
            }
        })
        .collect()
}

/// Owns the transitions of an automaton.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionStore {
    transitions: Vec<Transition>,
    fan_out_unit: f32,
    next_seq: u64,
}

impl Default for TransitionStore {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl TransitionStore {
    /// Create an empty store spreading siblings `fan_out_unit` pixels apart.
    pub fn new(fan_out_unit: f32) -> Self {
        Self {
            transitions: Vec::new(),
            fan_out_unit,
            next_seq: 1,
        }
    }

    /// Create a transition from `source` to `target` labelled `raw_label`.
    ///
    /// Callers are responsible for `source` and `target` existing; the
    /// automaton checks that before delegating here.
    pub fn connect(&mut self, source: &StateId, target: &StateId, raw_label: &str) -> Result<TransitionId> {
        let prefix = if source == target { "self" } else { "e" };
        let id = self.fresh_id(prefix, source, target);
        let transition = Transition::new(id.clone(), source.clone(), target.clone(), raw_label)?;
        self.push(transition);
        Ok(id)
    }

    /// Add a self-loop on `state`, fanned out `spread` degrees from the
    /// state's existing self-loops.
    ///
    /// The first loop sits at -90° (top); each further loop on the same state
    /// is rotated by another `spread` degrees.
    pub fn add_self_loop(&mut self, state: &StateId, raw_label: &str, spread: f32) -> Result<TransitionId> {
        let existing = self
            .transitions
            .iter()
            .filter(|t| t.is_self_loop() && &t.source == state)
            .count();

        let id = self.fresh_id("self", state, state);
        let mut transition = Transition::new(id.clone(), state.clone(), state.clone(), raw_label)?;
        transition.geometry.loop_angle = Some(-90.0 + spread * existing as f32);
        self.push(transition);
        Ok(id)
    }

    /// Insert a fully specified transition and re-fan siblings.
    pub fn push(&mut self, transition: Transition) {
        debug!(
            transition = %transition.id,
            source = %transition.source,
            target = %transition.target,
            label = %transition.label,
            "added transition"
        );
        self.transitions.push(transition);
        self.apply_fan_out();
    }

    /// Remove a transition by ID.
    pub fn remove(&mut self, id: &TransitionId) -> Option<Transition> {
        let index = self.transitions.iter().position(|t| &t.id == id)?;
        let removed = self.transitions.remove(index);
        self.apply_fan_out();
        debug!(transition = %id, "removed transition");
        Some(removed)
    }

    /// Remove every transition leaving or entering `state`.
    pub fn remove_incident(&mut self, state: &StateId) -> Vec<Transition> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.transitions)
            .into_iter()
            .partition(|t| t.touches(state));
        self.transitions = kept;
        if !removed.is_empty() {
            self.apply_fan_out();
            debug!(state = %state, count = removed.len(), "removed incident transitions");
        }
        removed
    }

    /// Replace the label (and symbol set) of a transition.
    pub fn relabel(&mut self, id: &TransitionId, raw_label: &str) -> Result<()> {
        let symbols = parse_symbols(raw_label)?;
        let transition = self
            .get_mut(id)
            .ok_or_else(|| Error::UnknownTransition(id.clone()))?;
        transition.symbols = symbols;
        transition.label = raw_label.trim().to_owned();
        Ok(())
    }

    /// Recompute `anchor_offset` for every transition.
    ///
    /// Transitions are grouped by source and sorted by id within a group; the
    /// member at index `i` of `n` gets `(i - (n-1)/2) * unit`, so siblings are
    /// spread symmetrically around the undisplaced anchor.
    pub fn apply_fan_out(&mut self) {
        let mut groups: BTreeMap<&StateId, Vec<(&TransitionId, usize)>> = BTreeMap::new();
        for (index, t) in self.transitions.iter().enumerate() {
            groups.entry(&t.source).or_default().push((&t.id, index));
        }

        let mut offsets = vec![0.0_f32; self.transitions.len()];
        for members in groups.values_mut() {
            members.sort_by(|a, b| a.0.cmp(b.0));
            let n = members.len() as f32;
            for (rank, &(_, index)) in members.iter().enumerate() {
                offsets[index] = fan_out_offset(rank, n, self.fan_out_unit);
            }
        }

        for (t, offset) in self.transitions.iter_mut().zip(offsets) {
            t.geometry.anchor_offset = offset;
        }
    }

    /// Allocate an id `<prefix>-<source>-<target>-<seq>` not yet in the store.
    fn fresh_id(&mut self, prefix: &str, source: &StateId, target: &StateId) -> TransitionId {
        loop {
            let id = TransitionId::new(format!("{prefix}-{source}-{target}-{}", self.next_seq));
            self.next_seq += 1;
            if !self.contains(&id) {
                return id;
            }
        }
    }

    pub fn fan_out_unit(&self) -> f32 {
        self.fan_out_unit
    }

    pub fn contains(&self, id: &TransitionId) -> bool {
        self.transitions.iter().any(|t| &t.id == id)
    }

    pub fn get(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|t| &t.id == id)
    }

    /// Mutable access for geometry overrides; structure changes go through
    /// the store so fan-out stays current.
    pub fn get_mut(&mut self, id: &TransitionId) -> Option<&mut Transition> {
        self.transitions.iter_mut().find(|t| &t.id == id)
    }

    /// Transitions in store order.
    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.transitions.iter()
    }

    /// Transitions leaving `state`, in store order.
    pub fn outgoing<'a>(&'a self, state: &'a StateId) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| &t.source == state)
    }

    pub fn ids(&self) -> impl Iterator<Item = &TransitionId> + '_ {
        self.transitions.iter().map(|t| &t.id)
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Offset of the sibling at `rank` among `n` siblings.
pub fn fan_out_offset(rank: usize, n: f32, unit: f32) -> f32 {
    (rank as f32 - (n - 1.0) / 2.0) * unit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: usize) -> StateId {
        StateId::indexed(n)
    }

    // ========================================================================
    // parse_symbols()
    // ========================================================================

    #[test]
    fn test_parse_single_symbol() {
        let symbols = parse_symbols("a").unwrap();
        assert_eq!(symbols.into_iter().collect::<Vec<_>>(), vec!['a']);
    }

    #[test]
    fn test_parse_comma_list_trims() {
        let symbols = parse_symbols(" a , b,c ").unwrap();
        assert_eq!(symbols.into_iter().collect::<Vec<_>>(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_parse_blank_label_is_empty_label() {
        assert!(matches!(parse_symbols(""), Err(Error::EmptyLabel)));
        assert!(matches!(parse_symbols("   "), Err(Error::EmptyLabel)));
    }

    #[test]
    fn test_parse_empty_entry_is_invalid() {
        assert!(matches!(parse_symbols("a,,b"), Err(Error::InvalidSymbol { entry }) if entry.is_empty()));
        assert!(matches!(parse_symbols("a,"), Err(Error::InvalidSymbol { .. })));
    }

    #[test]
    fn test_on_symbol_matches_parsed_label() {
        let direct = Transition::on_symbol(TransitionId::from("t"), q(0), q(0), 'z');
        let parsed = Transition::new(TransitionId::from("t"), q(0), q(0), "z").unwrap();
        assert_eq!(direct, parsed);
        assert!(direct.is_self_loop());
    }

    #[test]
    fn test_parse_multi_char_entry_is_invalid() {
        assert!(matches!(parse_symbols("ab"), Err(Error::InvalidSymbol { entry }) if entry == "ab"));
    }

    // ========================================================================
    // connect() / add_self_loop()
    // ========================================================================

    #[test]
    fn test_connect_derives_kind() {
        let mut store = TransitionStore::default();
        let straight = store.connect(&q(0), &q(1), "a").unwrap();
        let looped = store.connect(&q(1), &q(1), "b").unwrap();

        assert_eq!(store.get(&straight).unwrap().kind, TransitionKind::Straight);
        assert_eq!(store.get(&looped).unwrap().kind, TransitionKind::SelfLoop);
        assert!(looped.as_str().starts_with("self-q1-q1-"));
    }

    #[test]
    fn test_connect_rejects_empty_label_without_side_effects() {
        let mut store = TransitionStore::default();
        assert!(matches!(store.connect(&q(0), &q(1), " "), Err(Error::EmptyLabel)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_connect_ids_are_unique() {
        let mut store = TransitionStore::default();
        let a = store.connect(&q(0), &q(1), "a").unwrap();
        let b = store.connect(&q(0), &q(1), "a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_self_loops_fan_out_sixty_degrees() {
        let mut store = TransitionStore::default();
        let first = store.add_self_loop(&q(0), "a", 60.0).unwrap();
        let second = store.add_self_loop(&q(0), "b", 60.0).unwrap();
        let other_state = store.add_self_loop(&q(1), "c", 60.0).unwrap();

        assert_eq!(store.get(&first).unwrap().geometry.loop_angle, Some(-90.0));
        assert_eq!(store.get(&second).unwrap().geometry.loop_angle, Some(-30.0));
        assert_eq!(store.get(&other_state).unwrap().geometry.loop_angle, Some(-90.0));
    }

    // ========================================================================
    // Fan-out
    // ========================================================================

    #[test]
    fn test_single_transition_has_no_offset() {
        let mut store = TransitionStore::default();
        let id = store.connect(&q(0), &q(1), "a").unwrap();
        assert_eq!(store.get(&id).unwrap().geometry.anchor_offset, 0.0);
    }

    #[test]
    fn test_fan_out_orders_by_id() {
        let mut store = TransitionStore::default();
        for (id, target) in [("e3", 1), ("e1", 2), ("e2", 1)] {
            let t = Transition::new(TransitionId::from(id), q(0), q(target), "a").unwrap();
            store.push(t);
        }

        let offset = |id: &str| store.get(&TransitionId::from(id)).unwrap().geometry.anchor_offset;
        assert_eq!(offset("e1"), -10.0);
        assert_eq!(offset("e2"), 0.0);
        assert_eq!(offset("e3"), 10.0);
    }

    #[test]
    fn test_fan_out_recomputed_after_remove() {
        let mut store = TransitionStore::default();
        let a = store.connect(&q(0), &q(1), "a").unwrap();
        let b = store.connect(&q(0), &q(2), "b").unwrap();
        assert_eq!(store.get(&b).unwrap().geometry.anchor_offset, 5.0);

        store.remove(&a);
        assert_eq!(store.get(&b).unwrap().geometry.anchor_offset, 0.0);
    }

    #[test]
    fn test_fan_out_groups_are_per_source() {
        let mut store = TransitionStore::default();
        let a = store.connect(&q(0), &q(1), "a").unwrap();
        let b = store.connect(&q(1), &q(0), "b").unwrap();
        assert_eq!(store.get(&a).unwrap().geometry.anchor_offset, 0.0);
        assert_eq!(store.get(&b).unwrap().geometry.anchor_offset, 0.0);
    }

    // ========================================================================
    // remove_incident() / relabel()
    // ========================================================================

    #[test]
    fn test_remove_incident_keeps_order_of_survivors() {
        let mut store = TransitionStore::default();
        let a = store.connect(&q(0), &q(1), "a").unwrap();
        store.connect(&q(1), &q(2), "b").unwrap();
        let c = store.connect(&q(2), &q(0), "c").unwrap();
        store.connect(&q(1), &q(1), "d").unwrap();

        let removed = store.remove_incident(&q(1));
        assert_eq!(removed.len(), 3);
        assert_eq!(store.ids().cloned().collect::<Vec<_>>(), vec![c]);
        assert!(!store.contains(&a));
    }

    #[test]
    fn test_relabel_validates() {
        let mut store = TransitionStore::default();
        let a = store.connect(&q(0), &q(1), "a").unwrap();

        store.relabel(&a, "x, y").unwrap();
        let t = store.get(&a).unwrap();
        assert_eq!(t.label, "x, y");
        assert!(t.accepts('y'));
        assert!(!t.accepts('a'));

        assert!(matches!(store.relabel(&a, ""), Err(Error::EmptyLabel)));
        assert_eq!(store.get(&a).unwrap().label, "x, y");
        assert!(matches!(
            store.relabel(&TransitionId::from("nope"), "a"),
            Err(Error::UnknownTransition(_))
        ));
    }
}
