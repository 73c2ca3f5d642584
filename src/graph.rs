use crate::error::{Error, Result};
use crate::path::Point;
use crate::state::{State, StateId, StateRegistry};
use crate::transitions::{Transition, TransitionId, TransitionStore};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// The whole editable automaton: states plus transitions.
///
/// Every mutation that touches both halves (state removal, connecting) goes
/// through this type so the model never exposes an intermediate state where a
/// transition references a missing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Automaton {
    states: StateRegistry,
    transitions: TransitionStore,
}

impl Automaton {
    /// Create an empty automaton whose sibling transitions spread `fan_out_unit` apart.
    pub fn new(fan_out_unit: f32) -> Self {
        Self {
            states: StateRegistry::new(),
            transitions: TransitionStore::new(fan_out_unit),
        }
    }

    /// The three-state example shown when the editor opens.
    ///
    /// `q0 --a--> q1`, `q0 --b--> q2`, start `q0`, accepting `{q1, q2}`.
    pub fn example() -> Self {
        let states = [(0, 100.0), (1, 250.0), (2, 400.0)]
            .into_iter()
            .map(|(n, x)| {
                let mut state = State::new(StateId::indexed(n), Point::new(x, 150.0));
                state.is_final = n != 0;
                state
            })
            .collect();

        let mut transitions = TransitionStore::default();
        for (id, target, symbol) in [("e1", 1, 'a'), ("e2", 2, 'b')] {
            transitions.push(Transition::on_symbol(
                TransitionId::from(id),
                StateId::indexed(0),
                StateId::indexed(target),
                symbol,
            ));
        }

        Self {
            states: StateRegistry::from_states(states, Some(StateId::indexed(0))),
            transitions,
        }
    }

    /// Assemble an automaton from parts that were validated elsewhere (import).
    pub(crate) fn from_parts(states: StateRegistry, transitions: TransitionStore) -> Self {
        let mut automaton = Self { states, transitions };
        automaton.transitions.apply_fan_out();
        automaton
    }

    pub fn states(&self) -> &StateRegistry {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut StateRegistry {
        &mut self.states
    }

    pub fn transitions(&self) -> &TransitionStore {
        &self.transitions
    }

    pub fn transitions_mut(&mut self) -> &mut TransitionStore {
        &mut self.transitions
    }

    pub fn start_state(&self) -> Option<&StateId> {
        self.states.start()
    }

    pub fn is_accepting(&self, id: &StateId) -> bool {
        self.states.is_accepting(id)
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.add_state()
    }

    /// Remove a state and everything that refers to it, in one step.
    ///
    /// Incident transitions, accepting membership and the start mark (when it
    /// pointed at `id`) all go with it. Returns the removed transitions.
    pub fn remove_state(&mut self, id: &StateId) -> Result<Vec<Transition>> {
        self.states
            .remove(id)
            .ok_or_else(|| Error::UnknownState(id.clone()))?;
        let removed = self.transitions.remove_incident(id);
        info!(state = %id, transitions = removed.len(), "removed state");
        Ok(removed)
    }

    pub fn toggle_accepting(&mut self, id: &StateId) -> Result<bool> {
        self.states.toggle_accepting(id)
    }

    pub fn set_start_state(&mut self, id: Option<StateId>) -> Result<()> {
        self.states.set_start(id)
    }

    pub fn rotate_handle(&mut self, id: &StateId, index: usize, angle_deg: f32) -> Result<()> {
        self.states.rotate_handle(id, index, angle_deg)
    }

    pub fn move_state(&mut self, id: &StateId, position: Point) -> Result<()> {
        self.states.move_state(id, position)
    }

    /// Connect two existing states with a labelled transition.
    ///
    /// `source == target` yields a self-loop whose loop angle defaults to the
    /// state's first handle.
    pub fn connect(&mut self, source: &StateId, target: &StateId, raw_label: &str) -> Result<TransitionId> {
        self.require_state(source)?;
        self.require_state(target)?;
        self.transitions.connect(source, target, raw_label)
    }

    /// Like [`connect`](Self::connect), remembering which handles the user
    /// dragged between.
    pub fn connect_handles(
        &mut self,
        source: &StateId,
        source_handle: Option<usize>,
        target: &StateId,
        target_handle: Option<usize>,
        raw_label: &str,
    ) -> Result<TransitionId> {
        let id = self.connect(source, target, raw_label)?;
        if let Some(t) = self.transitions.get_mut(&id) {
            t.source_handle = source_handle;
            t.target_handle = target_handle;
        }
        Ok(id)
    }

    /// Add a self-loop on `state`, rotated `spread` degrees past any existing ones.
    pub fn add_self_loop(&mut self, state: &StateId, raw_label: &str, spread: f32) -> Result<TransitionId> {
        self.require_state(state)?;
        self.transitions.add_self_loop(state, raw_label, spread)
    }

    pub fn remove_transition(&mut self, id: &TransitionId) -> Result<Transition> {
        self.transitions
            .remove(id)
            .ok_or_else(|| Error::UnknownTransition(id.clone()))
    }

    pub fn relabel(&mut self, id: &TransitionId, raw_label: &str) -> Result<()> {
        self.transitions.relabel(id, raw_label)
    }

    /// Every (state, symbol) pair with more than one outgoing transition.
    ///
    /// The model accepts such overlaps; simulation resolves them by taking the
    /// first match in store order. This report lets a UI warn about them.
    pub fn ambiguities(&self) -> Vec<Ambiguity> {
        let mut seen: BTreeMap<(&StateId, char), Vec<TransitionId>> = BTreeMap::new();
        for t in self.transitions.iter() {
            for &symbol in &t.symbols {
                seen.entry((&t.source, symbol)).or_default().push(t.id.clone());
            }
        }

        seen.into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((state, symbol), transitions)| Ambiguity {
                state: state.clone(),
                symbol,
                transitions,
            })
            .collect()
    }

    /// Check a prospective transition against `validator` without adding it.
    pub fn validate_transition<V>(&self, source: &StateId, target: &StateId, raw_label: &str, validator: &V) -> ValidationResult
    where
        V: TransitionValidator + ?Sized,
    {
        validator.validate(source, target, raw_label, self)
    }

    fn require_state(&self, id: &StateId) -> Result<()> {
        if self.states.contains(id) {
            Ok(())
        } else {
            debug!(state = %id, "rejected edit on unknown state");
            Err(Error::UnknownState(id.clone()))
        }
    }
}

/// A (state, symbol) pair that more than one transition could consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub state: StateId,
    pub symbol: char,
    /// Competing transitions in store order; the first one wins.
    pub transitions: Vec<TransitionId>,
}

// ============================================================================
// Transition Validation Framework
// ============================================================================

/// Result of transition validation with optional rejection reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Combine two results (AND logic): returns first error if any
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => other,
            invalid => invalid,
        }
    }
}

/// Reasons why a prospective transition was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    StateNotFound(StateId),
    EmptyLabel,
    InvalidSymbol(String),
    /// `symbol` already leaves `state` through another transition
    Nondeterministic { state: StateId, symbol: char },
    Custom(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateNotFound(id) => write!(f, "State {} not found", id),
            Self::EmptyLabel => write!(f, "Please enter a transition symbol."),
            Self::InvalidSymbol(entry) => write!(f, "Invalid transition symbol {:?}", entry),
            Self::Nondeterministic { state, symbol } => {
                write!(f, "{} already has a transition on '{}'", state, symbol)
            }
            Self::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

/// Trait for custom transition validation logic.
///
/// Implement this to add rules for what the editor's connect dialog accepts.
/// Compose several with [`CompositeValidator`].
pub trait TransitionValidator {
    fn validate(&self, source: &StateId, target: &StateId, raw_label: &str, automaton: &Automaton) -> ValidationResult;
}

/// Default validator: both states exist and the label parses.
///
/// This is exactly what [`Automaton::connect`] enforces.
#[derive(Clone, Copy, Debug, Default)]
pub struct WellFormed;

impl TransitionValidator for WellFormed {
    fn validate(&self, source: &StateId, target: &StateId, raw_label: &str, automaton: &Automaton) -> ValidationResult {
        for id in [source, target] {
            if !automaton.states().contains(id) {
                return ValidationResult::Invalid(ValidationError::StateNotFound(id.clone()));
            }
        }

        match crate::transitions::parse_symbols(raw_label) {
            Ok(_) => ValidationResult::Valid,
            Err(Error::InvalidSymbol { entry }) => ValidationResult::Invalid(ValidationError::InvalidSymbol(entry)),
            Err(_) => ValidationResult::Invalid(ValidationError::EmptyLabel),
        }
    }
}

/// Opt-in validator refusing a second transition on the same (state, symbol).
///
/// Not applied by the model itself; overlapping transitions are legal and
/// resolved first-match at simulation time.
#[derive(Clone, Copy, Debug, Default)]
pub struct Deterministic;

impl TransitionValidator for Deterministic {
    fn validate(&self, source: &StateId, _target: &StateId, raw_label: &str, automaton: &Automaton) -> ValidationResult {
        let Ok(symbols) = crate::transitions::parse_symbols(raw_label) else {
            return ValidationResult::Valid;
        };

        for t in automaton.transitions().outgoing(source) {
            if let Some(&symbol) = symbols.iter().find(|s| t.accepts(**s)) {
                return ValidationResult::Invalid(ValidationError::Nondeterministic {
                    state: source.clone(),
                    symbol,
                });
            }
        }
        ValidationResult::Valid
    }
}

/// Composite validator that combines multiple validators
///
/// All validators must return Valid (AND logic); the first error wins.
#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Box<dyn TransitionValidator>>,
}

impl CompositeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator; validators run in the order they were added.
    pub fn add<V: TransitionValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }
}

impl TransitionValidator for CompositeValidator {
    fn validate(&self, source: &StateId, target: &StateId, raw_label: &str, automaton: &Automaton) -> ValidationResult {
        for v in &self.validators {
            let result = v.validate(source, target, raw_label, automaton);
            if !result.is_valid() {
                return result;
            }
        }
        ValidationResult::Valid
    }
}
