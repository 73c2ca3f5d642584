//! Deterministic walk of an input string over the automaton.
//!
//! For each character the first outgoing transition (in store order) whose
//! symbol set contains it is taken. Overlapping transitions are legal; see
//! [`Automaton::ambiguities`] for a report of where that tie-break applies.

use crate::error::{Error, Result};
use crate::graph::Automaton;
use crate::state::StateId;
use crate::transitions::Transition;
use std::fmt;
use tracing::debug;

/// Result of running an input string.
///
/// A rejection is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    Accepted {
        state: StateId,
        path: Vec<StateId>,
    },
    Rejected {
        /// The state the walk stopped in.
        state: StateId,
        path: Vec<StateId>,
        /// The character with no matching transition, or `None` when the
        /// input was consumed but ended in a non-accepting state.
        symbol: Option<char>,
    },
}

impl SimulationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SimulationOutcome::Accepted { .. })
    }

    /// The state the walk ended (or got stuck) in.
    pub fn state(&self) -> &StateId {
        match self {
            SimulationOutcome::Accepted { state, .. } | SimulationOutcome::Rejected { state, .. } => state,
        }
    }

    /// Visited states, starting with the start state.
    pub fn path(&self) -> &[StateId] {
        match self {
            SimulationOutcome::Accepted { path, .. } | SimulationOutcome::Rejected { path, .. } => path,
        }
    }
}

struct JoinedPath<'a>(&'a [StateId]);

impl fmt::Display for JoinedPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("->")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SimulationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationOutcome::Accepted { state, path } => {
                write!(f, "Accepted! Ended in {state} (Path: {})", JoinedPath(path))
            }
            SimulationOutcome::Rejected {
                state,
                path,
                symbol: Some(symbol),
            } => write!(
                f,
                "Rejected at {state} (Path: {}): No transition for '{symbol}'",
                JoinedPath(path)
            ),
            SimulationOutcome::Rejected {
                state,
                path,
                symbol: None,
            } => write!(
                f,
                "Rejected: Ended in non-final state {state} (Path: {})",
                JoinedPath(path)
            ),
        }
    }
}

/// Run `input` (whitespace-trimmed) from the start state.
pub fn simulate(automaton: &Automaton, input: &str) -> Result<SimulationOutcome> {
    simulate_with(automaton, input, |_| {})
}

/// Like [`simulate`], calling `on_self_loop` each time a self-loop is taken.
///
/// The callback is the hook renderers use to animate a traversal pulse; it
/// has no influence on the outcome.
pub fn simulate_with<F>(automaton: &Automaton, input: &str, mut on_self_loop: F) -> Result<SimulationOutcome>
where
    F: FnMut(&Transition),
{
    let start = automaton.start_state().ok_or(Error::NoStartState)?;
    let mut current = start.clone();
    let mut path = vec![current.clone()];

    for ch in input.trim().chars() {
        let Some(transition) = automaton
            .transitions()
            .iter()
            .find(|t| t.source == current && t.accepts(ch))
        else {
            debug!(state = %current, symbol = %ch, "no transition");
            return Ok(SimulationOutcome::Rejected {
                state: current,
                path,
                symbol: Some(ch),
            });
        };

        if transition.is_self_loop() {
            on_self_loop(transition);
        }
        current = transition.target.clone();
        path.push(current.clone());
    }

    let outcome = if automaton.is_accepting(&current) {
        SimulationOutcome::Accepted { state: current, path }
    } else {
        SimulationOutcome::Rejected {
            state: current,
            path,
            symbol: None,
        }
    };
    debug!(accepted = outcome.is_accepted(), steps = outcome.path().len() - 1, "simulation finished");
    Ok(outcome)
}

impl Automaton {
    /// Shorthand for [`simulate`].
    pub fn simulate(&self, input: &str) -> Result<SimulationOutcome> {
        simulate(self, input)
    }
}
