//! Error types for editing, simulation and document import.

use crate::state::StateId;
use crate::transitions::TransitionId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Please enter a transition symbol.")]
    EmptyLabel,

    #[error("Invalid transition symbol {entry:?}: symbols are single characters separated by commas")]
    InvalidSymbol { entry: String },

    #[error("Set a start state first.")]
    NoStartState,

    #[error("Unknown state: {0}")]
    UnknownState(StateId),

    #[error("Unknown transition: {0}")]
    UnknownTransition(TransitionId),

    #[error("State {state} has no handle at index {index}")]
    UnknownHandle { state: StateId, index: usize },

    #[error("Transition {0} is not a self-loop and has no loop angle")]
    NotASelfLoop(TransitionId),

    #[error("Another drag gesture is already active")]
    DragInProgress,

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("Could not serialize document: {0}")]
    Export(#[source] serde_json::Error),

    #[error("Could not write document: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a persisted document could not be turned into an automaton.
///
/// Import never touches the live model when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Document is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Document is malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Edge {edge} references unknown state {state}")]
    DanglingReference { edge: String, state: String },

    #[error("Start state {0} is not one of the document's nodes")]
    UnknownStartState(String),

    #[error("Accepting state {0} is not one of the document's nodes")]
    UnknownAcceptingState(String),

    #[error("State {0} appears more than once")]
    DuplicateState(String),

    #[error("Edge {0} appears more than once")]
    DuplicateTransition(String),

    #[error("Edge {edge} has an invalid label: {source}")]
    InvalidLabel {
        edge: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Could not read document: {0}")]
    Io(#[from] std::io::Error),
}
