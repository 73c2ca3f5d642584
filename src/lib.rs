//! # DFA Canvas
//!
//! The core of an interactive deterministic finite automaton editor: the
//! automaton model, the curve geometry of its edges, drag editing of those
//! curves, and string simulation.
//!
//! ## Features
//!
//! - **Automaton model** - States with start/accepting marks, transitions with
//!   comma-separated symbol labels, cascading deletes
//! - **Edge geometry** - Pure functions from (state, transition) to cubic
//!   bezier curves, with sibling fan-out and self-loops
//! - **Drag editing** - Control point and loop angle handles with a draft
//!   value that commits on release
//! - **Simulation** - First-match deterministic walk with path diagnostics
//! - **Persistence** - The `.efn` JSON document format
//! - **Slint host** - A ready-made canvas host backed by a `VecModel`
//!
//! ## Quick Start
//!
//! ```
//! use dfa_canvas::{Automaton, StateId};
//!
//! let mut automaton = Automaton::example();
//! let q1 = StateId::from("q1");
//! automaton.add_self_loop(&q1, "a", 60.0).unwrap();
//!
//! let outcome = automaton.simulate("aaa").unwrap();
//! assert!(outcome.is_accepted());
//! assert_eq!(outcome.to_string(), "Accepted! Ended in q1 (Path: q0->q1->q1->q1)");
//! ```
//!
//! ## Rust Helpers
//!
//! - [`EditorController`] - Wires the model to a [`CanvasHost`] and provides
//!   Slint callback implementations
//! - [`edge_curve`] - Compute the curve of any transition
//! - [`find_edge_at`] / [`find_edge_handle_at`] - Hit testing in model space
//! - [`DragSession`] - The drag state machine
//! - [`simulate`] - Run an input string
//! - [`persistence`] - Import and export documents

pub mod config;
pub mod controller;
pub mod drag;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod host;
pub mod path;
pub mod persistence;
pub mod selection;
pub mod simulation;
pub mod state;
pub mod transitions;

pub use config::EditorConfig;
pub use controller::{EditorController, Pulse};
pub use drag::{DragSession, DragTarget, EdgeHandle};
pub use error::{Error, ImportError, Result};
pub use geometry::{edge_curve, label_anchor, loop_handle_point, self_loop, straight_edge};
pub use graph::{
    Ambiguity, Automaton,
    // Transition validation framework
    CompositeValidator, Deterministic, TransitionValidator, ValidationError, ValidationResult, WellFormed,
};
pub use hit_test::{find_edge_at, find_edge_handle_at, find_state_at, find_state_handle_at};
pub use host::{CanvasHost, CaptureGuard, CoordinateTransform, EdgeView, PointerCapture, SlintCanvas, Viewport};
pub use path::{generate_partial_bezier_path, CubicBezier, Point};
pub use persistence::{load_from_path, save_to_path, Document};
pub use selection::EdgeSelection;
pub use simulation::{simulate, simulate_with, SimulationOutcome};
pub use state::{State, StateId, StateRegistry};
pub use transitions::{EdgeGeometry, Transition, TransitionId, TransitionKind, TransitionStore};
