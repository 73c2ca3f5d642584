//! High-level controller wiring the automaton to a canvas host.
//!
//! The [`EditorController`] owns the automaton, the drag session, the edge
//! selection and the pending traversal pulses, and pushes a fresh edge list
//! to the host after every change.
//!
//! # Example
//!
//! ```ignore
//! use dfa_canvas::{EditorController, EdgeView, SlintCanvas};
//! use std::rc::Rc;
//!
//! slint::include_modules!();
//!
//! fn main() {
//!     let window = MainWindow::new().unwrap();
//!     let canvas = Rc::new(SlintCanvas::new(|e: &EdgeView| EdgeData {
//!         id: e.id.as_str().into(),
//!         path: e.path_commands.as_str().into(),
//!         label: e.label.as_str().into(),
//!         label_x: e.label_anchor.x,
//!         label_y: e.label_anchor.y,
//!         handles_visible: e.handles_visible,
//!     }));
//!     window.set_edges(canvas.model());
//!
//!     let ctrl = EditorController::new(canvas.clone());
//!
//!     window.on_pointer_down(ctrl.pointer_down_callback());
//!     window.on_pointer_move(ctrl.pointer_move_callback());
//!     window.on_pointer_up(ctrl.pointer_up_callback());
//!     window.on_rotate_handle(ctrl.rotate_handle_callback());
//!     window.on_simulate(ctrl.simulate_callback());
//!
//!     window.on_viewport_changed({
//!         let canvas = canvas.clone();
//!         move |zoom, pan_x, pan_y| canvas.set_viewport(zoom, pan_x, pan_y)
//!     });
//!
//!     ctrl.refresh_edges();
//!     window.run().unwrap();
//!     ctrl.teardown();
//! }
//! ```

use crate::config::EditorConfig;
use crate::drag::{DragSession, EdgeHandle};
use crate::error::{Error, Result};
use crate::geometry::{edge_curve, label_anchor, loop_handle_point};
use crate::graph::Automaton;
use crate::hit_test::{find_edge_at, find_edge_handle_at};
use crate::host::{CanvasHost, EdgeView};
use crate::path::{ease_in_out_cubic, generate_partial_bezier_path, Point};
use crate::persistence;
use crate::selection::EdgeSelection;
use crate::simulation::{simulate_with, SimulationOutcome};
use crate::state::StateId;
use crate::transitions::{Transition, TransitionId};
use slint::SharedString;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// A self-loop traversal waiting to be animated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulse {
    pub edge: TransitionId,
    /// Position of this pulse among the pulses of one simulation run.
    pub order: usize,
}

/// Controller that manages editor state and provides callback implementations.
///
/// Clone this controller to share it across callbacks.
#[derive(Clone)]
pub struct EditorController {
    automaton: Rc<RefCell<Automaton>>,
    drag: Rc<RefCell<DragSession>>,
    selection: Rc<RefCell<EdgeSelection>>,
    config: Rc<RefCell<EditorConfig>>,
    pulses: Rc<RefCell<Vec<Pulse>>>,
    host: Rc<dyn CanvasHost>,
}

impl EditorController {
    /// Create a controller showing the example automaton.
    pub fn new(host: Rc<dyn CanvasHost>) -> Self {
        Self::with_automaton(host, Automaton::example(), EditorConfig::default())
    }

    pub fn with_automaton(host: Rc<dyn CanvasHost>, automaton: Automaton, config: EditorConfig) -> Self {
        Self {
            automaton: Rc::new(RefCell::new(automaton)),
            drag: Rc::new(RefCell::new(DragSession::new())),
            selection: Rc::new(RefCell::new(EdgeSelection::new())),
            config: Rc::new(RefCell::new(config)),
            pulses: Rc::new(RefCell::new(Vec::new())),
            host,
        }
    }

    /// Get access to the automaton.
    ///
    /// Call [`refresh_edges`](Self::refresh_edges) after mutating it directly.
    pub fn automaton(&self) -> Rc<RefCell<Automaton>> {
        self.automaton.clone()
    }

    pub fn config(&self) -> EditorConfig {
        self.config.borrow().clone()
    }

    /// Replace the visual constants and redraw.
    pub fn set_config(&self, config: EditorConfig) {
        *self.config.borrow_mut() = config;
        self.refresh_edges();
    }

    /// Set the state circle radius (default: 30.0).
    pub fn set_state_radius(&self, radius: f32) {
        self.config.borrow_mut().state_radius = radius;
        self.refresh_edges();
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.borrow().is_dragging()
    }

    pub fn selected_edges(&self) -> Vec<TransitionId> {
        self.selection.borrow().sorted()
    }

    pub fn hovered_edge(&self) -> Option<TransitionId> {
        self.selection.borrow().hovered().cloned()
    }

    // === Editing ===

    pub fn add_state(&self) -> StateId {
        let id = self.automaton.borrow_mut().add_state();
        self.refresh_edges();
        id
    }

    /// Remove a state with its transitions; returns the removed transitions.
    pub fn remove_state(&self, id: &StateId) -> Result<Vec<Transition>> {
        let removed = self.automaton.borrow_mut().remove_state(id)?;
        self.prune_selection();
        self.refresh_edges();
        Ok(removed)
    }

    pub fn toggle_accepting(&self, id: &StateId) -> Result<bool> {
        self.automaton.borrow_mut().toggle_accepting(id)
    }

    pub fn set_start_state(&self, id: Option<StateId>) -> Result<()> {
        self.automaton.borrow_mut().set_start_state(id)
    }

    pub fn move_state(&self, id: &StateId, x: f32, y: f32) -> Result<()> {
        self.automaton.borrow_mut().move_state(id, Point::new(x, y))?;
        self.refresh_edges();
        Ok(())
    }

    pub fn rotate_handle(&self, id: &StateId, index: usize, angle_deg: f32) -> Result<()> {
        self.automaton.borrow_mut().rotate_handle(id, index, angle_deg)?;
        self.refresh_edges();
        Ok(())
    }

    pub fn connect(&self, source: &StateId, target: &StateId, raw_label: &str) -> Result<TransitionId> {
        let id = self.automaton.borrow_mut().connect(source, target, raw_label)?;
        self.refresh_edges();
        Ok(id)
    }

    pub fn connect_handles(
        &self,
        source: &StateId,
        source_handle: Option<usize>,
        target: &StateId,
        target_handle: Option<usize>,
        raw_label: &str,
    ) -> Result<TransitionId> {
        let id = self
            .automaton
            .borrow_mut()
            .connect_handles(source, source_handle, target, target_handle, raw_label)?;
        self.refresh_edges();
        Ok(id)
    }

    /// Add a self-loop, spread away from the state's existing loops.
    pub fn add_self_loop(&self, state: &StateId, raw_label: &str) -> Result<TransitionId> {
        let spread = self.config.borrow().self_loop_spread;
        let id = self.automaton.borrow_mut().add_self_loop(state, raw_label, spread)?;
        self.refresh_edges();
        Ok(id)
    }

    pub fn remove_transition(&self, id: &TransitionId) -> Result<Transition> {
        let removed = self.automaton.borrow_mut().remove_transition(id)?;
        self.prune_selection();
        self.refresh_edges();
        Ok(removed)
    }

    pub fn relabel(&self, id: &TransitionId, raw_label: &str) -> Result<()> {
        self.automaton.borrow_mut().relabel(id, raw_label)?;
        self.refresh_edges();
        Ok(())
    }

    fn prune_selection(&self) {
        let automaton = self.automaton.borrow();
        self.selection
            .borrow_mut()
            .retain(|id| automaton.transitions().contains(id));
    }

    // === Rendering ===

    /// Compute what the renderer needs for every edge, drafts applied.
    pub fn edge_views(&self) -> Vec<EdgeView> {
        let automaton = self.automaton.borrow();
        let drag = self.drag.borrow();
        let selection = self.selection.borrow();
        let config = self.config.borrow();

        automaton
            .transitions()
            .iter()
            .filter_map(|t| {
                let curve = drag.overlay(&t.id, edge_curve(&automaton, t, &config)?);
                let mut handles = vec![(EdgeHandle::C1, curve.p1), (EdgeHandle::C2, curve.p2)];
                if t.is_self_loop() {
                    let state = automaton.states().get(&t.source)?;
                    handles.push((EdgeHandle::LoopAngle, loop_handle_point(state, t, &config)));
                }

                Some(EdgeView {
                    id: t.id.clone(),
                    kind: t.kind,
                    label: t.label.clone(),
                    path_commands: curve.to_svg_path(),
                    label_anchor: label_anchor(&curve),
                    handles_visible: selection.handles_visible(&t.id, drag.is_dragging_edge(&t.id)),
                    handles,
                    curve,
                })
            })
            .collect()
    }

    /// Push the current edge list to the host in one batch.
    pub fn refresh_edges(&self) {
        let views = self.edge_views();
        self.host.replace_edges(&views);
    }

    // === Pointer input (screen coordinates) ===

    /// Press: start a handle drag, else select the edge under the pointer,
    /// else clear the selection.
    pub fn pointer_down(&self, x: f32, y: f32, shift_held: bool) -> Result<()> {
        if self.is_dragging() {
            return Err(Error::DragInProgress);
        }

        let point = self.host.screen_to_model(Point::new(x, y));
        let views = self.edge_views();
        let config = self.config();

        if let Some((edge, handle)) = find_edge_handle_at(point, &views, config.handle_hit_radius) {
            self.drag
                .borrow_mut()
                .begin_edge(&self.automaton.borrow(), &edge, handle, self.host.as_ref(), &config)?;
        } else if let Some(edge) = find_edge_at(
            point,
            views.iter().map(|v| (&v.id, &v.curve)),
            config.edge_hover_distance,
            config.hit_samples,
        ) {
            self.selection.borrow_mut().handle_interaction(&edge, shift_held);
        } else if !shift_held {
            self.selection.borrow_mut().clear();
        }

        self.refresh_edges();
        Ok(())
    }

    /// Start rotating a state's handle; the UI calls this from the handle's
    /// rotate knob.
    pub fn begin_handle_rotation(&self, state: &StateId, index: usize) -> Result<()> {
        self.drag
            .borrow_mut()
            .begin_state_handle(&self.automaton.borrow(), state, index, self.host.as_ref())
    }

    /// Move: feed the active drag, or update the hovered edge.
    pub fn pointer_move(&self, x: f32, y: f32) {
        let screen = Point::new(x, y);

        let changed = if self.is_dragging() {
            let config = self.config.borrow();
            self.drag.borrow_mut().pointer_move(
                screen,
                self.host.as_ref(),
                &mut self.automaton.borrow_mut(),
                &config,
            )
        } else {
            let point = self.host.screen_to_model(screen);
            let config = self.config();
            let hovered = find_edge_at(
                point,
                self.edge_views().iter().map(|v| (&v.id, &v.curve)),
                config.edge_hover_distance,
                config.hit_samples,
            );
            self.selection.borrow_mut().set_hovered(hovered)
        };

        if changed {
            self.refresh_edges();
        }
    }

    /// Release: commit the active drag, if any.
    pub fn pointer_up(&self) {
        let ended = self.drag.borrow_mut().pointer_up(&mut self.automaton.borrow_mut());
        if ended.is_some() {
            self.refresh_edges();
        }
    }

    /// Drop any in-progress drag without committing, releasing the pointer.
    ///
    /// Call when the editor is closed.
    pub fn teardown(&self) {
        if self.is_dragging() {
            debug!("abandoning drag on teardown");
        }
        *self.drag.borrow_mut() = DragSession::new();
    }

    // === Simulation ===

    /// Run `input`, queueing a pulse for every self-loop taken.
    pub fn simulate(&self, input: &str) -> Result<SimulationOutcome> {
        let mut pulses = Vec::new();
        let outcome = simulate_with(&self.automaton.borrow(), input, |t| {
            pulses.push(Pulse {
                edge: t.id.clone(),
                order: pulses.len(),
            });
        })?;
        *self.pulses.borrow_mut() = pulses;
        Ok(outcome)
    }

    /// Take the pulses queued by the last simulation.
    pub fn take_pulses(&self) -> Vec<Pulse> {
        std::mem::take(&mut *self.pulses.borrow_mut())
    }

    /// Partial path of a pulse `elapsed_ms` into its animation.
    ///
    /// Progress follows an ease-in-out cubic over `pulse_duration_ms`.
    pub fn pulse_path(&self, edge: &TransitionId, elapsed_ms: u64) -> Option<String> {
        let automaton = self.automaton.borrow();
        let config = self.config.borrow();
        let transition = automaton.transitions().get(edge)?;
        let curve = edge_curve(&automaton, transition, &config)?;

        let duration = config.pulse_duration_ms.max(1) as f32;
        let progress = ease_in_out_cubic(elapsed_ms as f32 / duration);
        Some(generate_partial_bezier_path(&curve, progress))
    }

    // === Persistence ===

    pub fn export_json(&self) -> Result<String> {
        persistence::to_json(&self.automaton.borrow())
    }

    /// Replace the automaton with the one in `json`.
    ///
    /// On error the current automaton is left untouched.
    pub fn import_json(&self, json: &str) -> Result<()> {
        let unit = self.automaton.borrow().transitions().fan_out_unit();
        let automaton = persistence::from_json(json, unit)?;
        self.replace_automaton(automaton);
        Ok(())
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::save_to_path(&self.automaton.borrow(), path)
    }

    /// Load an `.efn` file, leaving the current automaton untouched on error.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let unit = self.automaton.borrow().transitions().fan_out_unit();
        let automaton = persistence::load_from_path(path, unit)?;
        self.replace_automaton(automaton);
        Ok(())
    }

    fn replace_automaton(&self, automaton: Automaton) {
        self.teardown();
        *self.automaton.borrow_mut() = automaton;
        self.selection.borrow_mut().clear();
        self.selection.borrow_mut().set_hovered(None);
        self.pulses.borrow_mut().clear();
        info!("automaton replaced");
        self.refresh_edges();
    }

    // === Callback factories ===

    /// Returns a callback for `pointer-down(x, y, shift)`.
    pub fn pointer_down_callback(&self) -> impl Fn(f32, f32, bool) {
        let ctrl = self.clone();
        move |x, y, shift| {
            if let Err(e) = ctrl.pointer_down(x, y, shift) {
                warn!(error = %e, "pointer down ignored");
            }
        }
    }

    /// Returns a callback for `pointer-move(x, y)`.
    pub fn pointer_move_callback(&self) -> impl Fn(f32, f32) {
        let ctrl = self.clone();
        move |x, y| ctrl.pointer_move(x, y)
    }

    /// Returns a callback for `pointer-up()`.
    pub fn pointer_up_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || ctrl.pointer_up()
    }

    /// Returns a callback for `rotate-handle(state-id, index, angle)`.
    ///
    /// One callback serves every state: the id is resolved when the callback
    /// fires, so states created or imported later need no extra wiring.
    pub fn rotate_handle_callback(&self) -> impl Fn(SharedString, i32, f32) {
        let ctrl = self.clone();
        move |id, index, angle| {
            let Ok(index) = usize::try_from(index) else {
                warn!(state = %id, index, "negative handle index");
                return;
            };
            if let Err(e) = ctrl.rotate_handle(&StateId::from(id.as_str()), index, angle) {
                warn!(error = %e, "handle rotation ignored");
            }
        }
    }

    /// Returns a callback for `begin-handle-rotation(state-id, index)`.
    pub fn begin_handle_rotation_callback(&self) -> impl Fn(SharedString, i32) {
        let ctrl = self.clone();
        move |id, index| {
            let Ok(index) = usize::try_from(index) else {
                warn!(state = %id, index, "negative handle index");
                return;
            };
            if let Err(e) = ctrl.begin_handle_rotation(&StateId::from(id.as_str()), index) {
                warn!(error = %e, "handle rotation not started");
            }
        }
    }

    /// Returns a callback for `simulate(input) -> message`.
    pub fn simulate_callback(&self) -> impl Fn(SharedString) -> SharedString {
        let ctrl = self.clone();
        move |input| match ctrl.simulate(&input) {
            Ok(outcome) => outcome.to_string().into(),
            Err(e) => e.to_string().into(),
        }
    }

    /// Returns a callback for `pulse-path(edge-id, elapsed-ms) -> path`.
    pub fn pulse_path_callback(&self) -> impl Fn(SharedString, i32) -> SharedString {
        let ctrl = self.clone();
        move |id, elapsed| {
            let elapsed = u64::try_from(elapsed).unwrap_or(0);
            ctrl.pulse_path(&TransitionId::from(id.as_str()), elapsed)
                .unwrap_or_default()
                .into()
        }
    }
}
