//! Common test utilities for integration tests.

#![allow(dead_code)]

use dfa_canvas::{
    CanvasHost, CaptureGuard, CoordinateTransform, EdgeView, EditorController, Point, PointerCapture, TransitionId,
    Viewport,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Canvas host that records every interaction with the editor.
#[derive(Default)]
pub struct RecordingHost {
    viewport: Cell<Viewport>,
    /// Number of pointer captures taken
    pub captures: Cell<usize>,
    /// Number of pointer captures released
    pub releases: Rc<Cell<usize>>,
    /// Every edge batch pushed by the controller
    pub batches: RefCell<Vec<Vec<EdgeView>>>,
}

struct CountingCapture(Rc<Cell<usize>>);

impl PointerCapture for CountingCapture {
    fn release(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_viewport(&self, zoom: f32, pan_x: f32, pan_y: f32) {
        self.viewport.set(Viewport::new(zoom, pan_x, pan_y));
    }

    pub fn model_to_screen(&self, point: Point) -> Point {
        self.viewport.get().model_to_screen(point)
    }

    /// Captures currently held.
    pub fn active_captures(&self) -> usize {
        self.captures.get() - self.releases.get()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.borrow().len()
    }

    /// The most recent edge batch (empty if none was pushed).
    pub fn last_batch(&self) -> Vec<EdgeView> {
        self.batches.borrow().last().cloned().unwrap_or_default()
    }

    /// The view of `id` in the most recent batch.
    pub fn last_view(&self, id: &str) -> EdgeView {
        self.last_batch()
            .into_iter()
            .find(|v| v.id == TransitionId::from(id))
            .unwrap_or_else(|| panic!("edge {id} missing from last batch"))
    }
}

impl CoordinateTransform for RecordingHost {
    fn screen_to_model(&self, screen: Point) -> Point {
        self.viewport.get().screen_to_model(screen)
    }
}

impl CanvasHost for RecordingHost {
    fn capture_pointer(&self) -> CaptureGuard {
        self.captures.set(self.captures.get() + 1);
        CaptureGuard::new(Box::new(CountingCapture(self.releases.clone())))
    }

    fn replace_edges(&self, edges: &[EdgeView]) {
        self.batches.borrow_mut().push(edges.to_vec());
    }
}

/// A controller on the example automaton with a recording host, edges
/// already pushed once.
pub fn setup() -> (EditorController, Rc<RecordingHost>) {
    let host = Rc::new(RecordingHost::new());
    let ctrl = EditorController::new(host.clone());
    ctrl.refresh_edges();
    (ctrl, host)
}

pub fn approx(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
}
