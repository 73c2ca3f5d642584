//! The narrow interface to the canvas that hosts the editor.
//!
//! The core never owns pan/zoom. It asks the host to convert pointer
//! positions into model space, to capture the pointer for the duration of a
//! drag, and to replace its rendered edge list in one batch.
//!
//! [`Viewport`] is the usual screen↔model mapping for hosts that report
//! zoom and pan, and [`SlintCanvas`] is a ready-made host backed by a Slint
//! `VecModel`.

use crate::path::{CubicBezier, Point};
use crate::transitions::{TransitionId, TransitionKind};
use slint::{Model, ModelRc, VecModel};
use std::cell::Cell;
use std::rc::Rc;

/// Screen → model coordinate conversion.
pub trait CoordinateTransform {
    fn screen_to_model(&self, screen: Point) -> Point;
}

/// A pointer capture held by an in-progress drag.
///
/// Released exactly once, when the owning [`CaptureGuard`] drops.
pub trait PointerCapture {
    fn release(&mut self);
}

/// Scoped ownership of a [`PointerCapture`].
///
/// Dropping the guard releases the capture, whether the drag ended with a
/// pointer-up or the editor was torn down mid-gesture.
pub struct CaptureGuard {
    capture: Option<Box<dyn PointerCapture>>,
}

impl CaptureGuard {
    pub fn new(capture: Box<dyn PointerCapture>) -> Self {
        Self { capture: Some(capture) }
    }

    /// A guard that holds nothing; for hosts without global listeners.
    pub fn none() -> Self {
        Self { capture: None }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.release();
        }
    }
}

impl std::fmt::Debug for CaptureGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureGuard")
            .field("held", &self.capture.is_some())
            .finish()
    }
}

/// Everything the renderer needs to draw one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    pub id: TransitionId,
    pub kind: TransitionKind,
    pub label: String,
    /// The curve, with any in-progress drag draft applied.
    pub curve: CubicBezier,
    pub path_commands: String,
    pub label_anchor: Point,
    /// Whether drag handles should be drawn (selected, hovered or dragging).
    pub handles_visible: bool,
    /// Where each visible handle is drawn.
    pub handles: Vec<(crate::drag::EdgeHandle, Point)>,
}

/// The host canvas collaborator.
pub trait CanvasHost: CoordinateTransform {
    /// Start routing pointer move/up events to the editor until the guard drops.
    fn capture_pointer(&self) -> CaptureGuard;

    /// Replace the rendered edge list in one batch.
    fn replace_edges(&self, edges: &[EdgeView]);
}

/// Zoom and pan as reported by the canvas.
///
/// `screen = model * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn new(zoom: f32, pan_x: f32, pan_y: f32) -> Self {
        Self { zoom, pan_x, pan_y }
    }

    pub fn model_to_screen(&self, model: Point) -> Point {
        Point::new(model.x * self.zoom + self.pan_x, model.y * self.zoom + self.pan_y)
    }
}

impl CoordinateTransform for Viewport {
    fn screen_to_model(&self, screen: Point) -> Point {
        let z = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Point::new((screen.x - self.pan_x) / z, (screen.y - self.pan_y) / z)
    }
}

/// Capture that flips a shared flag the UI binds to (e.g. to show a grab cursor
/// and forward pointer events to the editor while it is set).
struct FlagCapture {
    flag: Rc<Cell<bool>>,
}

impl PointerCapture for FlagCapture {
    fn release(&mut self) {
        self.flag.set(false);
    }
}

/// [`CanvasHost`] backed by a Slint `VecModel`.
///
/// The UI reports zoom/pan through [`set_viewport`](Self::set_viewport) and
/// binds [`model`](Self::model) to its edge repeater. `replace_edges` updates
/// rows in place and trims the tail so bound items are reused.
pub struct SlintCanvas<P> {
    viewport: Cell<Viewport>,
    pointer_captured: Rc<Cell<bool>>,
    model: Rc<VecModel<P>>,
    constructor: Box<dyn Fn(&EdgeView) -> P>,
}

impl<P: Clone + 'static> SlintCanvas<P> {
    /// Create a canvas whose edge rows are built by `constructor`.
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn(&EdgeView) -> P + 'static,
    {
        Self {
            viewport: Cell::new(Viewport::default()),
            pointer_captured: Rc::new(Cell::new(false)),
            model: Rc::new(VecModel::default()),
            constructor: Box::new(constructor),
        }
    }

    /// Update the zoom/pan used for pointer conversion.
    pub fn set_viewport(&self, zoom: f32, pan_x: f32, pan_y: f32) {
        self.viewport.set(Viewport::new(zoom, pan_x, pan_y));
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    /// The edge model to bind to the UI.
    pub fn model(&self) -> ModelRc<P> {
        ModelRc::from(self.model.clone())
    }

    pub fn vec_model(&self) -> Rc<VecModel<P>> {
        self.model.clone()
    }

    pub fn is_pointer_captured(&self) -> bool {
        self.pointer_captured.get()
    }
}

impl<P> CoordinateTransform for SlintCanvas<P> {
    fn screen_to_model(&self, screen: Point) -> Point {
        self.viewport.get().screen_to_model(screen)
    }
}

impl<P: Clone + 'static> CanvasHost for SlintCanvas<P> {
    fn capture_pointer(&self) -> CaptureGuard {
        self.pointer_captured.set(true);
        CaptureGuard::new(Box::new(FlagCapture {
            flag: self.pointer_captured.clone(),
        }))
    }

    fn replace_edges(&self, edges: &[EdgeView]) {
        // Update existing rows or add new ones
        for (i, edge) in edges.iter().enumerate() {
            let item = (self.constructor)(edge);
            if i < self.model.row_count() {
                self.model.set_row_data(i, item);
            } else {
                self.model.push(item);
            }
        }
        // Remove excess rows
        while self.model.row_count() > edges.len() {
            self.model.remove(self.model.row_count() - 1);
        }
    }
}
