//! Interactive drag gestures on edge and state handles.
//!
//! A [`DragSession`] is either idle or dragging exactly one handle. Control
//! point drags keep a draft in the session and only write it into the
//! transition on pointer-up; angle drags (loop angle, state handle rotation)
//! write through on every move because all dependent geometry is re-derived
//! from the angle anyway.
//!
//! While dragging, the session holds the host's pointer capture. Ending the
//! drag or dropping the session releases it.

use crate::config::EditorConfig;
use crate::error::{Error, Result};
use crate::geometry::{edge_curve, loop_angle, loop_center};
use crate::graph::Automaton;
use crate::host::{CanvasHost, CaptureGuard, CoordinateTransform};
use crate::path::{CubicBezier, Point};
use crate::state::StateId;
use crate::transitions::TransitionId;
use tracing::{debug, warn};

/// Which handle of an edge is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeHandle {
    C1,
    C2,
    LoopAngle,
}

impl EdgeHandle {
    /// Index used by UI bindings: 0 = c1, 1 = c2, 2 = loop angle.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(EdgeHandle::C1),
            1 => Some(EdgeHandle::C2),
            2 => Some(EdgeHandle::LoopAngle),
            _ => None,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            EdgeHandle::C1 => 0,
            EdgeHandle::C2 => 1,
            EdgeHandle::LoopAngle => 2,
        }
    }
}

/// What an active drag is attached to.
#[derive(Debug, Clone, PartialEq)]
pub enum DragTarget {
    Edge { edge: TransitionId, handle: EdgeHandle },
    StateHandle { state: StateId, index: usize },
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Dragging {
        target: DragTarget,
        /// Uncommitted control point, for `C1`/`C2` drags only.
        draft: Option<Point>,
        _capture: CaptureGuard,
    },
}

#[derive(Debug, Default)]
pub struct DragSession {
    phase: Phase,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging { .. })
    }

    pub fn target(&self) -> Option<&DragTarget> {
        match &self.phase {
            Phase::Dragging { target, .. } => Some(target),
            Phase::Idle => None,
        }
    }

    /// Whether `id` is the edge currently being dragged.
    pub fn is_dragging_edge(&self, id: &TransitionId) -> bool {
        matches!(self.target(), Some(DragTarget::Edge { edge, .. }) if edge == id)
    }

    /// The uncommitted control point of the active drag, if any.
    pub fn draft(&self) -> Option<Point> {
        match &self.phase {
            Phase::Dragging { draft, .. } => *draft,
            Phase::Idle => None,
        }
    }

    /// Start dragging `handle` of edge `edge`.
    ///
    /// Control point drags start from the point currently drawn, so a release
    /// without motion commits the visible curve unchanged.
    pub fn begin_edge(
        &mut self,
        automaton: &Automaton,
        edge: &TransitionId,
        handle: EdgeHandle,
        host: &dyn CanvasHost,
        config: &EditorConfig,
    ) -> Result<()> {
        if self.is_dragging() {
            return Err(Error::DragInProgress);
        }

        let transition = automaton
            .transitions()
            .get(edge)
            .ok_or_else(|| Error::UnknownTransition(edge.clone()))?;

        let draft = match handle {
            EdgeHandle::LoopAngle if !transition.is_self_loop() => {
                return Err(Error::NotASelfLoop(edge.clone()));
            }
            EdgeHandle::LoopAngle => None,
            EdgeHandle::C1 | EdgeHandle::C2 => {
                let curve = edge_curve(automaton, transition, config)
                    .ok_or_else(|| Error::UnknownState(transition.source.clone()))?;
                Some(if handle == EdgeHandle::C1 { curve.p1 } else { curve.p2 })
            }
        };

        debug!(edge = %edge, ?handle, "drag started");
        self.phase = Phase::Dragging {
            target: DragTarget::Edge {
                edge: edge.clone(),
                handle,
            },
            draft,
            _capture: host.capture_pointer(),
        };
        Ok(())
    }

    /// Start rotating handle `index` of `state`.
    pub fn begin_state_handle(
        &mut self,
        automaton: &Automaton,
        state: &StateId,
        index: usize,
        host: &dyn CanvasHost,
    ) -> Result<()> {
        if self.is_dragging() {
            return Err(Error::DragInProgress);
        }

        let s = automaton
            .states()
            .get(state)
            .ok_or_else(|| Error::UnknownState(state.clone()))?;
        if index >= s.handle_angles.len() {
            return Err(Error::UnknownHandle {
                state: state.clone(),
                index,
            });
        }

        debug!(state = %state, index, "handle rotation started");
        self.phase = Phase::Dragging {
            target: DragTarget::StateHandle {
                state: state.clone(),
                index,
            },
            draft: None,
            _capture: host.capture_pointer(),
        };
        Ok(())
    }

    /// Feed one pointer-move event, given in screen coordinates.
    ///
    /// Returns `true` when something visible changed. Moves while idle are
    /// ignored.
    pub fn pointer_move<T>(
        &mut self,
        screen: Point,
        transform: &T,
        automaton: &mut Automaton,
        config: &EditorConfig,
    ) -> bool
    where
        T: CoordinateTransform + ?Sized,
    {
        let Phase::Dragging { target, draft, .. } = &mut self.phase else {
            return false;
        };
        let pointer = transform.screen_to_model(screen);

        match target {
            DragTarget::Edge {
                handle: EdgeHandle::C1 | EdgeHandle::C2,
                ..
            } => {
                *draft = Some(pointer);
                true
            }
            DragTarget::Edge {
                edge,
                handle: EdgeHandle::LoopAngle,
            } => {
                let Some(center) = automaton.transitions().get(edge).and_then(|t| {
                    let state = automaton.states().get(&t.source)?;
                    Some(loop_center(state, loop_angle(state, t), config.state_radius))
                }) else {
                    warn!(edge = %edge, "loop drag on a transition that no longer exists");
                    return false;
                };

                let angle = pointer.angle_from(center);
                match automaton.transitions_mut().get_mut(edge) {
                    Some(t) => {
                        t.geometry.loop_angle = Some(angle);
                        true
                    }
                    None => false,
                }
            }
            DragTarget::StateHandle { state, index } => {
                let Some(center) = automaton.states().get(state).map(|s| s.position) else {
                    warn!(state = %state, "handle drag on a state that no longer exists");
                    return false;
                };
                automaton
                    .rotate_handle(state, *index, pointer.angle_from(center))
                    .is_ok()
            }
        }
    }

    /// End the drag, committing a control point draft into the store.
    ///
    /// Returns the target that was being dragged, or `None` when idle. The
    /// pointer capture is released here.
    pub fn pointer_up(&mut self, automaton: &mut Automaton) -> Option<DragTarget> {
        let Phase::Dragging { target, draft, .. } = std::mem::take(&mut self.phase) else {
            return None;
        };

        if let (DragTarget::Edge { edge, handle }, Some(point)) = (&target, draft) {
            match automaton.transitions_mut().get_mut(edge) {
                Some(t) => match handle {
                    EdgeHandle::C1 => t.geometry.c1 = Some(point),
                    EdgeHandle::C2 => t.geometry.c2 = Some(point),
                    EdgeHandle::LoopAngle => {}
                },
                None => warn!(edge = %edge, "dropping drag draft for a removed transition"),
            }
        }

        debug!(?target, "drag ended");
        Some(target)
    }

    /// Apply the in-progress draft (if it belongs to `id`) to a computed curve.
    ///
    /// This is the single read path for edge geometry: the draft while
    /// dragging, the committed value otherwise.
    pub fn overlay(&self, id: &TransitionId, mut curve: CubicBezier) -> CubicBezier {
        if let Phase::Dragging {
            target: DragTarget::Edge { edge, handle },
            draft: Some(point),
            ..
        } = &self.phase
        {
            if edge == id {
                match handle {
                    EdgeHandle::C1 => curve.p1 = *point,
                    EdgeHandle::C2 => curve.p2 = *point,
                    EdgeHandle::LoopAngle => {}
                }
            }
        }
        curve
    }
}
