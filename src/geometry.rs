//! Pure edge geometry.
//!
//! Everything here is a function of a [`State`] (or two) and a
//! [`Transition`]; nothing reads or writes the stores. Stored overrides
//! (`c1`, `c2`, `loop_angle`) take precedence over computed defaults.

use crate::config::EditorConfig;
use crate::graph::Automaton;
use crate::path::{CubicBezier, Point};
use crate::state::State;
use crate::transitions::Transition;

/// Loop angle used when neither the transition nor the state provides one.
pub const DEFAULT_LOOP_ANGLE: f32 = -90.0;

/// Position of handle `index` on the rim of `state`.
pub fn handle_point(state: &State, index: usize, radius: f32) -> Option<Point> {
    let angle = *state.handle_angles.get(index)?;
    Some(Point::on_circle(state.position, radius, angle))
}

/// Rim point an edge attaches to on `state` when heading for `toward`.
///
/// An explicit handle index wins when it exists. Otherwise the handle whose
/// angle is closest to the direction of `toward` is used, falling back to
/// the rim point straight towards it when the state has no handles.
pub fn anchor_point(state: &State, handle: Option<usize>, toward: Point, radius: f32) -> Point {
    if let Some(p) = handle.and_then(|i| handle_point(state, i, radius)) {
        return p;
    }

    let heading = toward.angle_from(state.position);
    let angle = state
        .handle_angles
        .iter()
        .copied()
        .min_by(|a, b| angular_distance(*a, heading).total_cmp(&angular_distance(*b, heading)))
        .unwrap_or(heading);
    Point::on_circle(state.position, radius, angle)
}

/// Smallest absolute difference between two angles, in `[0, 180]`.
pub fn angular_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Unit normal of `from -> to`, rotated +90° (clockwise on screen).
fn unit_normal(from: Point, to: Point, min_len: f32) -> (Point, f32) {
    let d = to - from;
    let len = d.length().max(min_len);
    (Point::new(-d.y / len, d.x / len), len)
}

/// Curve of an edge between two distinct states.
///
/// The start anchor is pushed sideways by the transition's fan-out offset;
/// default control points sit on the same side of the chord, one at each
/// end, `clamp(len / 4)` away from it.
pub fn straight_edge(source: &State, target: &State, transition: &Transition, config: &EditorConfig) -> CubicBezier {
    let radius = config.state_radius;
    let p0 = anchor_point(source, transition.source_handle, target.position, radius);
    let p3 = anchor_point(target, transition.target_handle, source.position, radius);

    let (n0, _) = unit_normal(p0, p3, config.short_edge_threshold);
    let start = p0 + n0 * transition.geometry.anchor_offset;

    let (n, len) = unit_normal(start, p3, config.short_edge_threshold);
    let offset = (len / 4.0).clamp(config.curve_offset_min, config.curve_offset_max);

    let c1 = transition.geometry.c1.unwrap_or(start + n * offset);
    let c2 = transition.geometry.c2.unwrap_or(p3 + n * offset);
    CubicBezier::new(start, c1, c2, p3)
}

/// Effective loop angle: the stored override, else the state's first handle.
pub fn loop_angle(state: &State, transition: &Transition) -> f32 {
    transition
        .geometry
        .loop_angle
        .or_else(|| state.handle_angles.first().copied())
        .unwrap_or(DEFAULT_LOOP_ANGLE)
}

/// Center a self-loop is drawn around.
///
/// Found by projecting from the rim anchor at `angle` back inwards by the
/// state radius.
pub fn loop_center(state: &State, angle: f32, radius: f32) -> Point {
    let anchor = Point::on_circle(state.position, radius, angle);
    anchor - Point::from_angle(angle) * radius
}

/// Curve of a self-loop.
///
/// Endpoints sit at `angle - 90°` and `angle - 30°`, pulled inside the rim;
/// default control points bulge out at `angle - 85°` and `angle - 35°`.
pub fn self_loop(state: &State, transition: &Transition, config: &EditorConfig) -> CubicBezier {
    let radius = config.state_radius;
    let angle = loop_angle(state, transition);
    let center = loop_center(state, angle, radius);

    let rim = radius - config.loop_rim_inset;
    let bulge = radius + config.loop_bulge;

    let start = Point::on_circle(center, rim, angle - 90.0);
    let end = Point::on_circle(center, rim, angle - 30.0);
    let c1 = transition
        .geometry
        .c1
        .unwrap_or_else(|| Point::on_circle(center, bulge, angle - 85.0));
    let c2 = transition
        .geometry
        .c2
        .unwrap_or_else(|| Point::on_circle(center, bulge, angle - 35.0));
    CubicBezier::new(start, c1, c2, end)
}

/// Where the loop-angle drag handle of a self-loop is drawn.
pub fn loop_handle_point(state: &State, transition: &Transition, config: &EditorConfig) -> Point {
    let angle = loop_angle(state, transition);
    let center = loop_center(state, angle, config.state_radius);
    Point::on_circle(center, config.state_radius + config.loop_handle_gap, angle)
}

/// Label position: the average of the curve's four vertices.
pub fn label_anchor(curve: &CubicBezier) -> Point {
    curve.vertex_centroid()
}

/// Curve for any transition, resolving its endpoints in `automaton`.
///
/// `None` when an endpoint is missing, which the automaton's cascading delete
/// rules out for transitions it owns.
pub fn edge_curve(automaton: &Automaton, transition: &Transition, config: &EditorConfig) -> Option<CubicBezier> {
    let source = automaton.states().get(&transition.source)?;
    if transition.is_self_loop() {
        return Some(self_loop(source, transition, config));
    }
    let target = automaton.states().get(&transition.target)?;
    Some(straight_edge(source, target, transition, config))
}
