//! Points, cubic bezier curves and SVG path commands.
//!
//! All angles are in degrees, measured with 0° on the +x axis and growing
//! clockwise because +y points down on screen.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A point (or vector) in model space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Point at `radius` from `center` in direction `angle_deg`.
    pub fn on_circle(center: Point, radius: f32, angle_deg: f32) -> Self {
        center + Point::from_angle(angle_deg) * radius
    }

    /// Unit vector pointing along `angle_deg`.
    pub fn from_angle(angle_deg: f32) -> Self {
        let rad = angle_deg.to_radians();
        Point::new(rad.cos(), rad.sin())
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f32 {
        (other - self).length()
    }

    /// Angle of `self` seen from `origin`, in degrees within `(-180, 180]`.
    pub fn angle_from(self, origin: Point) -> f32 {
        let d = self - origin;
        d.y.atan2(d.x).to_degrees()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Cubic bezier curve: start point, two control points, end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

impl CubicBezier {
    pub fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Evaluate the bezier curve at parameter t (0.0 to 1.0)
    pub fn eval(&self, t: f32) -> Point {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        self.p0 * mt3 + self.p1 * (3.0 * mt2 * t) + self.p2 * (3.0 * mt * t2) + self.p3 * t3
    }

    /// Average of the four control vertices.
    ///
    /// Lands near the middle of the curve without evaluating it, which is
    /// where edge labels are placed.
    pub fn vertex_centroid(&self) -> Point {
        Point::new(
            (self.p0.x + self.p1.x + self.p2.x + self.p3.x) / 4.0,
            (self.p0.y + self.p1.y + self.p2.y + self.p3.y) / 4.0,
        )
    }

    /// The sub-curve from t=0 to t, via de Casteljau subdivision.
    pub fn split_at(&self, t: f32) -> CubicBezier {
        let t = t.clamp(0.0, 1.0);

        // Level 1: lerp between adjacent points
        let q0 = lerp_point(self.p0, self.p1, t);
        let q1 = lerp_point(self.p1, self.p2, t);
        let q2 = lerp_point(self.p2, self.p3, t);

        // Level 2
        let r0 = lerp_point(q0, q1, t);
        let r1 = lerp_point(q1, q2, t);

        // Level 3: the point on the curve at t
        let s = lerp_point(r0, r1, t);

        CubicBezier::new(self.p0, q0, r0, s)
    }

    /// SVG path command for this curve (e.g. "M 10 20 C 60 20 90 80 140 80").
    pub fn to_svg_path(&self) -> String {
        format!(
            "M {} {} C {} {} {} {} {} {}",
            self.p0.x, self.p0.y, self.p1.x, self.p1.y, self.p2.x, self.p2.y, self.p3.x, self.p3.y
        )
    }
}

/// Generate SVG path command for a partial bezier (for pulse animation)
///
/// Creates a "growing" curve that snakes from the start towards the end as
/// `progress` goes from 0.0 to 1.0.
pub fn generate_partial_bezier_path(curve: &CubicBezier, progress: f32) -> String {
    let t = progress.clamp(0.0, 1.0);

    if t <= 0.0 {
        // No curve visible yet - just return a point
        return format!("M {} {} L {} {}", curve.p0.x, curve.p0.y, curve.p0.x, curve.p0.y);
    }

    if t >= 1.0 {
        return curve.to_svg_path();
    }

    curve.split_at(t).to_svg_path()
}

/// Ease-in-out cubic timing curve used for traversal pulses.
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Linear interpolation between two points
fn lerp_point(a: Point, b: Point, t: f32) -> Point {
    a + (b - a) * t
}

/// Calculate squared distance from a point to a line segment
fn distance_to_line_segment_sq(point: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let ap = point - a;

    let ab_len_sq = ab.x * ab.x + ab.y * ab.y;

    if ab_len_sq < f32::EPSILON {
        // Degenerate segment (a == b)
        return ap.x * ap.x + ap.y * ap.y;
    }

    // Project point onto line, clamped to segment
    let t = ((ap.x * ab.x + ap.y * ab.y) / ab_len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;

    let d = point - closest;
    d.x * d.x + d.y * d.y
}

/// Calculate the minimum distance from a point to a cubic bezier curve
///
/// Samples the curve at regular intervals and measures against the resulting
/// polyline. `num_samples` of 0 falls back to 20.
pub fn distance_to_bezier(point: Point, bezier: &CubicBezier, num_samples: usize) -> f32 {
    let num_samples = if num_samples == 0 { 20 } else { num_samples };

    let mut min_dist_sq = f32::MAX;
    let mut prev_point = bezier.eval(0.0);

    for i in 1..=num_samples {
        let t = i as f32 / num_samples as f32;
        let curr_point = bezier.eval(t);

        let dist_sq = distance_to_line_segment_sq(point, prev_point, curr_point);
        if dist_sq < min_dist_sq {
            min_dist_sq = dist_sq;
        }

        prev_point = curr_point;
    }

    min_dist_sq.sqrt()
}
