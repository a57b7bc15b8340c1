use nalgebra::{Point2, Vector2};


/// A point in the field plane.
pub type Point = Point2<f64>;

/// A directed line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// A horizontal segment at height `y` spanning `x1..x2`.
    pub fn horizontal(x1: f64, x2: f64, y: f64) -> Self {
        Self::new(Point::new(x1, y), Point::new(x2, y))
    }

    /// Vector from start to end.
    pub fn direction(&self) -> Vector2<f64> {
        self.end - self.start
    }

    pub fn midpoint(&self) -> Point {
        nalgebra::center(&self.start, &self.end)
    }
}

/// Returns the intersection point of two segments, if any.
///
/// Solves `p + t r = q + u s` with the 2D cross product. Segments whose
/// direction cross product has magnitude at or below `tolerance` are treated
/// as parallel and never intersect, including collinear overlaps and
/// zero-length segments. Both parameters must lie in `[0, 1]`.
pub fn segment_intersect(first: &Segment, second: &Segment, tolerance: f64) -> Option<Point> {
    let p = first.start;
    let r = first.direction();
    let q = second.start;
    let s = second.direction();

    let rxs = r.perp(&s);
    if rxs.abs() <= tolerance {
        return None;
    }

    let qp = q - p;
    let t = qp.perp(&s) / rxs;
    let u = qp.perp(&r) / rxs;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p + r * t)
    } else {
        None
    }
}

/// Tests whether a point lies strictly inside a rectangle given by its four
/// corners in order (`c[0]` adjacent to `c[1]` and `c[3]`).
///
/// Points on the boundary are outside, so a degenerate rectangle contains nothing.
pub fn point_in_rectangle(point: &Point, corners: &[Point; 4]) -> bool {
    let ab = corners[1] - corners[0];
    let ad = corners[3] - corners[0];
    let ap = point - corners[0];

    let ap_ab = ap.dot(&ab);
    let ap_ad = ap.dot(&ad);

    0.0 < ap_ab && ap_ab < ab.dot(&ab) && 0.0 < ap_ad && ap_ad < ad.dot(&ad)
}
