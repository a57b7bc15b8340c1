//! Whole-field layout: rows of holes across a trapezoid around one no-go zone.
//!
//! [`generate`] applies the acceptance filters of a candidate field in order:
//! obstruction area as a fraction of field area, fraction of obstruction
//! vertices inside the field, then row-by-row placement, then the hole cap.
//! The first failing filter is reported as a [`Rejection`].

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::config::{DEFAULT_MAX_HOLES, DEFAULT_MIN_VERTEX_FRACTION, PARALLEL_TOLERANCE};
use crate::error::LayoutError;
use crate::geom::Point;
use crate::row::{process_row, Row};
use crate::shape::Shape;

#[cfg(test)]
mod tests {

    use super::*;
    use crate::shape::Topology;
    use std::f64::consts::PI;

    fn rectangle_field() -> Trapezoid {
        Trapezoid::new(Point::new(0.0, 0.0), 60.0, Point::new(0.0, 40.0), 60.0)
    }

    fn open_limits() -> Limits {
        Limits {
            min_area: 0.0,
            max_area: 1.0,
            ..Limits::default()
        }
    }

    fn block(cx: f64, cy: f64, xw: f64, yw: f64) -> Shape {
        Shape::new(Point::new(cx, cy), xw, yw, 0.0, Topology::Solid).unwrap()
    }

    #[test]
    fn zero_area_zone_keeps_full_grid() {
        let spacing = Spacing::new(5.0, 5.0).unwrap();
        let outcome = generate(&rectangle_field(), &spacing, &block(30.0, 20.0, 0.0, 0.0), &open_limits());
        let field = outcome.accepted().expect("field should be accepted");
        assert_eq!(field.len(), 117);
        for (i, y) in (0..=8).map(|j| (j, 5.0 * j as f64)) {
            let row: Vec<&Point> = field.holes().iter().filter(|p| p.y == y).collect();
            assert_eq!(row.len(), 13, "row {}", i);
            for (k, p) in row.iter().enumerate() {
                assert!((p.x - 5.0 * k as f64).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn rows_on_zone_edges_keep_full_width() {
        // block spans x in [20, 40] and y in [15, 25]; rows every 5
        let spacing = Spacing::new(5.0, 5.0).unwrap();
        let outcome = generate(&rectangle_field(), &spacing, &block(30.0, 20.0, 20.0, 10.0), &open_limits());
        let field = outcome.accepted().expect("field should be accepted");
        assert_eq!(field.len(), 8 * 13 + 10);
        for y in [15.0, 25.0] {
            assert_eq!(field.holes().iter().filter(|p| p.y == y).count(), 13, "row {}", y);
        }
        let middle: Vec<f64> = field.holes().iter().filter(|p| p.y == 20.0).map(|p| p.x).collect();
        assert_eq!(middle, vec![0.0, 5.0, 10.0, 15.0, 20.0, 40.0, 45.0, 50.0, 55.0, 60.0]);
    }

    #[test]
    fn oversized_zone_rejected_for_area() {
        let spacing = Spacing::new(5.0, 5.0).unwrap();
        let limits = Limits {
            min_area: 0.1,
            max_area: 0.5,
            ..Limits::default()
        };
        let outcome = generate(&rectangle_field(), &spacing, &block(30.0, 20.0, 60.0, 60.0), &limits);
        match outcome {
            FieldOutcome::Rejected(Rejection::Area { ratio }) => assert!(ratio > 0.5),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn area_bounds_are_inclusive() {
        let spacing = Spacing::new(5.0, 5.0).unwrap();
        // 24 x 20 block is exactly 0.2 of the 60 x 40 field
        let shape = block(30.0, 20.0, 24.0, 20.0);
        let at_min = Limits {
            min_area: 0.2,
            max_area: 0.5,
            min_vertex_fraction: 0.0,
            ..Limits::default()
        };
        assert!(generate(&rectangle_field(), &spacing, &shape, &at_min).is_accepted());

        let at_max = Limits {
            min_area: 0.1,
            max_area: 0.2,
            min_vertex_fraction: 0.0,
            ..Limits::default()
        };
        assert!(generate(&rectangle_field(), &spacing, &shape, &at_max).is_accepted());

        let above_min = Limits {
            min_area: 0.2 + 1e-9,
            max_area: 0.5,
            min_vertex_fraction: 0.0,
            ..Limits::default()
        };
        assert!(matches!(
            generate(&rectangle_field(), &spacing, &shape, &above_min),
            FieldOutcome::Rejected(Rejection::Area { .. })
        ));
    }

    #[test]
    fn zone_outside_field_rejected_for_vertices() {
        let spacing = Spacing::new(5.0, 5.0).unwrap();
        let outcome = generate(&rectangle_field(), &spacing, &block(200.0, 20.0, 10.0, 10.0), &open_limits());
        assert_eq!(
            outcome,
            FieldOutcome::Rejected(Rejection::VertexFraction {
                inside: 0,
                required: 3.0
            })
        );
    }

    #[test]
    fn too_many_holes_rejects_instead_of_truncating() {
        let spacing = Spacing::new(1.0, 1.0).unwrap();
        let outcome = generate(&rectangle_field(), &spacing, &block(30.0, 20.0, 0.0, 0.0), &open_limits());
        assert_eq!(
            outcome,
            FieldOutcome::Rejected(Rejection::TooManyHoles { count: 61 * 41 })
        );
    }

    #[test]
    fn field_shorter_than_row_spacing_has_no_rows() {
        let spacing = Spacing::new(5.0, 50.0).unwrap();
        let outcome = generate(&rectangle_field(), &spacing, &block(30.0, 20.0, 0.0, 0.0), &open_limits());
        assert_eq!(outcome, FieldOutcome::Rejected(Rejection::NoFeasibleRows));
    }

    #[test]
    fn holes_avoid_the_zone() {
        let spacing = Spacing::new(5.0, 5.0).unwrap();
        let field = Trapezoid::new(Point::new(0.0, 0.0), 100.0, Point::new(20.0, 60.0), 60.0);
        let limits = Limits {
            min_area: 0.0,
            max_area: 1.0,
            min_vertex_fraction: 0.75,
            max_holes: 1000,
            ..Limits::default()
        };
        let mut shapes: Vec<Shape> = Topology::ALL
            .iter()
            .map(|&t| Shape::new(Point::new(40.0, 25.0), 6.0, 16.0, 0.0, t).unwrap())
            .collect();
        shapes.push(Shape::new(Point::new(40.0, 25.0), 6.0, 16.0, PI / 8.0, Topology::Solid).unwrap());
        for shape in shapes {
            let topology = shape.topology;
            let outcome = generate(&field, &spacing, &shape, &limits);
            let accepted = outcome.accepted().expect("field should be accepted");
            assert!(!accepted.is_empty());
            for p in accepted.holes() {
                assert!(!shape.contains(p), "{}: hole {} inside zone", topology, p);
                assert!(p.x >= field.left_x(p.y) - 1e-9 && p.x <= field.right_x(p.y) + 1e-9);
            }
        }
    }

    #[test]
    fn generation_is_repeatable() {
        let spacing = Spacing::new(5.5, 5.0).unwrap();
        let field = Trapezoid::new(Point::new(0.0, 0.0), 100.0, Point::new(40.0, 60.0), 50.0);
        let shape = Shape::new(Point::new(50.0, 30.0), 14.0, 34.0, PI / 8.0, Topology::S).unwrap();
        let a = generate(&field, &spacing, &shape, &open_limits());
        let b = generate(&field, &spacing, &shape, &open_limits());
        assert_eq!(a, b);
    }

    #[test]
    fn trapezoid_sides() {
        let field = Trapezoid::new(Point::new(10.0, 5.0), 100.0, Point::new(30.0, 45.0), 40.0);
        assert_eq!(field.height(), 40.0);
        assert_eq!(field.area(), 0.5 * 140.0 * 40.0);
        assert!((field.left_x(45.0) - 30.0).abs() < 1e-12);
        assert!((field.right_x(45.0) - 70.0).abs() < 1e-12);
        assert!((field.left_x(25.0) - 20.0).abs() < 1e-12);
        assert!((field.right_x(5.0) - 110.0).abs() < 1e-12);
    }

    #[test]
    fn spacing_must_be_positive() {
        assert!(Spacing::new(0.0, 1.0).is_err());
        assert!(Spacing::new(1.0, -2.0).is_err());
        assert!(Spacing::new(f64::NAN, 1.0).is_err());
    }
}

/// A trapezoidal field with horizontal base and top edges.
///
/// `base` and `top` are the left ends of the two edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trapezoid {
    pub base: Point,
    pub base_width: f64,
    pub top: Point,
    pub top_width: f64,
}

impl Trapezoid {
    pub fn new(base: Point, base_width: f64, top: Point, top_width: f64) -> Self {
        Self {
            base,
            base_width,
            top,
            top_width,
        }
    }

    pub fn height(&self) -> f64 {
        self.top.y - self.base.y
    }

    pub fn area(&self) -> f64 {
        0.5 * (self.base_width + self.top_width) * self.height()
    }

    /// Run over rise of the left side.
    pub fn left_slope(&self) -> f64 {
        (self.top.x - self.base.x) / self.height()
    }

    /// Run over rise of the right side.
    pub fn right_slope(&self) -> f64 {
        (self.top.x + self.top_width - self.base.x - self.base_width) / self.height()
    }

    /// x of the left side at height `y`.
    pub fn left_x(&self, y: f64) -> f64 {
        self.base.x + self.left_slope() * (y - self.base.y)
    }

    /// x of the right side at height `y`.
    pub fn right_x(&self, y: f64) -> f64 {
        self.base.x + self.base_width + self.right_slope() * (y - self.base.y)
    }

    /// Whether `p` is within the vertical extent and strictly between the sides.
    pub fn holds(&self, p: &Point) -> bool {
        if p.y > self.top.y || p.y < self.base.y {
            return false;
        }
        p.x > self.left_x(p.y) && p.x < self.right_x(p.y)
    }
}

/// Minimum borehole spacing along and across rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spacing {
    x: f64,
    y: f64,
}

impl Spacing {
    pub fn new(x: f64, y: f64) -> Result<Self, LayoutError> {
        let valid = |s: f64| s.is_finite() && s > 0.0;
        if valid(x) && valid(y) {
            Ok(Self { x, y })
        } else {
            Err(LayoutError::InvalidSpacing { x, y })
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// Acceptance limits for a candidate field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Inclusive lower bound of zone area over field area.
    pub min_area: f64,
    /// Inclusive upper bound of zone area over field area.
    pub max_area: f64,
    /// Fraction of zone vertices that must lie inside the field.
    pub min_vertex_fraction: f64,
    /// Fields with more holes than this are rejected.
    pub max_holes: usize,
    /// Parallel tolerance for segment intersection.
    pub tolerance: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_area: 0.45,
            max_area: 0.55,
            min_vertex_fraction: DEFAULT_MIN_VERTEX_FRACTION,
            max_holes: DEFAULT_MAX_HOLES,
            tolerance: PARALLEL_TOLERANCE,
        }
    }
}

/// Accepted borehole positions of one field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoreholeField {
    holes: Vec<Point>,
}

impl BoreholeField {
    pub fn new(holes: Vec<Point>) -> Self {
        Self { holes }
    }

    pub fn holes(&self) -> &[Point] {
        &self.holes
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    /// Positions as plain `(x, y)` pairs.
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.holes.iter().map(|p| (p.x, p.y)).collect()
    }
}

/// Why a candidate field was not accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Zone area over field area is outside the band.
    Area { ratio: f64 },
    /// Too few zone vertices inside the field.
    VertexFraction { inside: usize, required: f64 },
    /// More holes than allowed.
    TooManyHoles { count: usize },
    /// No row produced any hole.
    NoFeasibleRows,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Area { ratio } => write!(f, "area ratio {:.4} out of range", ratio),
            Rejection::VertexFraction { inside, required } => {
                write!(f, "{} vertices inside, {:.2} required", inside, required)
            }
            Rejection::TooManyHoles { count } => write!(f, "{} holes exceeds limit", count),
            Rejection::NoFeasibleRows => write!(f, "no feasible rows"),
        }
    }
}

/// Result of generating one candidate field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Accepted(BoreholeField),
    Rejected(Rejection),
}

impl FieldOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FieldOutcome::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&BoreholeField> {
        match self {
            FieldOutcome::Accepted(field) => Some(field),
            FieldOutcome::Rejected(_) => None,
        }
    }
}

/// Lays out boreholes in `field` around `shape`.
///
/// Rows are spaced evenly so that `floor(height / spacing.y) + 1` rows span
/// the base to the top edge inclusive.
pub fn generate(field: &Trapezoid, spacing: &Spacing, shape: &Shape, limits: &Limits) -> FieldOutcome {
    let field_area = field.area();
    let ratio = if field_area > 0.0 {
        shape.area() / field_area
    } else {
        f64::INFINITY
    };
    if !(limits.min_area..=limits.max_area).contains(&ratio) {
        return FieldOutcome::Rejected(Rejection::Area { ratio });
    }

    let inside = shape.outline().iter().filter(|v| field.holds(v)).count();
    let required = limits.min_vertex_fraction * shape.vertex_count() as f64;
    if (inside as f64) < required {
        return FieldOutcome::Rejected(Rejection::VertexFraction { inside, required });
    }

    let num_rows = (field.height() / spacing.y()).floor() as usize;
    if num_rows == 0 {
        return FieldOutcome::Rejected(Rejection::NoFeasibleRows);
    }
    let row_spacing = field.height() / num_rows as f64;

    let holes: Vec<Point> = (0..=num_rows)
        .flat_map(|i| {
            let y = field.base.y + row_spacing * i as f64;
            let row = Row {
                start_x: field.left_x(y),
                end_x: field.right_x(y),
                y,
            };
            process_row(&row, shape, spacing.x(), limits.tolerance).into_holes()
        })
        .collect();

    trace!(rows = num_rows + 1, holes = holes.len(), "field laid out");

    if holes.is_empty() {
        FieldOutcome::Rejected(Rejection::NoFeasibleRows)
    } else if holes.len() > limits.max_holes {
        FieldOutcome::Rejected(Rejection::TooManyHoles { count: holes.len() })
    } else {
        FieldOutcome::Accepted(BoreholeField::new(holes))
    }
}
