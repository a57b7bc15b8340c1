use nalgebra::{Rotation2, Vector2};

use crate::geom::{point_in_rectangle, segment_intersect, Point, Segment};


/// A rectangle of full side lengths `x_width` by `y_width`, rotated
/// counter-clockwise by `theta` radians about its center.
///
/// Corners are stored counter-clockwise starting from the local
/// (-x, -y) corner: `[(-,-), (+,-), (+,+), (-,+)]` before rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedRectangle {
    pub center: Point,
    pub x_width: f64,
    pub y_width: f64,
    pub theta: f64,
    corners: [Point; 4],
}

impl RotatedRectangle {
    pub fn new(center: Point, x_width: f64, y_width: f64, theta: f64) -> Self {
        let rotation = Rotation2::new(theta);
        let hx = 0.5 * x_width;
        let hy = 0.5 * y_width;
        let local = [
            Vector2::new(-hx, -hy),
            Vector2::new(hx, -hy),
            Vector2::new(hx, hy),
            Vector2::new(-hx, hy),
        ];
        let corners = local.map(|offset| center + rotation * offset);

        Self {
            center,
            x_width,
            y_width,
            theta,
            corners,
        }
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    /// Returns corner `i` in stored order.
    pub fn corner(&self, i: usize) -> Point {
        self.corners[i]
    }

    /// Whether the point lies strictly inside the rectangle.
    pub fn contains(&self, point: &Point) -> bool {
        point_in_rectangle(point, &self.corners)
    }

    /// Intersections of a segment with the four edges.
    pub fn intersect_segment(&self, segment: &Segment, tolerance: f64) -> Vec<Point> {
        (0..4)
            .filter_map(|i| {
                let edge = Segment::new(self.corners[i], self.corners[(i + 1) % 4]);
                segment_intersect(&edge, segment, tolerance)
            })
            .collect()
    }

    /// Axis-aligned (min, max) corners of the bounding box.
    pub fn extents(&self) -> (Point, Point) {
        let mut min = self.corners[0];
        let mut max = self.corners[0];
        for c in &self.corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        (min, max)
    }
}
