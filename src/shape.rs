//! Composite no-go zones built from rotated rectangles.
//!
//! A [`Shape`] joins one to three [`RotatedRectangle`]s into a named outline
//! (a solid block or one of the letters S, U, T, L, or the mirrored L called
//! "Baseball"). Member rectangles touch along their seams and never overlap,
//! so the enclosed area is the sum of the members and containment is the
//! union of member containment.
//!
//! The outline is stitched from member corners in a fixed order per topology.
//! It is not a hull; it follows the letter and may be concave. Row generation
//! depends on its winding, so the order is part of the contract.

use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Contains};
use geo_types::{Coord, LineString, Polygon};
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::geom::{segment_intersect, Point, Segment};
use crate::rect::RotatedRectangle;


/// The named outline of a no-go zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Topology {
    /// A single rectangle.
    Solid,
    /// Upright with a foot to the left at the bottom and to the right at the top.
    S,
    /// Upright with feet to the right at both ends.
    U,
    /// Upright capped by a centered crossbar.
    T,
    /// Upright with a foot to the right at the bottom.
    L,
    /// Upright with a foot to the left at the bottom.
    Baseball,
}

impl Topology {
    /// All topologies in sweep order.
    pub const ALL: [Topology; 6] = [
        Topology::S,
        Topology::U,
        Topology::T,
        Topology::L,
        Topology::Baseball,
        Topology::Solid,
    ];

    /// Short tag used in configuration files.
    pub fn tag(&self) -> &'static str {
        match self {
            Topology::Solid => "B",
            Topology::S => "S",
            Topology::U => "U",
            Topology::T => "T",
            Topology::L => "L",
            Topology::Baseball => "BL",
        }
    }

    /// Number of outline vertices.
    pub fn vertex_count(&self) -> usize {
        match self {
            Topology::Solid => 4,
            Topology::L | Topology::Baseball => 6,
            Topology::S | Topology::U | Topology::T => 8,
        }
    }

    /// Centers of the perpendicular members, relative to the upright, in the
    /// unrotated frame. The upright is `x_width` by `y_width`; each member is
    /// `y_width` by `x_width`.
    fn member_offsets(&self, x_width: f64, y_width: f64) -> Vec<Vector2<f64>> {
        let along = 0.5 * (y_width - x_width);
        let across = 0.5 * (y_width + x_width);
        match self {
            Topology::Solid => vec![],
            Topology::S => vec![
                Vector2::new(along, across),
                Vector2::new(-along, -across),
            ],
            Topology::U => vec![
                Vector2::new(along, across),
                Vector2::new(along, -across),
            ],
            Topology::T => vec![Vector2::new(0.0, across)],
            Topology::L => vec![Vector2::new(along, -across)],
            Topology::Baseball => vec![Vector2::new(-along, -across)],
        }
    }

    /// Outline as (member, corner) pairs; member 0 is the upright.
    fn stitch_order(&self) -> &'static [(usize, usize)] {
        match self {
            Topology::Solid => &[(0, 0), (0, 1), (0, 2), (0, 3)],
            Topology::S => &[
                (2, 0),
                (2, 1),
                (0, 2),
                (1, 1),
                (1, 2),
                (1, 3),
                (0, 0),
                (2, 3),
            ],
            Topology::U => &[
                (2, 0),
                (2, 1),
                (2, 2),
                (0, 1),
                (0, 2),
                (1, 1),
                (1, 2),
                (1, 3),
            ],
            Topology::T => &[
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 1),
                (1, 2),
                (1, 3),
                (1, 0),
                (0, 3),
            ],
            Topology::L => &[(1, 0), (1, 1), (1, 2), (0, 1), (0, 2), (0, 3)],
            Topology::Baseball => &[(1, 0), (1, 1), (0, 2), (0, 3), (0, 0), (1, 3)],
        }
    }
}

impl FromStr for Topology {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Topology::Solid),
            "S" => Ok(Topology::S),
            "U" => Ok(Topology::U),
            "T" => Ok(Topology::T),
            "L" => Ok(Topology::L),
            "BL" => Ok(Topology::Baseball),
            _ => match s.to_ascii_lowercase().as_str() {
                "solid" | "block" => Ok(Topology::Solid),
                "baseball" => Ok(Topology::Baseball),
                _ => Err(LayoutError::InvalidTopology(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Topology {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topology> for String {
    fn from(value: Topology) -> Self {
        value.tag().to_string()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A composite no-go zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub topology: Topology,
    pub centroid: Point,
    pub x_width: f64,
    pub y_width: f64,
    pub theta: f64,
    rects: Vec<RotatedRectangle>,
    outline: Vec<Point>,
    polygon: Polygon<f64>,
    min: Point,
    max: Point,
}

impl Shape {
    /// Builds the members and outline of a topology centred on the upright.
    pub fn new(
        centroid: Point,
        x_width: f64,
        y_width: f64,
        theta: f64,
        topology: Topology,
    ) -> Result<Self, LayoutError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(x_width) || !valid(y_width) || !theta.is_finite() {
            return Err(LayoutError::InvalidDimensions { x_width, y_width });
        }

        let rotation = Rotation2::new(theta);
        let mut rects = vec![RotatedRectangle::new(centroid, x_width, y_width, theta)];
        rects.extend(
            topology
                .member_offsets(x_width, y_width)
                .into_iter()
                .map(|offset| {
                    RotatedRectangle::new(centroid + rotation * offset, y_width, x_width, theta)
                }),
        );

        let outline: Vec<Point> = topology
            .stitch_order()
            .iter()
            .map(|&(member, corner)| rects[member].corner(corner))
            .collect();

        let polygon = Polygon::new(outline_linestring(&outline), vec![]);
        let (min, max) = bounding_corners(&polygon);

        Ok(Self {
            topology,
            centroid,
            x_width,
            y_width,
            theta,
            rects,
            outline,
            polygon,
            min,
            max,
        })
    }

    /// Builds a shape from a configuration tag such as `"L"` or `"BL"`.
    pub fn from_tag(
        centroid: Point,
        x_width: f64,
        y_width: f64,
        theta: f64,
        tag: &str,
    ) -> Result<Self, LayoutError> {
        let topology = tag.parse()?;
        Self::new(centroid, x_width, y_width, theta, topology)
    }

    /// Ordered outline vertices.
    pub fn outline(&self) -> &[Point] {
        &self.outline
    }

    pub fn vertex_count(&self) -> usize {
        self.outline.len()
    }

    pub fn rectangles(&self) -> &[RotatedRectangle] {
        &self.rects
    }

    /// Axis-aligned (min, max) corners of the outline.
    pub fn bounds(&self) -> (Point, Point) {
        (self.min, self.max)
    }

    /// Every crossing of `segment` with an outline edge, including the
    /// closing edge from the last vertex to the first. Unsorted.
    pub fn line_intersect(&self, segment: &Segment, tolerance: f64) -> Vec<Point> {
        let n = self.outline.len();
        (0..n)
            .filter_map(|i| {
                let edge = Segment::new(self.outline[i], self.outline[(i + 1) % n]);
                segment_intersect(&edge, segment, tolerance)
            })
            .collect()
    }

    /// Whether the point is strictly inside the zone.
    ///
    /// Seams shared by two members are inside, the outer boundary is not, and
    /// a zone of zero area contains nothing.
    pub fn contains(&self, point: &Point) -> bool {
        self.area() > 0.0 && self.polygon.contains(&geo_types::Point::new(point.x, point.y))
    }

    pub fn area(&self) -> f64 {
        self.rects.len() as f64 * self.x_width * self.y_width
    }

    /// The outline as a closed `geo` polygon.
    pub fn polygon(&self) -> Polygon<f64> {
        self.polygon.clone()
    }
}

fn outline_linestring(outline: &[Point]) -> LineString<f64> {
    let mut exterior: LineString<f64> = outline
        .iter()
        .map(|p| Coord { x: p.x, y: p.y })
        .collect::<Vec<_>>()
        .into();
    exterior.close();
    exterior
}

fn bounding_corners(polygon: &Polygon<f64>) -> (Point, Point) {
    match polygon.bounding_rect() {
        Some(rect) => (
            Point::new(rect.min().x, rect.min().y),
            Point::new(rect.max().x, rect.max().y),
        ),
        None => (Point::origin(), Point::origin()),
    }
}
