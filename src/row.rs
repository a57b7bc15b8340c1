//! Borehole placement along a single row of the field.
//!
//! A row is a horizontal span of the trapezoid at one height. The no-go zone
//! boundary splits it into runs; runs outside the zone receive evenly spaced
//! holes no closer than the requested x spacing. Only points where the row
//! passes between inside and outside split it: a vertex the row grazes, or an
//! outline edge lying along the row, leaves the row whole.

use itertools::Itertools;
use tracing::trace;

use crate::config::{CONTACT_TOLERANCE, DISTRIBUTE_TOLERANCE, ROW_EXTENSION};
use crate::geom::{Point, Segment};
use crate::shape::Shape;


/// One horizontal row of the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub start_x: f64,
    pub end_x: f64,
    pub y: f64,
}

impl Row {
    pub fn width(&self) -> f64 {
        self.end_x - self.start_x
    }

    pub fn midpoint(&self) -> Point {
        Point::new(0.5 * (self.start_x + self.end_x), self.y)
    }
}

/// Result of placing holes on a row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The row lies inside the zone and was not computed.
    Skipped,
    /// Holes placed on the row, possibly none.
    Holes(Vec<Point>),
}

impl RowOutcome {
    /// Holes on the row; empty when skipped.
    pub fn holes(&self) -> &[Point] {
        match self {
            RowOutcome::Skipped => &[],
            RowOutcome::Holes(holes) => holes,
        }
    }

    pub fn into_holes(self) -> Vec<Point> {
        match self {
            RowOutcome::Skipped => Vec::new(),
            RowOutcome::Holes(holes) => holes,
        }
    }
}

/// Places holes on `row` around `shape` with at least `x_spacing` between
/// neighbours in each run.
pub fn process_row(row: &Row, shape: &Shape, x_spacing: f64, tolerance: f64) -> RowOutcome {
    let y = row.y;
    let contains = |x: f64| shape.contains(&Point::new(x, y));

    let scan = Segment::horizontal(row.start_x - ROW_EXTENSION, row.end_x + ROW_EXTENSION, y);
    let hits: Vec<f64> = shape
        .line_intersect(&scan, tolerance)
        .iter()
        .map(|p| p.x)
        .collect();
    let mut crossings = boundary_crossings(hits, scan.start.x, scan.end.x, contains);

    // boundary enters before the row and leaves after it with nothing in between
    if crossings.len() > 1
        && crossings[0] < row.start_x
        && crossings[crossings.len() - 1] > row.end_x
        && !crossings
            .iter()
            .any(|&x| x >= row.start_x && x <= row.end_x)
        && contains(row.midpoint().x)
    {
        trace!(y, "row covered by zone, skipping");
        return RowOutcome::Skipped;
    }

    crossings.retain(|&x| x >= row.start_x && x <= row.end_x);

    // widen holes narrower than the spacing
    for i in 1..crossings.len() {
        let gap = crossings[i] - crossings[i - 1];
        if gap < x_spacing && contains(0.5 * (crossings[i] + crossings[i - 1])) {
            let push = 0.5 * (x_spacing - gap);
            crossings[i] += push;
            crossings[i - 1] -= push;
        }
    }

    if row.width() < x_spacing {
        let mid = row.midpoint();
        return if contains(mid.x) {
            RowOutcome::Holes(Vec::new())
        } else {
            RowOutcome::Holes(vec![mid])
        };
    }

    let runs = distributable_runs(
        row.start_x,
        row.end_x,
        &crossings,
        |x| contains(x),
        |x| contains(x),
    );

    trace!(y, crossings = crossings.len(), runs = runs.len(), "row partitioned");

    RowOutcome::Holes(
        runs.into_iter()
            .flat_map(|(a, b)| distribute(a, b, y, x_spacing))
            .collect(),
    )
}

/// Sorted points of `[lo, hi]` where the scan passes into or out of the zone.
///
/// Hits within [`CONTACT_TOLERANCE`] of each other are merged. A hit is kept
/// only when the spans on either side of it differ in containment.
fn boundary_crossings<F>(mut hits: Vec<f64>, lo: f64, hi: f64, inside: F) -> Vec<f64>
where
    F: Fn(f64) -> bool,
{
    hits.sort_by(f64::total_cmp);
    hits.dedup_by(|next, kept| *next - *kept <= CONTACT_TOLERANCE);

    let spans: Vec<bool> = std::iter::once(lo)
        .chain(hits.iter().copied())
        .chain(std::iter::once(hi))
        .tuple_windows()
        .map(|(a, b)| inside(0.5 * (a + b)))
        .collect();

    hits.into_iter()
        .zip(spans.iter().tuple_windows())
        .filter(|(_, (before, after))| before != after)
        .map(|(x, _)| x)
        .collect()
}

/// Splits `[start, end]` into runs outside the zone given sorted crossings.
///
/// `end_inside` is asked about the row end; `gap_inside` about the midpoint
/// between crossings (or of the row when there are none). With an odd number
/// of crossings the row end decides whether the leading or trailing run is
/// open.
fn distributable_runs<E, G>(
    start: f64,
    end: f64,
    crossings: &[f64],
    end_inside: E,
    gap_inside: G,
) -> Vec<(f64, f64)>
where
    E: Fn(f64) -> bool,
    G: Fn(f64) -> bool,
{
    let n = crossings.len();
    match n {
        0 => {
            if gap_inside(0.5 * (start + end)) {
                vec![]
            } else {
                vec![(start, end)]
            }
        }
        1 => {
            if end_inside(end) {
                vec![(start, crossings[0])]
            } else {
                vec![(crossings[0], end)]
            }
        }
        2 => {
            if gap_inside(0.5 * (crossings[0] + crossings[1])) {
                vec![(start, crossings[0]), (crossings[1], end)]
            } else {
                vec![(crossings[0], crossings[1])]
            }
        }
        _ if n % 2 == 0 => {
            let mut runs = vec![(start, crossings[0])];
            runs.extend(crossings[1..n - 1].chunks(2).map(|c| (c[0], c[1])));
            runs.push((crossings[n - 1], end));
            runs
        }
        _ => {
            if end_inside(end) {
                let mut runs = vec![(start, crossings[0])];
                runs.extend(crossings[1..].chunks(2).map(|c| (c[0], c[1])));
                runs
            } else {
                let mut runs: Vec<(f64, f64)> = crossings[..n - 1]
                    .chunks(2)
                    .map(|c| (c[0], c[1]))
                    .collect();
                runs.push((crossings[n - 1], end));
                runs
            }
        }
    }
}

/// Evenly spaces holes on `[x1, x2]` at height `y`.
///
/// Runs shorter than `spacing` get one hole at their midpoint. Otherwise the
/// run is cut into `floor(len / spacing)` equal intervals and a hole is placed
/// at every interval boundary, both ends included.
pub fn distribute(x1: f64, x2: f64, y: f64, spacing: f64) -> Vec<Point> {
    let length = x2 - x1;
    if length < spacing {
        return vec![Point::new(0.5 * (x1 + x2), y)];
    }

    let intervals = (length / spacing).floor() as usize;
    let step = length / intervals as f64;

    (0..=intervals)
        .map(|k| x1 + k as f64 * step)
        .take_while(|x| x - x2 <= DISTRIBUTE_TOLERANCE)
        .map(|x| Point::new(x, y))
        .collect()
}
