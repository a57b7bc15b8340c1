//! Brute-force enumeration of candidate fields over a parameter grid.
//!
//! The grid is a list of named axes, each an inclusive `start..=stop` range
//! walked in `step` increments, plus the set of topologies. Every combination
//! is addressed by a flat index so that cases can be evaluated in any order
//! (or in parallel) while accepted fields are still numbered in enumeration
//! order.
//!
//! # Key Features
//!
//! - [`SweepGrid`]: index-addressable Cartesian product of the axes
//! - [`Sweep`]: evaluates every case, tallies rejections, samples accepted
//!   fields for inspection and writes the run outputs
//! - [`sample_sequence`]: randomised walk over accepted sequence numbers

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AXIS_STEP_SLACK;
use crate::error::LayoutError;
use crate::field::{self, BoreholeField, FieldOutcome, Limits, Rejection, Spacing, Trapezoid};
use crate::geom::Point;
use crate::output::{self, SvgGallery, Visualizer};
use crate::settings::{Settings, SweepSettings};
use crate::shape::{Shape, Topology};

#[cfg(test)]
mod tests {

    use super::*;

    fn fixed(value: f64) -> AxisRange {
        AxisRange::new(value, value, 0.0)
    }

    fn small_sweep() -> SweepSettings {
        SweepSettings {
            base_x: fixed(0.0),
            base_y: fixed(0.0),
            top_x: fixed(0.0),
            top_y: fixed(40.0),
            base_width: fixed(60.0),
            top_width: fixed(60.0),
            y_spacing: fixed(5.0),
            x_spacing: AxisRange::new(5.0, 6.0, 0.5),
            x_width: fixed(0.0),
            y_width: fixed(0.0),
            centroid_x: fixed(30.0),
            centroid_y: AxisRange::new(10.0, 30.0, 10.0),
            theta: fixed(0.0),
        }
    }

    #[test]
    fn axis_values_include_stop() {
        let values = AxisRange::new(5.0, 6.0, 0.5).values("x").unwrap();
        assert_eq!(values, vec![5.0, 5.5, 6.0]);
        let values = AxisRange::new(14.0, 30.0, 10.0).values("x").unwrap();
        assert_eq!(values, vec![14.0, 24.0]);
    }

    #[test]
    fn axis_values_tolerate_round_off() {
        let values = AxisRange::new(0.0, 0.3, 0.1).values("x").unwrap();
        assert_eq!(values.len(), 4);
        assert!((values[3] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn fixed_axis_has_one_value() {
        assert_eq!(fixed(7.0).values("x").unwrap(), vec![7.0]);
    }

    #[test]
    fn bad_axes_are_rejected() {
        let err = AxisRange::new(0.0, 1.0, 0.0).values("theta").unwrap_err();
        assert!(matches!(err, LayoutError::InvalidAxis { ref name, .. } if name == "theta"));
        assert!(AxisRange::new(2.0, 1.0, 1.0).values("x").is_err());
        assert!(AxisRange::new(0.0, f64::INFINITY, 1.0).values("x").is_err());
    }

    #[test]
    fn grid_len_is_product_of_axes() {
        let grid = SweepGrid::new(&small_sweep(), &[Topology::Solid, Topology::L]).unwrap();
        assert_eq!(grid.len(), 3 * 3 * 2);
    }

    #[test]
    fn oversized_grid_is_an_error() {
        let wide = AxisRange::new(0.0, 10_000.0, 1.0);
        let sweep = SweepSettings {
            base_x: wide,
            base_y: wide,
            top_x: wide,
            top_width: wide,
            base_width: wide,
            ..small_sweep()
        };
        // 10001^5 is above u64::MAX
        let err = SweepGrid::new(&sweep, &Topology::ALL).unwrap_err();
        assert!(matches!(err, LayoutError::GridTooLarge(_)));
    }

    #[test]
    fn tallies_merge_counts_and_cases() {
        let grid = SweepGrid::new(&small_sweep(), &[Topology::Solid]).unwrap();
        let limits = Limits {
            min_area: 0.0,
            max_area: 1.0,
            ..Limits::default()
        };
        let mut halves = Vec::new();
        for range in [0..4, 4..grid.len()] {
            let mut tally = Tally::default();
            for index in range {
                let params = grid.case(index).unwrap();
                let (shape, outcome) = params.evaluate(&limits).unwrap();
                tally = tally.add(index, params, shape, outcome);
            }
            halves.push(tally);
        }
        let second = halves.pop().unwrap();
        let first = halves.pop().unwrap();
        let merged = first.merge(second);
        assert_eq!(merged.summary.evaluated, grid.len());
        assert_eq!(merged.summary.accepted, merged.accepted.len());
        assert!(merged.accepted.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn indexed_cases_match_iteration_order() {
        let grid = SweepGrid::new(&small_sweep(), &Topology::ALL).unwrap();
        let iterated: Vec<CaseParameters> = grid.iter().collect();
        assert_eq!(iterated.len(), grid.len());
        for (i, case) in iterated.iter().enumerate() {
            assert_eq!(grid.case(i).as_ref(), Some(case));
        }
        assert!(grid.case(grid.len()).is_none());
    }

    #[test]
    fn enumeration_order_is_outer_to_inner() {
        let grid = SweepGrid::new(&small_sweep(), &[Topology::S, Topology::U]).unwrap();
        // centroid_y outermost, then topology, then x_spacing
        let first = grid.case(0).unwrap();
        assert_eq!((first.centroid_y, first.topology, first.x_spacing), (10.0, Topology::S, 5.0));
        let second = grid.case(1).unwrap();
        assert_eq!((second.centroid_y, second.topology, second.x_spacing), (10.0, Topology::S, 5.5));
        let fourth = grid.case(3).unwrap();
        assert_eq!((fourth.centroid_y, fourth.topology, fourth.x_spacing), (10.0, Topology::U, 5.0));
        let seventh = grid.case(6).unwrap();
        assert_eq!(seventh.centroid_y, 20.0);
    }

    #[test]
    fn sampling_walk_stays_in_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let picks = sample_sequence(10_000, 50, &mut rng);
        assert_eq!(picks[0], 0);
        for pair in picks.windows(2) {
            let gap = pair[1] - pair[0];
            assert!((1..50).contains(&gap), "gap {}", gap);
        }
        assert!(*picks.last().unwrap() < 10_000);
    }

    #[test]
    fn sampling_is_seeded() {
        let a = sample_sequence(5000, 20, &mut StdRng::seed_from_u64(42));
        let b = sample_sequence(5000, 20, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn sample_rate_one_takes_everything() {
        let picks = sample_sequence(5, 1, &mut StdRng::seed_from_u64(1));
        assert_eq!(picks, vec![0, 1, 2, 3, 4]);
        assert!(sample_sequence(0, 10, &mut StdRng::seed_from_u64(1)).is_empty());
    }

    #[test]
    fn summary_counts_each_cause() {
        let mut summary = SweepSummary::default();
        summary.record(&FieldOutcome::Rejected(Rejection::Area { ratio: 2.0 }));
        summary.record(&FieldOutcome::Rejected(Rejection::NoFeasibleRows));
        summary.record(&FieldOutcome::Rejected(Rejection::TooManyHoles { count: 300 }));
        summary.record(&FieldOutcome::Accepted(BoreholeField::new(vec![Point::new(0.0, 0.0)])));
        assert_eq!(summary.evaluated, 4);
        assert_eq!(summary.rejected_area, 1);
        assert_eq!(summary.rejected_no_feasible_rows, 1);
        assert_eq!(summary.rejected_too_many_holes, 1);
        assert_eq!(summary.rejected_vertex_fraction, 0);
        assert_eq!(summary.accepted, 1);
    }
}

/// Inclusive range of one swept parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl AxisRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    pub fn min(&self) -> f64 {
        self.start.min(self.stop)
    }

    /// Values `start + k * step` up to and including `stop`.
    ///
    /// A range with `start == stop` yields its single value whatever the step.
    pub fn values(&self, name: &str) -> Result<Vec<f64>, LayoutError> {
        let invalid = |reason: &str| LayoutError::InvalidAxis {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if !(self.start.is_finite() && self.stop.is_finite() && self.step.is_finite()) {
            return Err(invalid("bounds and step must be finite"));
        }
        if self.start == self.stop {
            return Ok(vec![self.start]);
        }
        if self.step <= 0.0 {
            return Err(invalid("step must be positive"));
        }
        if self.stop < self.start {
            return Err(invalid("stop is below start"));
        }

        let count = ((self.stop - self.start) / self.step + AXIS_STEP_SLACK).floor() as usize;
        Ok((0..=count)
            .map(|k| self.start + k as f64 * self.step)
            .collect())
    }
}

/// Numeric parameters of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    CentroidY,
    CentroidX,
    YWidth,
    XWidth,
    Theta,
    XSpacing,
    YSpacing,
    TopWidth,
    BaseWidth,
    BaseX,
    BaseY,
    TopX,
    TopY,
}

/// One level of the nested enumeration.
#[derive(Debug, Clone, PartialEq)]
enum Dimension {
    Axis(Axis, Vec<f64>),
    Topology(Vec<Topology>),
}

impl Dimension {
    fn len(&self) -> usize {
        match self {
            Dimension::Axis(_, values) => values.len(),
            Dimension::Topology(topologies) => topologies.len(),
        }
    }
}

/// Parameters of one candidate field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaseParameters {
    pub base_x: f64,
    pub base_y: f64,
    pub top_x: f64,
    pub top_y: f64,
    pub base_width: f64,
    pub top_width: f64,
    pub x_spacing: f64,
    pub y_spacing: f64,
    pub x_width: f64,
    pub y_width: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub theta: f64,
    pub topology: Topology,
}

impl CaseParameters {
    fn zeroed(topology: Topology) -> Self {
        Self {
            base_x: 0.0,
            base_y: 0.0,
            top_x: 0.0,
            top_y: 0.0,
            base_width: 0.0,
            top_width: 0.0,
            x_spacing: 0.0,
            y_spacing: 0.0,
            x_width: 0.0,
            y_width: 0.0,
            centroid_x: 0.0,
            centroid_y: 0.0,
            theta: 0.0,
            topology,
        }
    }

    fn set(&mut self, axis: Axis, value: f64) {
        let slot = match axis {
            Axis::CentroidY => &mut self.centroid_y,
            Axis::CentroidX => &mut self.centroid_x,
            Axis::YWidth => &mut self.y_width,
            Axis::XWidth => &mut self.x_width,
            Axis::Theta => &mut self.theta,
            Axis::XSpacing => &mut self.x_spacing,
            Axis::YSpacing => &mut self.y_spacing,
            Axis::TopWidth => &mut self.top_width,
            Axis::BaseWidth => &mut self.base_width,
            Axis::BaseX => &mut self.base_x,
            Axis::BaseY => &mut self.base_y,
            Axis::TopX => &mut self.top_x,
            Axis::TopY => &mut self.top_y,
        };
        *slot = value;
    }

    pub fn trapezoid(&self) -> Trapezoid {
        Trapezoid::new(
            Point::new(self.base_x, self.base_y),
            self.base_width,
            Point::new(self.top_x, self.top_y),
            self.top_width,
        )
    }

    pub fn spacing(&self) -> Result<Spacing, LayoutError> {
        Spacing::new(self.x_spacing, self.y_spacing)
    }

    pub fn shape(&self) -> Result<Shape, LayoutError> {
        Shape::new(
            Point::new(self.centroid_x, self.centroid_y),
            self.x_width,
            self.y_width,
            self.theta,
            self.topology,
        )
    }

    /// Builds the zone and lays out the field for this case.
    pub fn evaluate(&self, limits: &Limits) -> Result<(Shape, FieldOutcome), LayoutError> {
        let shape = self.shape()?;
        let outcome = field::generate(&self.trapezoid(), &self.spacing()?, &shape, limits);
        Ok((shape, outcome))
    }
}

/// Cartesian product of every axis and the topology list.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    dims: Vec<Dimension>,
    len: usize,
}

impl SweepGrid {
    pub fn new(sweep: &SweepSettings, topologies: &[Topology]) -> Result<Self, LayoutError> {
        let axis = |axis: Axis, name: &str, range: &AxisRange| -> Result<Dimension, LayoutError> {
            Ok(Dimension::Axis(axis, range.values(name)?))
        };

        // outermost first
        let dims = vec![
            axis(Axis::CentroidY, "centroid_y", &sweep.centroid_y)?,
            axis(Axis::CentroidX, "centroid_x", &sweep.centroid_x)?,
            axis(Axis::YWidth, "y_width", &sweep.y_width)?,
            axis(Axis::XWidth, "x_width", &sweep.x_width)?,
            axis(Axis::Theta, "theta", &sweep.theta)?,
            Dimension::Topology(topologies.to_vec()),
            axis(Axis::XSpacing, "x_spacing", &sweep.x_spacing)?,
            axis(Axis::YSpacing, "y_spacing", &sweep.y_spacing)?,
            axis(Axis::TopWidth, "top_width", &sweep.top_width)?,
            axis(Axis::BaseWidth, "base_width", &sweep.base_width)?,
            axis(Axis::BaseX, "base_x", &sweep.base_x)?,
            axis(Axis::BaseY, "base_y", &sweep.base_y)?,
            axis(Axis::TopX, "top_x", &sweep.top_x)?,
            axis(Axis::TopY, "top_y", &sweep.top_y)?,
        ];

        let len = dims
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(dim.len()))
            .ok_or(LayoutError::GridTooLarge(dims.len()))?;

        Ok(Self { dims, len })
    }

    /// Number of cases in the grid.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The case at flat `index`, decoded with the innermost axis varying fastest.
    pub fn case(&self, index: usize) -> Option<CaseParameters> {
        if index >= self.len() {
            return None;
        }
        let mut digits = vec![0; self.dims.len()];
        let mut rest = index;
        for (digit, dim) in digits.iter_mut().zip(&self.dims).rev() {
            *digit = rest % dim.len();
            rest /= dim.len();
        }
        Some(self.build(&digits))
    }

    /// Every case in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = CaseParameters> + '_ {
        self.dims
            .iter()
            .map(|dim| 0..dim.len())
            .multi_cartesian_product()
            .map(move |digits| self.build(&digits))
    }

    fn build(&self, digits: &[usize]) -> CaseParameters {
        let mut case = CaseParameters::zeroed(Topology::Solid);
        for (dim, &digit) in self.dims.iter().zip(digits) {
            match dim {
                Dimension::Axis(axis, values) => case.set(*axis, values[digit]),
                Dimension::Topology(topologies) => case.topology = topologies[digit],
            }
        }
        case
    }
}

/// An accepted field with the case that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedCase {
    /// Position among accepted fields, in enumeration order.
    pub sequence: usize,
    /// Flat index into the grid.
    pub index: usize,
    pub params: CaseParameters,
    pub outline: Vec<Point>,
    pub field: BoreholeField,
}

/// Tallies of a completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepSummary {
    pub possible: usize,
    pub evaluated: usize,
    pub accepted: usize,
    pub rejected_area: usize,
    pub rejected_vertex_fraction: usize,
    pub rejected_too_many_holes: usize,
    pub rejected_no_feasible_rows: usize,
    pub sampled: usize,
    pub elapsed_secs: f64,
}

impl SweepSummary {
    /// Adds the counts of a partial tally. `possible` and timing are left alone.
    pub fn merge(&mut self, other: &SweepSummary) {
        self.evaluated += other.evaluated;
        self.accepted += other.accepted;
        self.rejected_area += other.rejected_area;
        self.rejected_vertex_fraction += other.rejected_vertex_fraction;
        self.rejected_too_many_holes += other.rejected_too_many_holes;
        self.rejected_no_feasible_rows += other.rejected_no_feasible_rows;
    }

    pub fn record(&mut self, outcome: &FieldOutcome) {
        self.evaluated += 1;
        match outcome {
            FieldOutcome::Accepted(_) => self.accepted += 1,
            FieldOutcome::Rejected(Rejection::Area { .. }) => self.rejected_area += 1,
            FieldOutcome::Rejected(Rejection::VertexFraction { .. }) => {
                self.rejected_vertex_fraction += 1
            }
            FieldOutcome::Rejected(Rejection::TooManyHoles { .. }) => {
                self.rejected_too_many_holes += 1
            }
            FieldOutcome::Rejected(Rejection::NoFeasibleRows) => {
                self.rejected_no_feasible_rows += 1
            }
        }
    }
}

/// Accepted fields and rejection counts over part of the grid.
#[derive(Debug, Default)]
struct Tally {
    summary: SweepSummary,
    accepted: Vec<AcceptedCase>,
}

impl Tally {
    fn add(mut self, index: usize, params: CaseParameters, shape: Shape, outcome: FieldOutcome) -> Self {
        self.summary.record(&outcome);
        match outcome {
            FieldOutcome::Accepted(field) => self.accepted.push(AcceptedCase {
                sequence: 0,
                index,
                params,
                outline: shape.outline().to_vec(),
                field,
            }),
            FieldOutcome::Rejected(rejection) => debug!(index, %rejection, "case rejected"),
        }
        self
    }

    fn merge(mut self, other: Tally) -> Self {
        self.summary.merge(&other.summary);
        self.accepted.extend(other.accepted);
        self
    }
}

/// Picks sequence numbers below `count`: the first is 0 and each next one is
/// drawn uniformly from `[prev + 1, prev + rate)`.
pub fn sample_sequence<R: Rng>(count: usize, rate: usize, rng: &mut R) -> Vec<usize> {
    let mut picks = Vec::new();
    let mut next = 0;
    while next < count {
        picks.push(next);
        next = if rate > 1 {
            rng.random_range(next + 1..next + rate)
        } else {
            next + 1
        };
    }
    picks
}

/// A full parameter sweep and its accepted fields.
#[derive(Debug)]
pub struct Sweep {
    pub settings: Settings,
    pub grid: SweepGrid,
    pub accepted: Vec<AcceptedCase>,
    pub summary: SweepSummary,
}

impl Sweep {
    pub fn new(settings: Settings) -> Result<Self> {
        let grid = SweepGrid::new(&settings.sweep, &settings.topologies)
            .context("building sweep grid")?;
        let summary = SweepSummary {
            possible: grid.len(),
            ..SweepSummary::default()
        };

        Ok(Self {
            settings,
            grid,
            accepted: Vec::new(),
            summary,
        })
    }

    /// Evaluates every case in the grid.
    pub fn solve(&mut self) -> Result<()> {
        let start = Instant::now();
        let n = self.grid.len();
        info!("Number of possible fields: {}", n);

        let pb = ProgressBar::new(n as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>7}/{len:7} {msg} ETA: {eta_precise}",
            )
            .context("progress bar template")?
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("cases".to_string());

        let limits = self.settings.limits();
        let grid = &self.grid;
        let evaluate = |tally: Tally, index: usize, params: CaseParameters| -> Result<Tally, LayoutError> {
            let (shape, outcome) = params.evaluate(&limits)?;
            pb.inc(1);
            Ok(tally.add(index, params, shape, outcome))
        };

        let tally = if self.settings.parallel {
            (0..n)
                .into_par_iter()
                .filter_map(|index| grid.case(index).map(|params| (index, params)))
                .try_fold(Tally::default, |tally, (index, params)| evaluate(tally, index, params))
                .try_reduce(Tally::default, |a, b| Ok(a.merge(b)))
        } else {
            grid.iter()
                .enumerate()
                .try_fold(Tally::default(), |tally, (index, params)| evaluate(tally, index, params))
        };
        let Tally {
            summary: counts,
            mut accepted,
        } = tally.context("evaluating sweep")?;
        pb.finish_and_clear();

        // sequence numbers follow grid order
        accepted.sort_by_key(|case| case.index);
        for (sequence, case) in accepted.iter_mut().enumerate() {
            case.sequence = sequence;
        }
        let mut summary = SweepSummary {
            possible: n,
            ..SweepSummary::default()
        };
        summary.merge(&counts);

        let duration = start.elapsed();
        summary.elapsed_secs = duration.as_secs_f64();
        let thrown_out = summary.rejected_no_feasible_rows
            + summary.rejected_vertex_fraction
            + summary.rejected_too_many_holes;
        info!("Number of cases thrown out: {}", thrown_out);
        info!("Number with area out of range: {}", summary.rejected_area);
        info!("Total fields generated: {}", summary.accepted);
        info!("Time elapsed: {:.2?}", duration);

        self.accepted = accepted;
        self.summary = summary;
        Ok(())
    }

    /// Sequence numbers of accepted fields picked for inspection.
    pub fn sample(&self) -> Vec<usize> {
        let seed = self.settings.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        sample_sequence(self.accepted.len(), self.settings.sample_rate, &mut rng)
    }

    /// Writes case files, graphs, the summary and a settings snapshot.
    pub fn writeup(&mut self) -> Result<()> {
        let dir = &self.settings.directory;
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        if self.settings.output_cases {
            info!("Writing {} case files to {}", self.accepted.len(), dir.display());
            for case in &self.accepted {
                output::write_case_csv(
                    dir,
                    &self.settings.base_file_name,
                    case.sequence,
                    self.settings.unit,
                    &case.field,
                )?;
            }
        }

        if self.settings.graph {
            let selected = self.sample();
            self.summary.sampled = selected.len();
            let mut visualizer = self.visualizer();
            for sequence in selected {
                let case = &self.accepted[sequence];
                visualizer.render(&format!("Case_{}", sequence), &case.field, &case.outline)?;
            }
            visualizer.finish()?;
        }

        output::write_summary(dir, &self.summary)?;
        output::write_settings_snapshot(dir, &self.settings)?;
        Ok(())
    }

    fn visualizer(&self) -> Box<dyn Visualizer> {
        #[cfg(feature = "visualization")]
        if self.settings.show {
            return Box::new(crate::helpers::Viewer::new());
        }
        #[cfg(not(feature = "visualization"))]
        if self.settings.show {
            tracing::warn!(
                "interactive display needs the `visualization` feature, writing Graphs.html instead"
            );
        }
        Box::new(SvgGallery::new(self.settings.directory.join("Graphs.html")))
    }
}
