/// Default tolerance below which two segment directions are treated as parallel.
pub const PARALLEL_TOLERANCE: f64 = 1e-12;
/// Overshoot allowed when the last hole of a run lands on its right bound.
pub const DISTRIBUTE_TOLERANCE: f64 = 1e-12;
/// Outline hits closer than this along a row are treated as one contact point.
pub const CONTACT_TOLERANCE: f64 = 1e-9;
/// Distance the scan segment is extended past both ends of a row, in length units.
pub const ROW_EXTENSION: f64 = 100.0;
/// Default maximum number of boreholes in an accepted field.
pub const DEFAULT_MAX_HOLES: usize = 250;
/// Default fraction of obstruction vertices that must lie inside the field.
pub const DEFAULT_MIN_VERTEX_FRACTION: f64 = 0.75;
/// Slack used when counting how many steps of an axis fit before its stop bound.
pub const AXIS_STEP_SLACK: f64 = 1e-9;
