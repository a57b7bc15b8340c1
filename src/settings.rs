use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{DEFAULT_MAX_HOLES, DEFAULT_MIN_VERTEX_FRACTION, PARALLEL_TOLERANCE};
use crate::field::Limits;
use crate::shape::Topology;
use crate::sweep::AxisRange;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn unit_labels() {
        assert_eq!(Unit::from("m".to_string()), Unit::Metres);
        assert_eq!(Unit::from("ft".to_string()), Unit::Feet);
        // anything but metres is labelled as feet
        assert_eq!(Unit::from("yards".to_string()), Unit::Feet);
        assert_eq!(Unit::Metres.label(), "m");
        assert_eq!(Unit::Feet.label(), "ft");
    }

    #[test]
    fn default_config_is_valid() {
        let settings = load_default_config().unwrap();
        assert!(validate_config(&settings).is_ok());
        assert_eq!(settings.topologies, Topology::ALL.to_vec());
        assert_eq!(settings.max_holes, DEFAULT_MAX_HOLES);
    }

    #[test]
    fn inverted_area_band_is_rejected() {
        let mut settings = load_default_config().unwrap();
        settings.min_area = 0.6;
        settings.max_area = 0.4;
        assert!(validate_config(&settings).is_err());
    }

    #[test]
    fn zero_spacing_is_rejected() {
        let mut settings = load_default_config().unwrap();
        settings.sweep.x_spacing = AxisRange::new(0.0, 5.0, 1.0);
        let err = validate_config(&settings).unwrap_err();
        assert!(err.to_string().contains("x_spacing"), "{}", err);
    }

    #[test]
    fn empty_topologies_rejected() {
        let mut settings = load_default_config().unwrap();
        settings.topologies.clear();
        assert!(validate_config(&settings).is_err());
    }

    #[test]
    fn snapshot_round_trips_through_toml() {
        let settings = load_default_config().unwrap();
        let text = toml::to_string(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(settings, back);
    }
}

/// Label for coordinate columns. No conversion is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    #[default]
    Metres,
    Feet,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Metres => "m",
            Unit::Feet => "ft",
        }
    }
}

impl From<String> for Unit {
    fn from(value: String) -> Self {
        if value == "m" {
            Unit::Metres
        } else {
            Unit::Feet
        }
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        value.label().to_string()
    }
}

/// Start, stop and step of every swept parameter.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct SweepSettings {
    pub base_x: AxisRange,
    pub base_y: AxisRange,
    pub top_x: AxisRange,
    pub top_y: AxisRange,
    pub base_width: AxisRange,
    pub top_width: AxisRange,
    pub y_spacing: AxisRange,
    pub x_spacing: AxisRange,
    pub x_width: AxisRange,
    pub y_width: AxisRange,
    pub centroid_x: AxisRange,
    pub centroid_y: AxisRange,
    pub theta: AxisRange,
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub unit: Unit,
    pub directory: PathBuf,
    pub base_file_name: String,
    pub graph: bool,
    pub output_cases: bool,
    pub show: bool,
    pub sample_rate: usize,
    pub seed: Option<u64>,
    pub min_area: f64,
    pub max_area: f64,
    #[serde(default = "default_min_vertex_fraction")]
    pub min_vertex_fraction: f64,
    #[serde(default = "default_max_holes")]
    pub max_holes: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_topologies")]
    pub topologies: Vec<Topology>,
    pub sweep: SweepSettings,
}

fn default_min_vertex_fraction() -> f64 {
    DEFAULT_MIN_VERTEX_FRACTION
}

fn default_max_holes() -> usize {
    DEFAULT_MAX_HOLES
}

fn default_tolerance() -> f64 {
    PARALLEL_TOLERANCE
}

fn default_parallel() -> bool {
    true
}

fn default_topologies() -> Vec<Topology> {
    Topology::ALL.to_vec()
}

impl Settings {
    /// Acceptance limits for the field generator.
    pub fn limits(&self) -> Limits {
        Limits {
            min_area: self.min_area,
            max_area: self.max_area,
            min_vertex_fraction: self.min_vertex_fraction,
            max_holes: self.max_holes,
            tolerance: self.tolerance,
        }
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root_dir = retrieve_project_root()?;
    let default_config_file = root_dir.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("loading default configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("deserializing default configuration")?;

    validate_config(&config)?;

    Ok(config)
}

pub fn load_config() -> Result<Settings> {
    let root_dir = retrieve_project_root()?;

    let default_config_file = root_dir.join("config/default.toml");
    let local_config = root_dir.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        info!("Using local configuration: {:?}", local_config);
        local_config
    } else {
        info!("Using default configuration: {:?}", default_config_file);
        default_config_file
    };

    let settings: Config = Config::builder()
        .add_source(File::from(config_file).required(true))
        .add_source(Environment::with_prefix("borelayout"))
        .build()
        .context("loading configuration")?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("deserializing configuration")?;

    // Parse command-line arguments and override values
    let args = CliArgs::parse();
    args.apply(&mut config);

    validate_config(&config)?;

    debug!("{:#?}", config);

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the BORELAYOUT_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("BORELAYOUT_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    // Walk upward from the executable directory
    let exe_path = env::current_exe().context("locating current executable")?;
    let mut current_dir = exe_path.parent();
    while let Some(dir) = current_dir {
        if dir.join("config").is_dir() {
            return Ok(dir.to_path_buf());
        }
        current_dir = dir.parent();
    }

    bail!("could not find project root directory; set BORELAYOUT_ROOT_DIR")
}

pub fn validate_config(config: &Settings) -> Result<()> {
    ensure!(
        config.min_area <= config.max_area,
        "min_area ({}) must not exceed max_area ({})",
        config.min_area,
        config.max_area
    );
    ensure!(
        (0.0..=1.0).contains(&config.min_vertex_fraction),
        "min_vertex_fraction must be within [0, 1], got {}",
        config.min_vertex_fraction
    );
    ensure!(config.sample_rate >= 1, "sample_rate must be at least 1");
    ensure!(config.tolerance >= 0.0, "tolerance must not be negative");
    ensure!(!config.topologies.is_empty(), "at least one topology is required");

    let sweep = &config.sweep;
    for (name, axis) in sweep.named() {
        axis.values(name)?;
    }
    for (name, axis) in [("x_spacing", sweep.x_spacing), ("y_spacing", sweep.y_spacing)] {
        ensure!(
            axis.min() > 0.0,
            "{} must start above zero, got {}",
            name,
            axis.min()
        );
    }
    for (name, axis) in [("x_width", sweep.x_width), ("y_width", sweep.y_width)] {
        ensure!(
            axis.min() >= 0.0,
            "{} must not be negative, got {}",
            name,
            axis.min()
        );
    }
    Ok(())
}

impl SweepSettings {
    /// Axes paired with their configuration keys.
    pub fn named(&self) -> [(&'static str, AxisRange); 13] {
        [
            ("base_x", self.base_x),
            ("base_y", self.base_y),
            ("top_x", self.top_x),
            ("top_y", self.top_y),
            ("base_width", self.base_width),
            ("top_width", self.top_width),
            ("y_spacing", self.y_spacing),
            ("x_spacing", self.x_spacing),
            ("x_width", self.x_width),
            ("y_width", self.y_width),
            ("centroid_x", self.centroid_x),
            ("centroid_y", self.centroid_y),
            ("theta", self.theta),
        ]
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "borelayout - borehole field layouts around no-go zones")]
pub struct CliArgs {
    /// Output directory for case files, graphs and the run summary.
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Prefix of the per-case coordinate files.
    #[arg(short, long)]
    name: Option<String>,

    /// Unit label for coordinate columns. "m" for metres, anything else is feet.
    #[arg(short, long)]
    unit: Option<String>,

    /// Write every accepted field to its own CSV file.
    #[arg(long)]
    output_cases: bool,

    /// Render a sample of accepted fields.
    #[arg(long)]
    graph: bool,

    /// Show sampled fields in an interactive window instead of writing Graphs.html.
    #[arg(long)]
    show: bool,

    /// Average spacing between sampled fields, in sequence numbers.
    #[arg(long)]
    sample_rate: Option<usize>,

    /// Random seed for sampling.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Minimum ratio of no-go zone area to field area.
    #[arg(long)]
    min_area: Option<f64>,

    /// Maximum ratio of no-go zone area to field area.
    #[arg(long)]
    max_area: Option<f64>,

    /// Fraction of zone vertices that must lie inside the field.
    #[arg(long)]
    min_vertex_fraction: Option<f64>,

    /// Fields with more holes than this are rejected.
    #[arg(long)]
    max_holes: Option<usize>,

    /// Topologies to sweep, separated by spaces (B, S, U, T, L, BL).
    #[arg(short, long, num_args = 1.., value_delimiter = ' ')]
    topologies: Option<Vec<Topology>>,

    /// Evaluate cases on a single thread.
    #[arg(long)]
    sequential: bool,
}

impl CliArgs {
    fn apply(self, config: &mut Settings) {
        if let Some(dir) = self.dir {
            config.directory = dir;
        }
        if let Some(name) = self.name {
            config.base_file_name = name;
        }
        if let Some(unit) = self.unit {
            config.unit = Unit::from(unit);
        }
        if self.output_cases {
            config.output_cases = true;
        }
        if self.graph {
            config.graph = true;
        }
        if self.show {
            config.show = true;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(min_area) = self.min_area {
            config.min_area = min_area;
        }
        if let Some(max_area) = self.max_area {
            config.max_area = max_area;
        }
        if let Some(fraction) = self.min_vertex_fraction {
            config.min_vertex_fraction = fraction;
        }
        if let Some(max_holes) = self.max_holes {
            config.max_holes = max_holes;
        }
        if let Some(topologies) = self.topologies {
            config.topologies = topologies;
        }
        if self.sequential {
            config.parallel = false;
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topologies: Vec<&str> = self.topologies.iter().map(|t| t.tag()).collect();
        write!(
            f,
            "Settings:
  - Directory: {}
  - Unit: {}
  - Area Band: [{:.3}, {:.3}]
  - Min Vertex Fraction: {:.3}
  - Max Holes: {}
  - Topologies: {}
  - Graph: {} (show: {}, sample rate: {})
  - Output Cases: {}
  ",
            self.directory.display(),
            self.unit.label(),
            self.min_area,
            self.max_area,
            self.min_vertex_fraction,
            self.max_holes,
            topologies.join(" "),
            self.graph,
            self.show,
            self.sample_rate,
            self.output_cases,
        )
    }
}
