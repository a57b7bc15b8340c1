use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use geo::BoundingRect;
use geo_types::{Coord, LineString};
use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use crate::field::BoreholeField;
use crate::geom::Point;
use crate::settings::{Settings, Unit};
use crate::sweep::SweepSummary;

const CSV_TERMINATOR: &str = "\r\n";

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn small_field() -> BoreholeField {
        BoreholeField::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(2.5, 4.25),
        ])
    }

    fn square() -> Vec<Point> {
        vec![
            Point::new(1.0, 1.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 2.0),
        ]
    }

    #[test]
    fn case_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_case_csv(dir.path(), "Case", 3, Unit::Metres, &small_field()).unwrap();
        assert_eq!(path, dir.path().join("Case_3.csv"));
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text, "x(m),y(m)\r\n0.0,0.0\r\n5.0,0.0\r\n2.5,4.25\r\n");
    }

    #[test]
    fn non_metre_units_are_feet() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_case_csv(dir.path(), "F", 0, Unit::Feet, &small_field()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("x(ft),y(ft)\r\n"));
    }

    #[test]
    fn summary_has_counts_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let summary = SweepSummary {
            possible: 10,
            evaluated: 10,
            accepted: 4,
            rejected_area: 6,
            ..SweepSummary::default()
        };
        let path = write_summary(dir.path(), &summary).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["accepted"], 4);
        assert_eq!(value["rejected_area"], 6);
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn gallery_has_one_page_per_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Graphs.html");
        let mut gallery = SvgGallery::new(path.clone());
        gallery.render("Case_0", &small_field(), &square()).unwrap();
        gallery.render("Case_7", &small_field(), &square()).unwrap();
        gallery.finish().unwrap();

        let html = fs::read_to_string(path).unwrap();
        assert_eq!(html.matches("<svg").count(), 2);
        assert!(html.contains("Case_7"));
        assert_eq!(html.matches("<circle").count(), 6);
        assert!(html.contains("<polygon"));
    }

    #[test]
    fn empty_gallery_is_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Graphs.html");
        SvgGallery::new(path.clone()).finish().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn page_bounds_cover_holes_and_outline() {
        let (min, max) = page_bounds(&small_field(), &square());
        assert_eq!(min, Point::new(0.0, 0.0));
        assert_eq!(max, Point::new(5.0, 4.25));
    }
}

/// Writes one accepted field to `<dir>/<base_name>_<sequence>.csv`.
///
/// Records end in `\r\n`, the usual CSV line terminator.
pub fn write_case_csv(
    dir: &Path,
    base_name: &str,
    sequence: usize,
    unit: Unit,
    field: &BoreholeField,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}_{}.csv", base_name, sequence));
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let label = unit.label();
    write!(writer, "x({}),y({}){}", label, label, CSV_TERMINATOR)?;
    for (x, y) in field.coordinates() {
        write!(writer, "{:?},{:?}{}", x, y, CSV_TERMINATOR)?;
    }
    writer.flush()?;

    Ok(path)
}

#[derive(Serialize)]
struct SummaryRecord<'a> {
    generated_at: String,
    #[serde(flatten)]
    summary: &'a SweepSummary,
}

/// Writes the sweep tallies to `<dir>/summary.json`.
pub fn write_summary(dir: &Path, summary: &SweepSummary) -> Result<PathBuf> {
    let path = dir.join("summary.json");
    let record = SummaryRecord {
        generated_at: Local::now().to_rfc3339(),
        summary,
    };
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &record)?;
    info!("Summary written to {}", path.display());
    Ok(path)
}

/// Writes the resolved settings to `<dir>/settings.toml`.
pub fn write_settings_snapshot(dir: &Path, settings: &Settings) -> Result<PathBuf> {
    let path = dir.join("settings.toml");
    let text = toml::to_string_pretty(settings).context("serializing settings")?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Something that can display sampled fields.
pub trait Visualizer {
    /// Adds one field and the outline of its no-go zone.
    fn render(&mut self, title: &str, field: &BoreholeField, outline: &[Point]) -> Result<()>;

    /// Called once after the last field.
    fn finish(&mut self) -> Result<()>;
}

const PAGE_SIZE: f64 = 600.0;
const PAGE_MARGIN: f64 = 30.0;
const HOLE_RADIUS: f64 = 3.0;

/// Collects fields into a single HTML document with one SVG page each.
pub struct SvgGallery {
    path: PathBuf,
    pages: Vec<String>,
}

impl SvgGallery {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            pages: Vec::new(),
        }
    }
}

impl Visualizer for SvgGallery {
    fn render(&mut self, title: &str, field: &BoreholeField, outline: &[Point]) -> Result<()> {
        let (min, max) = page_bounds(field, outline);
        let span = (max.x - min.x).max(max.y - min.y).max(f64::EPSILON);
        let scale = (PAGE_SIZE - 2.0 * PAGE_MARGIN) / span;
        // flip y so north is up
        let to_page = |p: &Point| {
            (
                PAGE_MARGIN + (p.x - min.x) * scale,
                PAGE_SIZE - PAGE_MARGIN - (p.y - min.y) * scale,
            )
        };

        let polygon = outline
            .iter()
            .map(|p| {
                let (x, y) = to_page(p);
                format!("{:.2},{:.2}", x, y)
            })
            .join(" ");
        let holes = field
            .holes()
            .iter()
            .map(|p| {
                let (x, y) = to_page(p);
                format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\" fill=\"steelblue\"/>",
                    x, y, HOLE_RADIUS
                )
            })
            .join("\n");

        self.pages.push(format!(
            "<section>\n<h2>{title}</h2>\n<p>{count} boreholes</p>\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{size}\" height=\"{size}\">\n\
             <polygon points=\"{polygon}\" fill=\"none\" stroke=\"firebrick\" stroke-width=\"2\"/>\n\
             {holes}\n</svg>\n</section>",
            title = title,
            count = field.len(),
            size = PAGE_SIZE,
            polygon = polygon,
            holes = holes,
        ));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let file =
            File::create(&self.path).with_context(|| format!("creating {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "<!DOCTYPE html>")?;
        writeln!(writer, "<html><head><meta charset=\"utf-8\"><title>Graphs</title>")?;
        writeln!(
            writer,
            "<style>section {{ page-break-after: always; }}</style></head><body>"
        )?;
        for page in &self.pages {
            writeln!(writer, "{}", page)?;
        }
        writeln!(writer, "</body></html>")?;
        writer.flush()?;
        info!("{} graphs written to {}", self.pages.len(), self.path.display());
        Ok(())
    }
}

/// Axis-aligned bounds of the holes and the outline together.
fn page_bounds(field: &BoreholeField, outline: &[Point]) -> (Point, Point) {
    let coords: LineString<f64> = field
        .holes()
        .iter()
        .chain(outline)
        .map(|p| Coord { x: p.x, y: p.y })
        .collect::<Vec<_>>()
        .into();
    match coords.bounding_rect() {
        Some(rect) => (
            Point::new(rect.min().x, rect.min().y),
            Point::new(rect.max().x, rect.max().y),
        ),
        None => (Point::origin(), Point::origin()),
    }
}
