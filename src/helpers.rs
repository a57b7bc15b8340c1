//! Interactive display of sampled fields.
//!
//! Only built with the `visualization` feature. Fields are collected by
//! [`Viewer::render`] and shown one at a time once [`Viewer::finish`] opens
//! the window: Enter advances to the next field, Escape closes the window.

use anyhow::Result;
use geo_types::Coord;
use macroquad::prelude::*;

use crate::field::BoreholeField;
use crate::geom::Point;
use crate::output::Visualizer;

const MARGIN: f32 = 40.0;
const HOLE_RADIUS: f32 = 3.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_fits_page_in_window() {
        let page = Page::new(
            "t",
            &BoreholeField::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)]),
            &[],
        );
        let frame = Frame::fit(&page, 200.0, 200.0);
        let (x0, y0) = frame.to_screen(Coord { x: 0.0, y: 0.0 });
        let (x1, y1) = frame.to_screen(Coord { x: 10.0, y: 5.0 });
        assert!((x0 - MARGIN).abs() < 1e-4);
        assert!((x1 - (200.0 - MARGIN)).abs() < 1e-4);
        // y grows downward on screen
        assert!(y1 < y0);
    }
}

struct Page {
    title: String,
    holes: Vec<Coord<f32>>,
    outline: Vec<Coord<f32>>,
}

impl Page {
    fn new(title: &str, field: &BoreholeField, outline: &[Point]) -> Self {
        let to_coord = |p: &Point| Coord {
            x: p.x as f32,
            y: p.y as f32,
        };
        Self {
            title: title.to_string(),
            holes: field.holes().iter().map(to_coord).collect(),
            outline: outline.iter().map(to_coord).collect(),
        }
    }
}

/// Maps field coordinates onto the window.
struct Frame {
    min: Coord<f32>,
    scale: f32,
    height: f32,
}

impl Frame {
    fn fit(page: &Page, width: f32, height: f32) -> Self {
        let mut min = Coord {
            x: f32::INFINITY,
            y: f32::INFINITY,
        };
        let mut max = Coord {
            x: f32::NEG_INFINITY,
            y: f32::NEG_INFINITY,
        };
        for c in page.holes.iter().chain(&page.outline) {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        if !min.x.is_finite() {
            min = Coord { x: 0.0, y: 0.0 };
            max = Coord { x: 1.0, y: 1.0 };
        }
        let span = (max.x - min.x).max(max.y - min.y).max(f32::EPSILON);
        let scale = (width.min(height) - 2.0 * MARGIN) / span;
        Self { min, scale, height }
    }

    fn to_screen(&self, c: Coord<f32>) -> (f32, f32) {
        (
            MARGIN + (c.x - self.min.x) * self.scale,
            self.height - MARGIN - (c.y - self.min.y) * self.scale,
        )
    }
}

/// Converts a closed line string to screen space and draws it.
fn lines_to_screen(points: &[Coord<f32>], frame: &Frame, color: Color, thickness: f32) {
    let screen_points: Vec<(f32, f32)> = points.iter().map(|&c| frame.to_screen(c)).collect();

    // Draw the polygon by connecting the points
    for i in 0..screen_points.len() {
        let (x1, y1) = screen_points[i];
        let (x2, y2) = screen_points[(i + 1) % screen_points.len()]; // Wrap around
        draw_line(x1, y1, x2, y2, thickness, color);
    }
}

fn draw_page(page: &Page) {
    let frame = Frame::fit(page, screen_width(), screen_height());
    lines_to_screen(&page.outline, &frame, RED, 2.0);
    for &hole in &page.holes {
        let (x, y) = frame.to_screen(hole);
        draw_circle(x, y, HOLE_RADIUS, BLUE);
    }
    draw_text(&page.title, MARGIN, MARGIN * 0.75, 24.0, BLACK);
}

/// Window that pages through sampled fields.
#[derive(Default)]
pub struct Viewer {
    pages: Vec<Page>,
}

impl Viewer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Visualizer for Viewer {
    fn render(&mut self, title: &str, field: &BoreholeField, outline: &[Point]) -> Result<()> {
        self.pages.push(Page::new(title, field, outline));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.pages.is_empty() {
            return Ok(());
        }
        let pages = std::mem::take(&mut self.pages);
        macroquad::Window::new("borelayout", async move {
            let mut current = 0;
            while current < pages.len() {
                clear_background(WHITE);
                draw_page(&pages[current]);

                if is_key_pressed(KeyCode::Enter) {
                    current += 1;
                }
                if is_key_pressed(KeyCode::Escape) {
                    break;
                }

                next_frame().await;
            }
        });
        Ok(())
    }
}
