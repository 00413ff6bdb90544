//! Screen-anchored text layer reconstruction
//!
//! The renderer reports a page as an ordered stream of positioned glyph runs.
//! This module projects that stream through the page viewport and produces
//! the `TextRun` list the matcher searches.

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::geometry::{Transform, Viewport, to_screen};

/// Glyph run as reported by the renderer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawGlyphRun {
    pub text: String,
    /// PDF-space text transform
    pub transform: Transform,
    /// Advance width in PDF units, when the renderer reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl RawGlyphRun {
    pub fn new(text: impl Into<String>, transform: Transform) -> Self {
        Self {
            text: text.into(),
            transform,
            width: None,
        }
    }

    #[must_use]
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }
}

/// Axis-aligned rectangle in screen pixels, origin at the page's top-left
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// A glyph run placed on screen
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextRun {
    pub text: String,
    pub bounding_box: BoundingBox,
    /// Position of the source glyph run in the renderer's stream
    pub run_index: usize,
}

/// Layout parameters for box estimation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextLayerConfig {
    /// Average glyph advance as a fraction of the font size, used when the
    /// renderer reports no run width
    pub avg_glyph_width: f64,
    /// Ascent as a fraction of the font size
    pub ascent_ratio: f64,
}

impl Default for TextLayerConfig {
    fn default() -> Self {
        Self {
            avg_glyph_width: 0.5,
            ascent_ratio: 1.0,
        }
    }
}

/// Project a page's glyph runs into screen space.
///
/// Runs with blank text or non-finite geometry are dropped; the remaining
/// runs keep the renderer's order.
#[must_use]
pub fn build_text_layer(
    fragments: &[RawGlyphRun],
    viewport: &Viewport,
    config: &TextLayerConfig,
) -> Vec<TextRun> {
    let mut dropped = 0usize;

    let runs: Vec<TextRun> = fragments
        .iter()
        .enumerate()
        .filter_map(|(run_index, fragment)| {
            if fragment.text.trim().is_empty() {
                return None;
            }
            match project_run(fragment, viewport, config) {
                Some(bounding_box) => Some(TextRun {
                    text: fragment.text.clone(),
                    bounding_box,
                    run_index,
                }),
                None => {
                    dropped += 1;
                    None
                }
            }
        })
        .collect();

    if dropped > 0 {
        warn!("Dropped {dropped} glyph runs with non-finite geometry");
    }
    debug!(
        "Built text layer: {} of {} runs at scale {}",
        runs.len(),
        fragments.len(),
        viewport.scale
    );

    runs
}

fn project_run(
    fragment: &RawGlyphRun,
    viewport: &Viewport,
    config: &TextLayerConfig,
) -> Option<BoundingBox> {
    let pos = to_screen(&fragment.transform, &viewport.transform);
    if !pos.is_finite() {
        return None;
    }

    let font_size = pos.font_size_px;
    let width = match fragment.width {
        Some(w) => w * viewport.scale,
        None => fragment.text.chars().count() as f64 * font_size * config.avg_glyph_width,
    };
    if !width.is_finite() || width < 0.0 {
        return None;
    }

    let ascent = font_size * config.ascent_ratio;
    let (sin, cos) = pos.rotation_rad.sin_cos();

    // Top-left corner of the run, then the run's extent along and across
    // the baseline direction.
    let left = pos.x + ascent * sin;
    let top = pos.y - ascent * cos;
    let along = (width * cos, width * sin);
    let across = (-font_size * sin, font_size * cos);

    let xs = [left, left + along.0, left + across.0, left + along.0 + across.0];
    let ys = [top, top + along.1, top + across.1, top + along.1 + across.1];

    let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let bbox = BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y);
    bbox.is_finite().then_some(bbox)
}

/// The text model of the page currently on screen.
///
/// Never mutated in place: every render produces a new value with a fresh
/// generation, so a match computed against an older layout can be detected.
#[derive(Clone, Debug)]
pub struct PageRenderState {
    /// Page index (0-indexed)
    pub page_index: usize,
    pub viewport_scale: f64,
    pub text_runs: Arc<[TextRun]>,
    pub render_generation: u64,
}

impl PageRenderState {
    #[must_use]
    pub fn new(
        page_index: usize,
        viewport_scale: f64,
        text_runs: Arc<[TextRun]>,
        render_generation: u64,
    ) -> Self {
        Self {
            page_index,
            viewport_scale,
            text_runs,
            render_generation,
        }
    }
}
