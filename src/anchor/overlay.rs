//! Highlight overlay state
//!
//! The overlay is a plain list of rectangles; whatever draws the page
//! projects it into visual elements. At most one set is installed at a time.

use log::info;
use serde::Serialize;

use super::matcher::{MatchResult, MatchTier};
use super::text_layer::BoundingBox;

/// Visual emphasis, chosen by how confident the match is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStyle {
    /// Literal hit
    Strong,
    /// Paragraph-context hit
    Soft,
}

impl HighlightStyle {
    #[must_use]
    pub fn for_tier(tier: MatchTier) -> Option<Self> {
        match tier {
            MatchTier::Exact => Some(Self::Strong),
            MatchTier::Context => Some(Self::Soft),
            MatchTier::None => None,
        }
    }
}

/// One highlighted run. Purely visual, takes no input.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Highlight {
    pub run_index: usize,
    pub bounding_box: BoundingBox,
    pub style: HighlightStyle,
}

/// Where the viewer should scroll to reveal the first highlight
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScrollTarget {
    /// Page index (0-indexed)
    pub page: usize,
    pub bounding_box: BoundingBox,
}

impl ScrollTarget {
    /// Vertical page offset that centers the target in a viewport of the
    /// given height.
    #[must_use]
    pub fn centered_offset(&self, viewport_height: f64) -> f64 {
        let center = self.bounding_box.y + self.bounding_box.height / 2.0;
        (center - viewport_height / 2.0).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayOutcome {
    Installed { count: usize },
    NotFound,
}

#[derive(Debug, Default)]
pub struct HighlightOverlay {
    highlights: Vec<Highlight>,
    page: Option<usize>,
    scroll_target: Option<ScrollTarget>,
}

impl HighlightOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is installed with the runs of `result`.
    pub fn apply(&mut self, result: &MatchResult, page: usize) -> OverlayOutcome {
        self.clear();

        let Some(style) = HighlightStyle::for_tier(result.tier) else {
            return OverlayOutcome::NotFound;
        };
        if result.runs.is_empty() {
            return OverlayOutcome::NotFound;
        }

        self.highlights = result
            .runs
            .iter()
            .map(|run| Highlight {
                run_index: run.run_index,
                bounding_box: run.bounding_box,
                style,
            })
            .collect();
        self.page = Some(page);
        self.scroll_target = self.highlights.first().map(|h| ScrollTarget {
            page,
            bounding_box: h.bounding_box,
        });

        info!(
            "Installed {} {:?} highlights on page {}",
            self.highlights.len(),
            style,
            page + 1
        );
        OverlayOutcome::Installed {
            count: self.highlights.len(),
        }
    }

    /// Remove every highlight. Safe to call with nothing installed.
    pub fn clear(&mut self) {
        self.highlights.clear();
        self.page = None;
        self.scroll_target = None;
    }

    #[must_use]
    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    /// Page the highlights belong to (0-indexed)
    #[must_use]
    pub fn page(&self) -> Option<usize> {
        self.page
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    #[must_use]
    pub fn scroll_target(&self) -> Option<ScrollTarget> {
        self.scroll_target
    }

    /// Hand the pending scroll to the viewer; later calls return `None`
    /// until new highlights are installed.
    pub fn take_scroll_target(&mut self) -> Option<ScrollTarget> {
        self.scroll_target.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::text_layer::TextRun;

    fn result(tier: MatchTier, indices: &[usize]) -> MatchResult {
        MatchResult {
            tier,
            runs: indices
                .iter()
                .map(|&i| TextRun {
                    text: format!("run {i}"),
                    bounding_box: BoundingBox::new(5.0, 30.0 * i as f64, 80.0, 12.0),
                    run_index: i,
                })
                .collect(),
        }
    }

    #[test]
    fn none_then_match_leaves_only_second_result() {
        let mut overlay = HighlightOverlay::new();

        assert_eq!(
            overlay.apply(&MatchResult::none(), 2),
            OverlayOutcome::NotFound
        );
        assert!(overlay.is_empty());

        let outcome = overlay.apply(&result(MatchTier::Exact, &[1, 3]), 2);
        assert_eq!(outcome, OverlayOutcome::Installed { count: 2 });
        let indices: Vec<usize> = overlay.highlights().iter().map(|h| h.run_index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn new_result_replaces_previous_set() {
        let mut overlay = HighlightOverlay::new();
        overlay.apply(&result(MatchTier::Exact, &[0, 1, 2]), 0);
        overlay.apply(&result(MatchTier::Context, &[4]), 1);

        assert_eq!(overlay.highlights().len(), 1);
        assert_eq!(overlay.highlights()[0].style, HighlightStyle::Soft);
        assert_eq!(overlay.page(), Some(1));
    }

    #[test]
    fn clearing_twice_is_harmless() {
        let mut overlay = HighlightOverlay::new();
        overlay.apply(&result(MatchTier::Exact, &[0]), 0);

        overlay.clear();
        overlay.clear();
        assert!(overlay.is_empty());
        assert_eq!(overlay.page(), None);
        assert_eq!(overlay.scroll_target(), None);
    }

    #[test]
    fn scrolls_to_first_highlight() {
        let mut overlay = HighlightOverlay::new();
        overlay.apply(&result(MatchTier::Exact, &[3, 5]), 4);

        let target = overlay.take_scroll_target().unwrap();
        assert_eq!(target.page, 4);
        assert_eq!(target.bounding_box.y, 90.0);
        assert_eq!(target.centered_offset(100.0), 46.0);
        assert!(overlay.take_scroll_target().is_none());
    }

    #[test]
    fn centered_offset_never_negative() {
        let target = ScrollTarget {
            page: 0,
            bounding_box: BoundingBox::new(0.0, 10.0, 50.0, 10.0),
        };
        assert_eq!(target.centered_offset(800.0), 0.0);
    }
}
