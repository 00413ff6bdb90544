//! Tiered matching of answer fragments against a page's text runs

use log::debug;
use serde::Serialize;

use super::request::HighlightRequest;
use super::text_layer::TextRun;

/// Which strategy produced a match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Literal, case-insensitive substring hit
    Exact,
    /// Several distinguishing words from the surrounding paragraph co-occur
    Context,
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub tier: MatchTier,
    pub runs: Vec<TextRun>,
}

impl MatchResult {
    #[must_use]
    pub fn none() -> Self {
        Self {
            tier: MatchTier::None,
            runs: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        self.tier != MatchTier::None
    }
}

/// Thresholds for the paragraph-context tier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchConfig {
    /// How many qualifying context words are kept
    pub context_token_limit: usize,
    /// Minimum word length (in chars) for a context word to qualify
    pub context_min_token_len: usize,
    /// How many context words a run must contain
    pub context_min_shared_tokens: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            context_token_limit: 5,
            context_min_token_len: 4,
            context_min_shared_tokens: 2,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MatchEngine {
    config: MatchConfig,
}

impl MatchEngine {
    #[must_use]
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Find the runs a request refers to, trying each tier in order.
    #[must_use]
    pub fn find(&self, request: &HighlightRequest, runs: &[TextRun]) -> MatchResult {
        let lowered: Vec<String> = runs.iter().map(|r| r.text.to_lowercase()).collect();

        for candidate in exact_candidates(request) {
            let needle = candidate.to_lowercase();
            let hits = select(runs, &lowered, |text| text.contains(needle.as_str()));
            if !hits.is_empty() {
                debug!(
                    "Exact tier: '{}' matched {} of {} runs",
                    candidate,
                    hits.len(),
                    runs.len()
                );
                return MatchResult {
                    tier: MatchTier::Exact,
                    runs: hits,
                };
            }
        }

        if let Some(context) = request.paragraph_context.as_deref() {
            let tokens = self.context_tokens(context);
            let required = self.config.context_min_shared_tokens;
            if !tokens.is_empty() {
                let hits = select(runs, &lowered, |text| {
                    tokens.iter().filter(|t| text.contains(t.as_str())).count() >= required
                });
                if !hits.is_empty() {
                    debug!(
                        "Context tier: tokens {:?} matched {} runs",
                        tokens,
                        hits.len()
                    );
                    return MatchResult {
                        tier: MatchTier::Context,
                        runs: hits,
                    };
                }
            }
        }

        debug!(
            "No tier matched '{}' in {} runs",
            request.display_term(),
            runs.len()
        );
        MatchResult::none()
    }

    /// Distinguishing words from a paragraph, lower-cased, in order.
    #[must_use]
    pub fn context_tokens(&self, context: &str) -> Vec<String> {
        context
            .split_whitespace()
            .filter(|w| w.chars().count() >= self.config.context_min_token_len)
            .take(self.config.context_token_limit)
            .map(str::to_lowercase)
            .collect()
    }
}

/// Exact-tier candidates: the verbatim quote first (when it adds something),
/// then the search term.
fn exact_candidates(request: &HighlightRequest) -> Vec<&str> {
    let term = request.search_term.trim();
    let mut candidates = Vec::with_capacity(2);

    if let Some(exact) = request.exact_match.as_deref().map(str::trim) {
        if !exact.is_empty() && !exact.eq_ignore_ascii_case(term) {
            candidates.push(exact);
        }
    }
    if !term.is_empty() {
        candidates.push(term);
    }

    candidates
}

fn select(runs: &[TextRun], lowered: &[String], pred: impl Fn(&str) -> bool) -> Vec<TextRun> {
    runs.iter()
        .zip(lowered)
        .filter(|(_, text)| pred(text.as_str()))
        .map(|(run, _)| run.clone())
        .collect()
}
