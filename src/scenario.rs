//! Scenario replay: drive the highlight engine against a simulated viewer
//! on a virtual clock.
//!
//! The simulated viewer honours page switches by delivering the page's
//! render payload after a fixed latency, or never when the latency is
//! `null`, which leaves the settle delay to decide.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::anchor::{
    ChannelClosed, EngineConfig, Highlight, HighlightPublisher, HighlightRequest,
    HighlightService, PageNavigator, PageSize, RawGlyphRun, highlight_channel,
};
use crate::notification::NotificationLevel;

const DEFAULT_PAGE_SIZE: PageSize = PageSize::new(612.0, 792.0);

/// A recorded viewer session
#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    pub total_pages: usize,

    #[serde(default)]
    pub pages: Vec<PagePayload>,

    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub rotation: i32,

    /// Milliseconds between a page switch and its render completing;
    /// `null` means the viewer never reports completion
    #[serde(default = "default_render_latency_ms")]
    pub render_latency_ms: Option<u64>,

    /// Page shown when the session starts (1-based)
    #[serde(default = "default_start_page")]
    pub start_page: usize,

    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

fn default_scale() -> f64 {
    1.0
}

fn default_render_latency_ms() -> Option<u64> {
    Some(200)
}

fn default_start_page() -> usize {
    1
}

impl Scenario {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// What the renderer produces for one page
#[derive(Clone, Debug, Deserialize)]
pub struct PagePayload {
    /// 1-based page number
    pub page: usize,
    #[serde(default = "default_page_width")]
    pub page_width: f64,
    #[serde(default = "default_page_height")]
    pub page_height: f64,
    #[serde(default)]
    pub runs: Vec<RawGlyphRun>,
}

fn default_page_width() -> f64 {
    DEFAULT_PAGE_SIZE.width
}

fn default_page_height() -> f64 {
    DEFAULT_PAGE_SIZE.height
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioEvent {
    /// The assistant publishes a highlight request
    Request { request: HighlightRequest },
    /// The viewer renders a page (1-based) on its own, e.g. user scrolling
    Render { page: usize },
    /// Virtual time passes
    Advance { ms: u64 },
    SetScale { scale: f64 },
    SetRotation { degrees: i32 },
    /// The user dismisses the highlights
    Clear,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("page {page} is outside the document (1..={total})")]
    PageOutOfDocument { page: usize, total: usize },

    #[error(transparent)]
    Channel(#[from] ChannelClosed),
}

/// Stand-in for a real viewer: records page switches for the replay loop
#[derive(Debug, Default)]
pub struct SimulatedViewer {
    requested: Vec<usize>,
    history: Vec<usize>,
}

impl SimulatedViewer {
    fn take_requested(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.requested)
    }

    /// Every page switch ever requested (0-indexed)
    #[must_use]
    pub fn history(&self) -> &[usize] {
        &self.history
    }
}

impl PageNavigator for SimulatedViewer {
    fn switch_to_page(&mut self, page: usize) {
        self.requested.push(page);
        self.history.push(page);
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationRecord {
    /// Virtual milliseconds since the session started
    pub at_ms: u64,
    pub message: String,
    pub level: NotificationLevel,
    pub located_page: Option<usize>,
}

/// Outcome of a replay. Page numbers are 1-based.
#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub final_page: usize,
    pub highlight_page: Option<usize>,
    pub highlights: Vec<Highlight>,
    pub notifications: Vec<NotificationRecord>,
    pub page_switches: Vec<usize>,
}

#[derive(Clone, Copy, Debug)]
struct ScheduledRender {
    page: usize,
    due: Instant,
}

struct Replay {
    service: HighlightService<SimulatedViewer>,
    publisher: HighlightPublisher,
    payloads: HashMap<usize, PagePayload>,
    latency: Option<Duration>,
    total_pages: usize,
    start: Instant,
    now: Instant,
    renders: Vec<ScheduledRender>,
    notifications: Vec<NotificationRecord>,
    last_seen_id: u64,
}

/// Run a scenario to completion and report where it ended.
pub fn replay(scenario: &Scenario, config: EngineConfig) -> Result<ReplayReport, ReplayError> {
    let (publisher, subscriber) = highlight_channel();
    let start = Instant::now();
    let mut service = HighlightService::new(
        SimulatedViewer::default(),
        subscriber,
        scenario.total_pages,
        config,
    );
    service.set_scale(scenario.scale, start);
    service.set_rotation(scenario.rotation, start);

    let payloads = scenario
        .pages
        .iter()
        .filter(|p| p.page >= 1)
        .map(|p| (p.page - 1, p.clone()))
        .collect();

    let mut replay = Replay {
        service,
        publisher,
        payloads,
        latency: scenario.render_latency_ms.map(Duration::from_millis),
        total_pages: scenario.total_pages,
        start,
        now: start,
        renders: Vec::new(),
        notifications: Vec::new(),
        last_seen_id: 0,
    };

    info!(
        "Replaying {} events over {} pages",
        scenario.events.len(),
        scenario.total_pages
    );
    if scenario.total_pages > 0 {
        replay.render_now(scenario.start_page)?;
    }
    for event in &scenario.events {
        replay.handle(event)?;
    }
    replay.settle();

    Ok(replay.report())
}

impl Replay {
    fn handle(&mut self, event: &ScenarioEvent) -> Result<(), ReplayError> {
        debug!("Replay event at {}ms: {event:?}", self.elapsed_ms());
        match event {
            ScenarioEvent::Request { request } => {
                self.publisher.publish(request.clone())?;
                self.service.tick(self.now);
                self.after_step();
            }
            ScenarioEvent::Render { page } => self.render_now(*page)?,
            ScenarioEvent::Advance { ms } => {
                let target = self.now + Duration::from_millis(*ms);
                self.advance_to(target);
            }
            ScenarioEvent::SetScale { scale } => {
                self.service.set_scale(*scale, self.now);
                self.after_step();
            }
            ScenarioEvent::SetRotation { degrees } => {
                self.service.set_rotation(*degrees, self.now);
                self.after_step();
            }
            ScenarioEvent::Clear => self.service.clear_highlights(),
        }
        Ok(())
    }

    fn render_now(&mut self, page: usize) -> Result<(), ReplayError> {
        if page == 0 || page > self.total_pages {
            return Err(ReplayError::PageOutOfDocument {
                page,
                total: self.total_pages,
            });
        }
        self.deliver(page - 1);
        self.after_step();
        Ok(())
    }

    fn deliver(&mut self, page: usize) {
        let (runs, size) = match self.payloads.get(&page) {
            Some(payload) => (
                payload.runs.as_slice(),
                PageSize::new(payload.page_width, payload.page_height),
            ),
            None => (&[][..], DEFAULT_PAGE_SIZE),
        };
        self.service.on_page_rendered(page, runs, size, self.now);
    }

    /// Step the clock to `target`, stopping at every render and settle
    /// deadline on the way.
    fn advance_to(&mut self, target: Instant) {
        loop {
            let next_render = self.renders.iter().map(|r| r.due).min();
            let next = [next_render, self.service.next_deadline()]
                .into_iter()
                .flatten()
                .min();
            match next {
                Some(at) if at <= target => {
                    self.now = self.now.max(at);
                    self.step();
                }
                _ => break,
            }
        }
        self.now = target;
        self.step();
    }

    /// Run out every scheduled render and pending settle delay.
    fn settle(&mut self) {
        let mut target = self.now;
        while let Some(at) = [
            self.renders.iter().map(|r| r.due).max(),
            self.service.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .max()
        {
            if at <= target {
                break;
            }
            target = at;
            self.advance_to(target);
        }
    }

    fn step(&mut self) {
        let now = self.now;
        let mut due: Vec<ScheduledRender> = Vec::new();
        self.renders.retain(|r| {
            if r.due <= now {
                due.push(*r);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|r| r.due);
        for render in due {
            self.deliver(render.page);
        }
        self.record_notifications();

        self.service.tick(now);
        self.after_step();
    }

    fn after_step(&mut self) {
        for page in self.service.navigator_mut().take_requested() {
            match self.latency {
                Some(latency) => self.renders.push(ScheduledRender {
                    page,
                    due: self.now + latency,
                }),
                None => debug!("Viewer never reports render of page {}", page + 1),
            }
        }
        self.record_notifications();
    }

    fn record_notifications(&mut self) {
        let at_ms = self.elapsed_ms();
        let mut fresh: Vec<NotificationRecord> = self
            .service
            .notifications()
            .all()
            .iter()
            .filter(|n| n.id > self.last_seen_id)
            .map(|n| NotificationRecord {
                at_ms,
                message: n.message.clone(),
                level: n.level,
                located_page: n.located_page,
            })
            .collect();
        if let Some(newest) = self.service.notifications().current() {
            self.last_seen_id = self.last_seen_id.max(newest.id);
        }
        // Newest first in the manager, oldest first in the report.
        fresh.reverse();
        self.notifications.extend(fresh);
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.now.duration_since(self.start).as_millis()).unwrap_or(u64::MAX)
    }

    fn report(self) -> ReplayReport {
        let overlay = self.service.overlay();
        ReplayReport {
            final_page: self.service.current_page() + 1,
            highlight_page: overlay.page().map(|p| p + 1),
            highlights: overlay.highlights().to_vec(),
            notifications: self.notifications,
            page_switches: self
                .service
                .navigator()
                .history()
                .iter()
                .map(|p| p + 1)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "total_pages": 10,
        "render_latency_ms": 150,
        "pages": [
            {
                "page": 5,
                "runs": [
                    {"text": "Introduction", "transform": [12, 0, 0, 12, 72, 720]},
                    {"text": "We used quantitative analysis", "transform": [10, 0, 0, 10, 72, 680]}
                ]
            }
        ],
        "events": [
            {"type": "request", "request": {"page": 5, "searchTerm": "quantitative analysis"}},
            {"type": "advance", "ms": 500}
        ]
    }"#;

    #[test]
    fn parses_scenario_with_defaults() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert_eq!(scenario.scale, 1.0);
        assert_eq!(scenario.start_page, 1);
        assert_eq!(scenario.pages[0].page_width, 612.0);
        assert_eq!(scenario.pages[0].runs.len(), 2);
        assert!(matches!(
            &scenario.events[0],
            ScenarioEvent::Request { request } if request.page == 5
        ));
    }

    #[test]
    fn replay_switches_renders_and_highlights() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let report = replay(&scenario, EngineConfig::default()).unwrap();

        assert_eq!(report.final_page, 5);
        assert_eq!(report.page_switches, vec![5]);
        assert_eq!(report.highlight_page, Some(5));
        assert_eq!(report.highlights.len(), 1);
        assert_eq!(report.highlights[0].run_index, 1);

        assert_eq!(report.notifications.len(), 1);
        let note = &report.notifications[0];
        assert_eq!(note.level, NotificationLevel::Success);
        assert_eq!(note.at_ms, 150);
        assert!(note.message.contains("page 5"));
    }

    #[test]
    fn silent_viewer_falls_back_to_settle_delay() {
        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.render_latency_ms = None;
        scenario.events.truncate(1);

        let report = replay(&scenario, EngineConfig::default()).unwrap();
        assert_eq!(report.final_page, 1);
        assert!(report.highlights.is_empty());
        let note = &report.notifications[0];
        assert_eq!(note.level, NotificationLevel::Warning);
        assert_eq!(note.at_ms, 1000);
        assert_eq!(note.located_page, Some(5));
    }

    #[test]
    fn late_match_still_reports_notification() {
        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.events = vec![
            ScenarioEvent::Advance { ms: 5000 },
            ScenarioEvent::Request {
                request: HighlightRequest::new(5, "quantitative analysis"),
            },
            ScenarioEvent::Advance { ms: 1000 },
        ];

        let report = replay(&scenario, EngineConfig::default()).unwrap();
        assert_eq!(report.highlights.len(), 1);
        assert_eq!(report.notifications.len(), 1);
        assert_eq!(report.notifications[0].at_ms, 5150);
    }

    #[test]
    fn render_event_outside_document_fails() {
        let mut scenario = Scenario::from_json(SCENARIO).unwrap();
        scenario.events = vec![ScenarioEvent::Render { page: 11 }];

        let err = replay(&scenario, EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::PageOutOfDocument { page: 11, total: 10 }
        ));
    }
}
