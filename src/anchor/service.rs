//! Highlight service - wires the request channel, navigation, matching,
//! overlay and feedback together

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::cache::{LayerKey, TextLayerCache};
use super::channel::HighlightSubscriber;
use super::geometry::{PageSize, normalize_rotation};
use super::matcher::{MatchConfig, MatchEngine, MatchResult};
use super::overlay::HighlightOverlay;
use super::request::HighlightRequest;
use super::state::{Command, Effect, InFlight, NavigationState, Phase};
use super::text_layer::{PageRenderState, RawGlyphRun, TextLayerConfig, build_text_layer};
use crate::notification::{FeedbackNotifier, NotificationManager};

/// The viewer's page navigation API
///
/// Switching is asynchronous: the viewer reports the finished page later
/// through [`HighlightService::on_page_rendered`].
pub trait PageNavigator {
    /// Show a page (0-indexed)
    fn switch_to_page(&mut self, page: usize);
}

/// Tunables for the highlight service
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub settle_delay: Duration,
    pub notification_duration: Duration,
    pub matching: MatchConfig,
    pub layer: TextLayerConfig,
    pub cache_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            notification_duration: Duration::from_millis(4000),
            matching: MatchConfig::default(),
            layer: TextLayerConfig::default(),
            cache_size: 16,
        }
    }
}

/// Owns the on-screen text model and the highlight overlay
pub struct HighlightService<N: PageNavigator> {
    nav: NavigationState,
    active: Option<Arc<PageRenderState>>,
    overlay: HighlightOverlay,
    feedback: FeedbackNotifier,
    matcher: MatchEngine,
    layers: TextLayerCache,
    layer_config: TextLayerConfig,
    inbox: HighlightSubscriber,
    navigator: N,
    next_generation: u64,
    scale: f64,
    rotation: u16,
}

impl<N: PageNavigator> HighlightService<N> {
    #[must_use]
    pub fn new(
        navigator: N,
        inbox: HighlightSubscriber,
        page_count: usize,
        config: EngineConfig,
    ) -> Self {
        Self {
            nav: NavigationState::new(page_count, config.settle_delay),
            active: None,
            overlay: HighlightOverlay::new(),
            feedback: FeedbackNotifier::new(config.notification_duration),
            matcher: MatchEngine::new(config.matching),
            layers: TextLayerCache::new(config.cache_size),
            layer_config: config.layer,
            inbox,
            navigator,
            next_generation: 1,
            scale: 1.0,
            rotation: 0,
        }
    }

    /// Apply a command to the navigation state
    pub fn apply_command(&mut self, cmd: Command, now: Instant) {
        let effects = self.nav.apply(cmd);
        self.execute_effects(effects, now);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::Dropped(fault) => {
                    debug!("Dropping highlight request: {fault}");
                }

                Effect::Superseded(id) => {
                    debug!("Highlight request {id:?} superseded");
                }

                Effect::ClearOverlay => {
                    self.overlay.clear();
                }

                Effect::SwitchPage(page) => {
                    info!("Switching to page {} for highlight", page + 1);
                    self.navigator.switch_to_page(page);
                    let follow_up = self.nav.apply(Command::PageSwitchIssued { now });
                    self.execute_effects(follow_up, now);
                }

                Effect::Match(in_flight) => {
                    self.run_match(&in_flight, now);
                    let follow_up = self.nav.apply(Command::MatchApplied(in_flight.id));
                    self.execute_effects(follow_up, now);
                }
            }
        }
    }

    fn run_match(&mut self, in_flight: &InFlight, now: Instant) {
        if !self.nav.is_ready_for(in_flight.id) {
            debug!("Discarding match for superseded request {:?}", in_flight.id);
            return;
        }

        let page = in_flight.page;
        let result = match self.active.as_deref() {
            Some(state)
                if state.page_index == page
                    && self.nav.is_generation_current(state.render_generation) =>
            {
                self.matcher.find(&in_flight.request, &state.text_runs)
            }
            _ => {
                warn!(
                    "Text layer for page {} not ready after settle delay",
                    page + 1
                );
                MatchResult::none()
            }
        };

        self.overlay.apply(&result, page);
        self.feedback.notify(
            result.tier,
            in_flight.request.display_term(),
            result.runs.len(),
            page + 1,
            now,
        );
    }

    /// Handle a request directly, bypassing the channel
    pub fn submit(&mut self, request: HighlightRequest, now: Instant) {
        self.apply_command(Command::Submit(request), now);
    }

    /// Handle every request waiting in the channel, oldest first.
    /// Returns how many were taken.
    pub fn poll_requests(&mut self, now: Instant) -> usize {
        let requests = self.inbox.drain();
        let count = requests.len();
        for request in requests {
            self.submit(request, now);
        }
        count
    }

    /// Render completion signal from the viewer.
    ///
    /// Publishes a fresh text model for the page at the current zoom and
    /// rotation; the previous one is replaced whole.
    pub fn on_page_rendered(
        &mut self,
        page: usize,
        fragments: &[RawGlyphRun],
        page_size: PageSize,
        now: Instant,
    ) {
        let viewport = page_size.viewport(self.scale, i32::from(self.rotation));
        let key = LayerKey::from_viewport(page, &viewport);
        let text_runs = match self.layers.get(&key, fragments.len()) {
            Some(runs) => runs,
            None => {
                let runs = build_text_layer(fragments, &viewport, &self.layer_config);
                // Text content may not be ready yet; don't pin an empty layer.
                if runs.is_empty() {
                    Arc::from(runs)
                } else {
                    self.layers.insert(key, runs, fragments.len())
                }
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;
        self.active = Some(Arc::new(PageRenderState::new(
            page,
            viewport.scale,
            text_runs,
            generation,
        )));
        debug!(
            "Page {} rendered at scale {} (generation {generation})",
            page + 1,
            viewport.scale
        );

        self.apply_command(Command::PageRendered { page, generation }, now);
    }

    /// Zoom changed. Highlights go and matching waits for the next render.
    pub fn set_scale(&mut self, scale: f64, now: Instant) {
        if !scale.is_finite() || scale <= 0.0 {
            warn!("Ignoring invalid zoom scale {scale}");
            return;
        }
        if (scale - self.scale).abs() < f64::EPSILON {
            return;
        }
        self.scale = scale;
        self.apply_command(Command::ViewChanged, now);
    }

    /// Rotation changed, in degrees
    pub fn set_rotation(&mut self, degrees: i32, now: Instant) {
        let rotation = normalize_rotation(degrees);
        if rotation == self.rotation {
            return;
        }
        self.rotation = rotation;
        self.apply_command(Command::ViewChanged, now);
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    /// Drop cached layers for a page whose content changed
    pub fn page_needs_rerender(&mut self, page: usize, now: Instant) {
        self.layers.invalidate_page(page);
        if page == self.nav.current_page {
            self.apply_command(Command::ViewChanged, now);
        }
    }

    /// The document was reloaded, possibly with a different page count
    pub fn reload(&mut self, page_count: usize, now: Instant) {
        self.layers.invalidate_all();
        self.apply_command(Command::SetPageCount(page_count), now);
        self.apply_command(Command::ViewChanged, now);
    }

    /// Advance the clock: take queued requests, fire an elapsed settle
    /// delay, expire notifications. Returns true if anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let taken = self.poll_requests(now);

        let phase_before = self.nav.phase.clone();
        self.apply_command(Command::Tick { now }, now);
        let phase_changed = phase_before != self.nav.phase;

        let expired = self.feedback.manager_mut().update_at(now);
        taken > 0 || phase_changed || expired
    }

    /// User dismissed the highlights
    pub fn clear_highlights(&mut self) {
        self.overlay.clear();
    }

    #[must_use]
    pub fn overlay(&self) -> &HighlightOverlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut HighlightOverlay {
        &mut self.overlay
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationManager {
        self.feedback.manager()
    }

    #[must_use]
    pub fn active_state(&self) -> Option<&Arc<PageRenderState>> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.nav.phase
    }

    /// Page on screen (0-indexed)
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.nav.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.nav.page_count
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.nav.next_deadline()
    }

    #[must_use]
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }
}
