//! Navigation state machine for highlight requests
//!
//! A request is matched only once its page is on screen with a current text
//! layer. Otherwise the viewer is asked to switch pages and matching waits
//! for the render to land, or for the settle delay to run out.

use std::time::{Duration, Instant};

use super::request::{HighlightRequest, RequestFault, RequestId};

/// The request currently being worked on
#[derive(Clone, Debug, PartialEq)]
pub struct InFlight {
    pub id: RequestId,
    /// Target page (0-indexed)
    pub page: usize,
    pub request: HighlightRequest,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    /// Page switch decided, not yet handed to the viewer
    PendingPageSwitch(InFlight),
    /// Viewer is rendering the target page
    RenderingPage { in_flight: InFlight, deadline: Instant },
    /// Target page is on screen; matching runs now
    Ready(InFlight),
}

impl Phase {
    #[must_use]
    pub fn in_flight(&self) -> Option<&InFlight> {
        match self {
            Phase::Idle => None,
            Phase::PendingPageSwitch(f) | Phase::Ready(f) => Some(f),
            Phase::RenderingPage { in_flight, .. } => Some(in_flight),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }
}

/// Navigation state for the document on screen
#[derive(Clone, Debug)]
pub struct NavigationState {
    /// Total page count
    pub page_count: usize,

    /// Page on screen (0-indexed)
    pub current_page: usize,

    /// Generation of the on-screen text layer, while it still matches the view
    pub rendered_generation: Option<u64>,

    pub phase: Phase,

    /// Fallback wait for a render that never reports completion
    pub settle_delay: Duration,

    next_request_id: u64,
}

impl NavigationState {
    #[must_use]
    pub fn new(page_count: usize, settle_delay: Duration) -> Self {
        Self {
            page_count,
            current_page: 0,
            rendered_generation: None,
            phase: Phase::Idle,
            settle_delay,
            next_request_id: 1,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Submit(request) => self.submit(request),

            Command::PageSwitchIssued { now } => {
                if let Phase::PendingPageSwitch(in_flight) = &self.phase {
                    self.phase = Phase::RenderingPage {
                        in_flight: in_flight.clone(),
                        deadline: now + self.settle_delay,
                    };
                }
                vec![]
            }

            Command::PageRendered { page, generation } => {
                let mut effects = vec![];
                if page != self.current_page {
                    effects.push(Effect::ClearOverlay);
                }
                self.current_page = page;
                self.rendered_generation = Some(generation);

                let waiting_on_page = matches!(
                    &self.phase,
                    Phase::PendingPageSwitch(f) | Phase::RenderingPage { in_flight: f, .. }
                        if f.page == page
                );
                if waiting_on_page {
                    effects.extend(self.make_ready());
                }
                effects
            }

            Command::Tick { now } => {
                let settled = matches!(
                    &self.phase,
                    Phase::RenderingPage { deadline, .. } if now >= *deadline
                );
                if settled { self.make_ready() } else { vec![] }
            }

            Command::ViewChanged => {
                self.rendered_generation = None;
                vec![Effect::ClearOverlay]
            }

            Command::SetPageCount(count) => {
                self.page_count = count;
                if self.current_page >= count && count > 0 {
                    self.current_page = count - 1;
                }
                vec![]
            }

            Command::MatchApplied(id) => {
                if matches!(&self.phase, Phase::Ready(f) if f.id == id) {
                    self.phase = Phase::Idle;
                }
                vec![]
            }
        }
    }

    fn submit(&mut self, request: HighlightRequest) -> Vec<Effect> {
        let page = match request.validate(self.page_count) {
            Ok(page) => page,
            Err(fault) => return vec![Effect::Dropped(fault)],
        };

        let id = self.next_id();
        let mut effects = vec![];
        if let Some(previous) = self.phase.in_flight() {
            effects.push(Effect::Superseded(previous.id));
        }
        effects.push(Effect::ClearOverlay);

        let in_flight = InFlight { id, page, request };
        if page == self.current_page && self.rendered_generation.is_some() {
            self.phase = Phase::Ready(in_flight.clone());
            effects.push(Effect::Match(in_flight));
        } else {
            self.phase = Phase::PendingPageSwitch(in_flight);
            effects.push(Effect::SwitchPage(page));
        }
        effects
    }

    fn make_ready(&mut self) -> Vec<Effect> {
        match std::mem::take(&mut self.phase) {
            Phase::PendingPageSwitch(f) | Phase::RenderingPage { in_flight: f, .. } => {
                self.phase = Phase::Ready(f.clone());
                vec![Effect::Match(f)]
            }
            other => {
                self.phase = other;
                vec![]
            }
        }
    }

    /// Whether `id` is the request the machine is ready to apply
    #[must_use]
    pub fn is_ready_for(&self, id: RequestId) -> bool {
        matches!(&self.phase, Phase::Ready(f) if f.id == id)
    }

    #[must_use]
    pub fn is_generation_current(&self, generation: u64) -> bool {
        self.rendered_generation == Some(generation)
    }

    /// When the settle delay of the in-flight request runs out
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::RenderingPage { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

/// Commands that drive navigation state
#[derive(Clone, Debug)]
pub enum Command {
    /// A highlight request arrived
    Submit(HighlightRequest),
    /// The viewer accepted a page switch
    PageSwitchIssued { now: Instant },
    /// The viewer finished rendering a page
    PageRendered { page: usize, generation: u64 },
    /// Clock advanced
    Tick { now: Instant },
    /// Zoom or rotation changed; the on-screen text layer is stale
    ViewChanged,
    /// Update the page count
    SetPageCount(usize),
    /// The in-flight match was applied to the overlay
    MatchApplied(RequestId),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Request rejected before matching
    Dropped(RequestFault),
    /// An older in-flight request lost to a newer one
    Superseded(RequestId),
    /// Remove every installed highlight
    ClearOverlay,
    /// Ask the viewer to show a page (0-indexed)
    SwitchPage(usize),
    /// Run the matcher for this request against the on-screen text layer
    Match(InFlight),
}
