//! Text anchoring: locate an answer fragment on a rendered page and
//! highlight it

mod cache;
mod channel;
mod geometry;
mod matcher;
mod overlay;
mod request;
mod service;
mod state;
mod text_layer;

pub use cache::{LayerKey, TextLayerCache};
pub use channel::{ChannelClosed, HighlightPublisher, HighlightSubscriber, highlight_channel};
pub use geometry::{PageSize, ScreenPosition, Transform, Viewport, normalize_rotation, to_screen};
pub use matcher::{MatchConfig, MatchEngine, MatchResult, MatchTier};
pub use overlay::{Highlight, HighlightOverlay, HighlightStyle, OverlayOutcome, ScrollTarget};
pub use request::{HighlightRequest, RequestFault, RequestId};
pub use service::{EngineConfig, HighlightService, PageNavigator};
pub use state::{Command, Effect, InFlight, NavigationState, Phase};
pub use text_layer::{
    BoundingBox, PageRenderState, RawGlyphRun, TextLayerConfig, TextRun, build_text_layer,
};
