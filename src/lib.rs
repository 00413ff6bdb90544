// Export modules for use in tests
pub mod anchor;
pub mod notification;
pub mod panic_handler;
pub mod scenario;
pub mod settings;

pub use anchor::{HighlightPublisher, HighlightRequest, HighlightService, PageNavigator};
pub use notification::{FeedbackNotifier, Notification, NotificationLevel, NotificationManager};
