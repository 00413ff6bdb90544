use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;

use crate::anchor::MatchTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Approximate,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub level: NotificationLevel,
    /// Page the viewer was taken to (1-based), when the message is about one
    pub located_page: Option<usize>,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(
        message: impl Into<String>,
        level: NotificationLevel,
        duration: Duration,
        now: Instant,
    ) -> Self {
        Self {
            id: 0,
            message: message.into(),
            level,
            located_page: None,
            created_at: now,
            expires_at: now + duration,
        }
    }

    #[must_use]
    pub fn with_located_page(mut self, page: usize) -> Self {
        self.located_page = Some(page);
        self
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
    next_id: u64,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(4))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
            next_id: 1,
        }
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Show a notification; the newest one is current.
    pub fn show(&mut self, mut notification: Notification) -> u64 {
        notification.id = self.next_id;
        self.next_id += 1;
        let id = notification.id;
        self.notifications.insert(0, notification);
        id
    }

    pub fn notify(
        &mut self,
        message: impl Into<String>,
        level: NotificationLevel,
        now: Instant,
    ) -> u64 {
        self.show(Notification::new(message, level, self.default_duration, now))
    }

    /// Remove notifications expired at `now`, returns true if any were removed
    pub fn update_at(&mut self, now: Instant) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired_at(now));
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn has_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

const MAX_TERM_CHARS: usize = 60;

/// Turns match outcomes into short-lived user messages
#[derive(Debug)]
pub struct FeedbackNotifier {
    manager: NotificationManager,
}

impl FeedbackNotifier {
    pub fn new(duration: Duration) -> Self {
        Self {
            manager: NotificationManager::with_default_duration(duration),
        }
    }

    /// Report the outcome of a highlight attempt. `page` is 1-based.
    pub fn notify(
        &mut self,
        tier: MatchTier,
        term: &str,
        count: usize,
        page: usize,
        now: Instant,
    ) -> u64 {
        let term = shorten(term);
        let (message, level) = match tier {
            MatchTier::Exact => {
                let noun = if count == 1 { "match" } else { "matches" };
                (
                    format!("Found {count} {noun} for \"{term}\" on page {page}"),
                    NotificationLevel::Success,
                )
            }
            MatchTier::Context => (
                format!("Approximate match for \"{term}\" highlighted on page {page}"),
                NotificationLevel::Approximate,
            ),
            MatchTier::None => (
                format!(
                    "Located page {page}, but \"{term}\" could not be highlighted exactly"
                ),
                NotificationLevel::Warning,
            ),
        };

        info!("{message}");
        let notification =
            Notification::new(message, level, self.manager.default_duration(), now)
                .with_located_page(page);
        self.manager.show(notification)
    }

    pub fn manager(&self) -> &NotificationManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut NotificationManager {
        &mut self.manager
    }
}

fn shorten(term: &str) -> String {
    let term = term.trim();
    if term.chars().count() > MAX_TERM_CHARS {
        let truncated: String = term.chars().take(MAX_TERM_CHARS).collect();
        format!("{truncated}...")
    } else {
        term.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_expiration() {
        let now = Instant::now();
        let notification = Notification::new(
            "test",
            NotificationLevel::Success,
            Duration::from_millis(50),
            now,
        );
        assert_eq!(notification.created_at, now);
        assert!(!notification.is_expired_at(now + Duration::from_millis(49)));
        assert!(notification.is_expired_at(now + Duration::from_millis(50)));
    }

    #[test]
    fn manager_shows_newest_first() {
        let now = Instant::now();
        let mut manager = NotificationManager::new();

        manager.notify("First", NotificationLevel::Success, now);
        manager.notify("Second", NotificationLevel::Approximate, now);
        manager.notify("Third", NotificationLevel::Warning, now);

        assert_eq!(manager.count(), 3);
        let current = manager.current().unwrap();
        assert_eq!(current.message, "Third");
        assert_eq!(current.level, NotificationLevel::Warning);
        assert_eq!(current.id, 3);
    }

    #[test]
    fn manager_removes_expired() {
        let now = Instant::now();
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(50));

        manager.notify("Short-lived", NotificationLevel::Success, now);
        let created = manager.current().unwrap().created_at;
        assert_eq!(created, now);
        assert!(!manager.update_at(created));
        assert_eq!(manager.count(), 1);

        assert!(manager.update_at(created + Duration::from_millis(60)));
        assert!(!manager.has_notifications());
    }

    #[test]
    fn manager_dismiss_current() {
        let now = Instant::now();
        let mut manager = NotificationManager::new();

        manager.notify("First", NotificationLevel::Success, now);
        manager.notify("Second", NotificationLevel::Success, now);

        assert!(manager.dismiss_current());
        assert_eq!(manager.current().unwrap().message, "First");
        manager.clear();
        assert!(!manager.dismiss_current());
    }

    #[test]
    fn exact_tier_names_count_and_page() {
        let now = Instant::now();
        let mut feedback = FeedbackNotifier::new(Duration::from_secs(4));
        feedback.notify(MatchTier::Exact, "quantitative analysis", 1, 5, now);

        let current = feedback.manager().current().unwrap();
        assert_eq!(current.level, NotificationLevel::Success);
        assert_eq!(
            current.message,
            "Found 1 match for \"quantitative analysis\" on page 5"
        );
        assert_eq!(current.located_page, Some(5));
    }

    #[test]
    fn context_tier_is_approximate() {
        let now = Instant::now();
        let mut feedback = FeedbackNotifier::new(Duration::from_secs(4));
        feedback.notify(MatchTier::Context, "methodology", 2, 3, now);

        let current = feedback.manager().current().unwrap();
        assert_eq!(current.level, NotificationLevel::Approximate);
        assert!(current.message.starts_with("Approximate match"));
    }

    #[test]
    fn none_tier_warns_with_located_page() {
        let now = Instant::now();
        let mut feedback = FeedbackNotifier::new(Duration::from_secs(4));
        feedback.notify(MatchTier::None, "methodology", 0, 8, now);

        let current = feedback.manager().current().unwrap();
        assert_eq!(current.level, NotificationLevel::Warning);
        assert!(current.message.contains("page 8"));
        assert_eq!(current.located_page, Some(8));
    }

    #[test]
    fn lifetime_follows_caller_clock() {
        let later = Instant::now() + Duration::from_secs(30);
        let mut feedback = FeedbackNotifier::new(Duration::from_secs(4));
        feedback.notify(MatchTier::Exact, "cohort", 1, 2, later);

        let manager = feedback.manager_mut();
        assert!(!manager.update_at(later + Duration::from_millis(3999)));
        assert_eq!(manager.count(), 1);
        assert!(manager.update_at(later + Duration::from_secs(4)));
    }

    #[test]
    fn long_terms_are_shortened() {
        let long = "word ".repeat(30);
        let short = shorten(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), MAX_TERM_CHARS + 3);
    }
}
