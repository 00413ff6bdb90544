//! Typed channel carrying highlight requests from the assistant to the viewer
//!
//! One subscriber drains the queue in FIFO order; any number of cloned
//! publishers may feed it. Publishing never blocks and returns nothing the
//! publisher has to act on.

use flume::{Receiver, Sender, TryRecvError};
use log::debug;

use super::request::HighlightRequest;

/// Create a connected publisher/subscriber pair.
#[must_use]
pub fn highlight_channel() -> (HighlightPublisher, HighlightSubscriber) {
    let (tx, rx) = flume::unbounded();
    (HighlightPublisher { tx }, HighlightSubscriber { rx })
}

/// The viewer side has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("highlight channel closed")]
pub struct ChannelClosed;

/// Sending half, handed to answer-producing components
#[derive(Clone, Debug)]
pub struct HighlightPublisher {
    tx: Sender<HighlightRequest>,
}

impl HighlightPublisher {
    /// Queue a request for the viewer.
    pub fn publish(&self, request: HighlightRequest) -> Result<(), ChannelClosed> {
        self.tx.send(request).map_err(|_| ChannelClosed)
    }
}

/// Receiving half, owned by the viewer's highlight service
#[derive(Debug)]
pub struct HighlightSubscriber {
    rx: Receiver<HighlightRequest>,
}

impl HighlightSubscriber {
    /// Take the next queued request without waiting.
    #[must_use]
    pub fn try_next(&self) -> Option<HighlightRequest> {
        match self.rx.try_recv() {
            Ok(request) => Some(request),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("All highlight publishers dropped");
                None
            }
        }
    }

    /// Take every queued request, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<HighlightRequest> {
        let mut requests = vec![];
        while let Some(request) = self.try_next() {
            requests.push(request);
        }
        requests
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_publish_order() {
        let (publisher, subscriber) = highlight_channel();
        let second = publisher.clone();

        publisher.publish(HighlightRequest::new(1, "first")).unwrap();
        second.publish(HighlightRequest::new(2, "second")).unwrap();
        publisher.publish(HighlightRequest::new(3, "third")).unwrap();
        assert_eq!(subscriber.pending(), 3);

        let terms: Vec<String> = subscriber
            .drain()
            .into_iter()
            .map(|r| r.search_term)
            .collect();
        assert_eq!(terms, vec!["first", "second", "third"]);
        assert!(subscriber.try_next().is_none());
    }

    #[test]
    fn publish_after_subscriber_dropped_reports_closed() {
        let (publisher, subscriber) = highlight_channel();
        drop(subscriber);

        assert_eq!(
            publisher.publish(HighlightRequest::new(1, "late")),
            Err(ChannelClosed)
        );
    }

    #[test]
    fn queued_requests_survive_publisher_drop() {
        let (publisher, subscriber) = highlight_channel();
        publisher.publish(HighlightRequest::new(4, "kept")).unwrap();
        drop(publisher);

        assert_eq!(subscriber.drain().len(), 1);
        assert!(subscriber.try_next().is_none());
    }
}
