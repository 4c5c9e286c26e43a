//! In-process event feed.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{NamespaceEvent, NamespaceEventStream};

/// Sending half of an [`EventFeed`].
///
/// Cloneable; the feed's stream ends once every publisher has been dropped.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<Result<NamespaceEvent>>,
}

impl EventPublisher {
    /// Publish an event, waiting for buffer space if the feed is full.
    pub async fn publish(&self, event: NamespaceEvent) -> Result<()> {
        debug!(kind = %event.kind, namespace = %event.name, "Publishing namespace event");
        self.sender
            .send(Ok(event))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Publish an item-level error.
    pub async fn publish_error(&self, error: Error) -> Result<()> {
        self.sender
            .send(Err(error))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Bounded, ordered feed of namespace events.
pub struct EventFeed {
    receiver: mpsc::Receiver<Result<NamespaceEvent>>,
}

impl EventFeed {
    /// Create a feed with room for `capacity` buffered events.
    pub fn new(capacity: usize) -> (EventPublisher, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (EventPublisher { sender }, Self { receiver })
    }

    /// Receive the next item, or `None` once all publishers are dropped.
    pub async fn recv(&mut self) -> Option<Result<NamespaceEvent>> {
        self.receiver.recv().await
    }

    /// Turn the feed into a stream.
    pub fn into_stream(self) -> NamespaceEventStream {
        Box::pin(ReceiverStream::new(self.receiver))
    }

    /// A finite stream that yields `events` in order and then ends.
    pub fn replay<I>(events: I) -> NamespaceEventStream
    where
        I: IntoIterator<Item = NamespaceEvent>,
        I::IntoIter: Send + 'static,
    {
        futures::stream::iter(events).map(Ok).boxed()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_feed_preserves_order() {
        let (publisher, feed) = EventFeed::new(8);
        publisher.publish(NamespaceEvent::added("a")).await.unwrap();
        publisher.publish(NamespaceEvent::deleted("b")).await.unwrap();
        publisher.publish(NamespaceEvent::modified("c")).await.unwrap();
        drop(publisher);

        let events: Vec<_> = feed.into_stream().collect().await;
        let names: Vec<_> = events
            .into_iter()
            .map(|e| e.map(|e| e.name).unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stream_ends_when_publishers_dropped() {
        let (publisher, mut feed) = EventFeed::new(1);
        let second = publisher.clone();
        drop(publisher);
        second.publish(NamespaceEvent::added("a")).await.unwrap();
        drop(second);

        assert!(feed.recv().await.is_some());
        assert!(feed.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_after_feed_dropped_fails() {
        let (publisher, feed) = EventFeed::new(1);
        drop(feed);
        assert!(publisher.is_closed());
        let result = publisher.publish(NamespaceEvent::added("a")).await;
        assert_eq!(result, Err(Error::ChannelClosed));
    }

    #[tokio::test]
    async fn test_errors_are_delivered_in_order() {
        let (publisher, feed) = EventFeed::new(4);
        publisher.publish(NamespaceEvent::added("a")).await.unwrap();
        publisher
            .publish_error(Error::source_failed("test", "boom"))
            .await
            .unwrap();
        drop(publisher);

        let items: Vec<_> = feed.into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items.first(), Some(Ok(_))));
        assert!(matches!(items.last(), Some(Err(_))));
    }

    #[tokio::test]
    async fn test_replay_is_finite() {
        let stream = EventFeed::replay(vec![
            NamespaceEvent::added("a"),
            NamespaceEvent::deleted("a"),
        ]);
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
    }
}
