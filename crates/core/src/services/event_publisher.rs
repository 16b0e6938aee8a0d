//! Change feed.
//!
//! Services publish a [`StoreEvent`] after each successful commit. Readers
//! that keep derived views up to date (such as the incomplete-survey watch)
//! subscribe and recompute when a relevant event arrives.

use std::sync::Arc;

use async_trait::async_trait;
use companion_common::AppResult;
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity for the broadcast feed.
const DEFAULT_CAPACITY: usize = 256;

/// A committed change to the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A post was created or one of its fields changed.
    PostChanged { id: String },
    /// A post was deleted.
    PostDeleted { id: String },
    /// A comment of the post was created, edited, hidden or deleted.
    CommentsChanged { post_id: String },
    /// A user's like index changed.
    LikesChanged { user_id: String },
    /// A user's notifications changed.
    NotificationsChanged { user_id: String },
    /// A survey definition was created, hidden or shown.
    SurveyDefinitionsChanged,
    /// A user's survey answers document changed.
    SurveyAnswersChanged { user_id: String },
    /// An article was published or deleted.
    ArticlesChanged,
}

/// Trait for publishing store change events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Having no subscribers is not an error.
    async fn publish(&self, event: StoreEvent) -> AppResult<()>;

    /// Subscribe to events published after this call.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// In-process change feed backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<StoreEvent>,
}

impl BroadcastEventPublisher {
    /// Create a feed with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a feed buffering up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: StoreEvent) -> AppResult<()> {
        trace!(?event, "Publishing store event");
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

/// A no-op implementation of `EventPublisher` for when nothing watches the store.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: StoreEvent) -> AppResult<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        // Sender dropped immediately: subscribers see a closed feed.
        broadcast::channel(1).1
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;

/// Publish an event, logging instead of failing the already-committed operation.
pub(crate) async fn publish_quietly(publisher: &EventPublisherService, event: StoreEvent) {
    if let Err(e) = publisher.publish(event).await {
        tracing::warn!(error = %e, "Failed to publish store event");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events_published_after_subscribe() {
        let feed = BroadcastEventPublisher::new();
        feed.publish(StoreEvent::SurveyDefinitionsChanged).await.unwrap();

        let mut rx = feed.subscribe();
        feed.publish(StoreEvent::PostDeleted { id: "p1".into() })
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::PostDeleted { id: "p1".into() }
        );
    }

    #[tokio::test]
    async fn test_noop_feed_is_closed() {
        let mut rx = NoOpEventPublisher.subscribe();
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
