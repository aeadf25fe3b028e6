//! Event Publisher Port (Driven Port)
//!
//! Outbound channel for lifecycle events consumed by strategy code.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::order_tracking::ConnectorEvent;

/// Port for publishing connector lifecycle events.
#[async_trait]
pub trait EventPublisherPort: Send + Sync {
    /// Publish one event. Implementations must not block the connector.
    async fn publish(&self, event: ConnectorEvent);
}

/// Publisher that discards all events (tests, tooling).
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisherPort for NoOpEventPublisher {
    async fn publish(&self, _event: ConnectorEvent) {}
}

/// Publisher backed by an unbounded channel.
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<ConnectorEvent>,
}

impl ChannelEventPublisher {
    /// Create a publisher and the receiving half for the consumer.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectorEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisherPort for ChannelEventPublisher {
    async fn publish(&self, event: ConnectorEvent) {
        // A closed receiver means the consumer is gone; events are not
        // worth crashing over.
        if self.sender.send(event).is_err() {
            tracing::warn!("event consumer dropped; discarding lifecycle event");
        }
    }
}
