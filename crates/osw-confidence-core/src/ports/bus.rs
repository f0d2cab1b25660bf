use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::QueueMessage;

/// Stream of messages delivered to one subscription
pub type Subscription = mpsc::Receiver<QueueMessage>;

/// Port for topic based messaging
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Attach a named subscription to a topic
    ///
    /// The returned stream ends when the bus shuts the subscription down.
    async fn subscribe(&self, topic: &str, subscription: &str) -> Result<Subscription>;

    /// Publish a message to every subscription of a topic
    async fn publish(&self, topic: &str, message: QueueMessage) -> Result<()>;
}
