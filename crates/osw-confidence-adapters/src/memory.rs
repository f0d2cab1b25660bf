//! In-memory bus and storage for development and testing.
//!
//! These implementations use `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::QueueMessage;
use osw_confidence_core::ports::{BlobStorage, MessageBus, Subscription};

use crate::blob::blob_name;

/// Messages buffered per subscription before publishers wait
pub const SUBSCRIPTION_CAPACITY: usize = 256;

type Subscribers = Vec<(String, mpsc::Sender<QueueMessage>)>;

/// In-memory implementation of MessageBus
///
/// Every subscription of a topic receives every message published to it.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    topics: Arc<RwLock<HashMap<String, Subscribers>>>,
}

impl MemoryBus {
    /// Create a new in-memory bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().unwrap();
        topics
            .get(topic)
            .map(|subs| subs.iter().filter(|(_, tx)| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscription so their streams end
    pub fn close(&self) {
        self.topics.write().unwrap().clear();
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn subscribe(&self, topic: &str, subscription: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);

        let mut topics = self.topics.write().unwrap();
        let subscribers = topics.entry(topic.to_string()).or_default();
        // A subscription name maps to a single live stream
        subscribers.retain(|(name, _)| name != subscription);
        subscribers.push((subscription.to_string(), tx));

        tracing::debug!(topic, subscription, "Subscribed to topic");
        Ok(rx)
    }

    async fn publish(&self, topic: &str, message: QueueMessage) -> Result<()> {
        let senders: Vec<(String, mpsc::Sender<QueueMessage>)> = {
            let topics = self.topics.read().unwrap();
            topics.get(topic).cloned().unwrap_or_default()
        };

        if senders.is_empty() {
            tracing::debug!(
                topic,
                message_id = %message.message_id,
                "No subscribers, message dropped"
            );
            return Ok(());
        }

        let mut delivered = 0;
        for (name, tx) in senders {
            match tx.send(message.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::debug!(topic, subscription = %name, "Subscription closed, removing");
                    let mut topics = self.topics.write().unwrap();
                    if let Some(subscribers) = topics.get_mut(topic) {
                        subscribers.retain(|(n, tx)| n != &name || !tx.is_closed());
                    }
                }
            }
        }

        if delivered == 0 {
            return Err(ConfidenceError::Bus {
                topic: topic.to_string(),
                reason: "every subscription is closed".to_string(),
            });
        }

        Ok(())
    }
}

/// In-memory implementation of BlobStorage
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStorage {
    blobs: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
    fetches: Arc<RwLock<Vec<String>>>,
}

impl MemoryBlobStorage {
    /// Create a new in-memory blob storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob under the name `remote_url` resolves to
    pub fn insert(&self, container: &str, remote_url: &str, bytes: impl Into<Vec<u8>>) {
        let name = blob_name(container, remote_url).unwrap_or_else(|| remote_url.to_string());
        self.blobs.write().unwrap().insert((container.to_string(), name), bytes.into());
    }

    /// Every URL fetched so far, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.fetches.read().unwrap().clone()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn fetch(&self, container: &str, remote_url: &str) -> Result<Vec<u8>> {
        self.fetches.write().unwrap().push(remote_url.to_string());

        let not_found = || ConfidenceError::StorageNotFound {
            container: container.to_string(),
            url: remote_url.to_string(),
        };

        let name = blob_name(container, remote_url).ok_or_else(not_found)?;
        let blobs = self.blobs.read().unwrap();
        blobs.get(&(container.to_string(), name)).cloned().ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(id: &str) -> QueueMessage {
        QueueMessage::new("confidence-calculation", id, json!({"jobId": id}))
    }

    #[tokio::test]
    async fn test_every_subscription_receives_message() {
        let bus = MemoryBus::new();
        let mut first = bus.subscribe("requests", "a").await.unwrap();
        let mut second = bus.subscribe("requests", "b").await.unwrap();

        bus.publish("requests", message("1")).await.unwrap();

        assert_eq!(first.recv().await.unwrap().message_id, "1");
        assert_eq!(second.recv().await.unwrap().message_id, "1");
        assert_eq!(bus.subscriber_count("requests"), 2);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_stream() {
        let bus = MemoryBus::new();
        let mut old = bus.subscribe("requests", "a").await.unwrap();
        let mut new = bus.subscribe("requests", "a").await.unwrap();

        bus.publish("requests", message("2")).await.unwrap();

        assert_eq!(new.recv().await.unwrap().message_id, "2");
        // The replaced sender was dropped
        assert!(old.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = MemoryBus::new();
        assert!(bus.publish("nobody", message("3")).await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_to_closed_subscription_fails() {
        let bus = MemoryBus::new();
        let rx = bus.subscribe("responses", "a").await.unwrap();
        drop(rx);

        let result = bus.publish("responses", message("4")).await;
        assert!(matches!(result, Err(ConfidenceError::Bus { .. })));
        assert_eq!(bus.subscriber_count("responses"), 0);
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let bus = MemoryBus::new();
        let mut rx = bus.subscribe("requests", "a").await.unwrap();
        bus.close();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_blob_storage() {
        let storage = MemoryBlobStorage::new();
        storage.insert("osw", "https://host/osw/J1/osw.zip", b"zip".to_vec());

        // Same blob through a different URL form
        assert_eq!(storage.fetch("osw", "osw/J1/osw.zip").await.unwrap(), b"zip");

        let missing = storage.fetch("osw", "https://host/osw/J2/osw.zip").await;
        assert!(matches!(missing, Err(ConfidenceError::StorageNotFound { .. })));

        let other_container = storage.fetch("tdei", "https://host/osw/J1/osw.zip").await;
        assert!(other_container.is_err());

        assert_eq!(storage.fetched().len(), 3);
    }
}
