//! NATS client abstraction for production and testing.
//!
//! Provides a trait-based publish seam so the worker and the API can
//! swap between a real NATS connection and a recording test mock.

use anyhow::Result;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::RwLock;

/// A published message, headers included.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub headers: HeaderMap,
    pub payload: Bytes,
}

/// Trait for NATS publish operations.
///
/// This allows swapping between real NATS and test mocks.
#[async_trait]
pub trait NatsPublisher: Send + Sync {
    /// Publish a message to a subject.
    async fn publish(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()>;
}

/// Real NATS client publisher.
pub struct NatsClientPublisher {
    client: async_nats::Client,
}

impl NatsClientPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NatsPublisher for NatsClientPublisher {
    async fn publish(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()> {
        self.client
            .publish_with_headers(subject, headers, payload)
            .await?;
        Ok(())
    }
}

/// Mock NATS client that tracks published messages for testing.
///
/// Tests inspect what would have been published without requiring a
/// real connection.
#[derive(Default)]
pub struct TestNats {
    published: RwLock<Vec<PublishedMessage>>,
}

impl TestNats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a published message.
    pub fn record_publish(&self, subject: String, headers: HeaderMap, payload: Bytes) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage {
                subject,
                headers,
                payload,
            });
    }

    /// Get all published messages.
    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Get published messages for a specific subject.
    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Check if any message was published to a subject.
    pub fn was_published_to(&self, subject: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.subject == subject)
    }

    /// Get the count of published messages.
    pub fn publish_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Get the count of messages published to a specific subject.
    pub fn publish_count_for(&self, subject: &str) -> usize {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.subject == subject)
            .count()
    }

    /// Clear all recorded messages.
    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Deserialize a published message payload as JSON.
    pub fn deserialize_message<T: serde::de::DeserializeOwned>(
        &self,
        msg: &PublishedMessage,
    ) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&msg.payload)
    }
}

#[async_trait]
impl NatsPublisher for TestNats {
    async fn publish(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()> {
        self.record_publish(subject, headers, payload);
        Ok(())
    }
}

/// A publisher that fails every publish, for exercising error paths.
#[derive(Default)]
pub struct FailingNats;

#[async_trait]
impl NatsPublisher for FailingNats {
    async fn publish(&self, _subject: String, _headers: HeaderMap, _payload: Bytes) -> Result<()> {
        anyhow::bail!("nats publish failed (test)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_retrieve_messages() {
        let nats = TestNats::new();

        nats.record_publish(
            "job.update".to_string(),
            HeaderMap::new(),
            Bytes::from(r#"{"job_id":"123"}"#),
        );

        assert_eq!(nats.publish_count(), 1);
        assert!(nats.was_published_to("job.update"));
        assert!(!nats.was_published_to("task.status_update"));
    }

    #[test]
    fn test_count_per_subject() {
        let nats = TestNats::new();

        nats.record_publish("job.update".to_string(), HeaderMap::new(), Bytes::new());
        nats.record_publish("job.update".to_string(), HeaderMap::new(), Bytes::new());
        nats.record_publish("url.analyze".to_string(), HeaderMap::new(), Bytes::new());

        assert_eq!(nats.publish_count_for("job.update"), 2);
        assert_eq!(nats.publish_count_for("url.analyze"), 1);
    }

    #[test]
    fn test_clear() {
        let nats = TestNats::new();
        nats.record_publish("test".to_string(), HeaderMap::new(), Bytes::new());
        assert_eq!(nats.publish_count(), 1);

        nats.clear();
        assert_eq!(nats.publish_count(), 0);
    }
}
