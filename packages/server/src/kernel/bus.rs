//! Typed publish/subscribe wrappers over the NATS transport.
//!
//! The publish path re-stamps the message discriminator and injects a
//! trace id header; the subscribe path extracts it into a span, times
//! the handler, and records the outcome. Handler panics are recorded
//! as failures and then resumed, never swallowed.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use anyhow::Result;
use async_nats::{HeaderMap, Message};
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::messages::{
    AnalyzeMessage, JobUpdateMessage, MessageType, SubTaskUpdateMessage, TaskStatusUpdateMessage,
};
use super::nats::NatsPublisher;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

tokio::task_local! {
    static TRACE_ID: String;
}

/// Trace id of the bus message currently being handled, if any.
/// Publishes made inside a handler reuse it, so a job's whole event
/// chain shares one id.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// A message type bound to a fixed topic.
pub trait BusMessage: Serialize + Clone + Send + Sync {
    const TYPE: MessageType;

    fn message_type_mut(&mut self) -> &mut MessageType;
}

impl BusMessage for AnalyzeMessage {
    const TYPE: MessageType = MessageType::UrlAnalyze;
    fn message_type_mut(&mut self) -> &mut MessageType {
        &mut self.message_type
    }
}

impl BusMessage for JobUpdateMessage {
    const TYPE: MessageType = MessageType::JobUpdate;
    fn message_type_mut(&mut self) -> &mut MessageType {
        &mut self.message_type
    }
}

impl BusMessage for TaskStatusUpdateMessage {
    const TYPE: MessageType = MessageType::TaskStatusUpdate;
    fn message_type_mut(&mut self) -> &mut MessageType {
        &mut self.message_type
    }
}

impl BusMessage for SubTaskUpdateMessage {
    const TYPE: MessageType = MessageType::SubTaskUpdate;
    fn message_type_mut(&mut self) -> &mut MessageType {
        &mut self.message_type
    }
}

/// Publish a typed message to its topic.
///
/// Never retries internally; retry policy belongs to the caller.
pub async fn publish<M: BusMessage>(publisher: &dyn NatsPublisher, message: &M) -> Result<()> {
    let mut message = message.clone();
    // The discriminator is always re-stamped, never trusted from input.
    *message.message_type_mut() = M::TYPE;

    let payload = serde_json::to_vec(&message)?;
    let trace_id = current_trace_id().unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut headers = HeaderMap::new();
    headers.insert(TRACE_ID_HEADER, trace_id.as_str());

    let topic = M::TYPE.topic();
    match publisher
        .publish(topic.to_string(), headers, Bytes::from(payload))
        .await
    {
        Ok(()) => {
            debug!(topic, trace_id = %trace_id, "bus publish ok");
            Ok(())
        }
        Err(e) => {
            warn!(topic, trace_id = %trace_id, error = %e, "bus publish failed");
            Err(e)
        }
    }
}

/// Handle to a live subscription. Dropping it aborts the subscription
/// task; `unsubscribe` is idempotent.
pub struct SubscriptionHandle {
    subject: String,
    task: tokio::task::JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Idempotent; safe to call multiple times or never.
    pub fn unsubscribe(&self) {
        self.task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribe a handler to a topic, optionally in a queue group for
/// competing-consumer delivery.
pub async fn subscribe<F, Fut>(
    client: &async_nats::Client,
    topic: &str,
    queue_group: Option<&str>,
    handler: F,
) -> Result<SubscriptionHandle>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut subscriber = match queue_group {
        Some(group) => {
            client
                .queue_subscribe(topic.to_string(), group.to_string())
                .await?
        }
        None => client.subscribe(topic.to_string()).await?,
    };

    let subject = topic.to_string();
    let task_subject = subject.clone();
    let task = tokio::spawn(async move {
        while let Some(msg) = subscriber.next().await {
            let trace_id = msg
                .headers
                .as_ref()
                .and_then(|h| h.get(TRACE_ID_HEADER))
                .map(|v| v.as_str().to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            let span = info_span!("bus_message", subject = %task_subject, trace_id = %trace_id);
            let started = Instant::now();
            let outcome = AssertUnwindSafe(
                TRACE_ID
                    .scope(trace_id, handler(msg))
                    .instrument(span),
            )
            .catch_unwind()
            .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(Ok(())) => debug!(subject = %task_subject, elapsed_ms, "bus handler ok"),
                Ok(Err(e)) => {
                    warn!(subject = %task_subject, elapsed_ms, error = %e, "bus handler failed")
                }
                Err(panic) => {
                    error!(subject = %task_subject, elapsed_ms, "bus handler panicked");
                    std::panic::resume_unwind(panic);
                }
            }
        }
        debug!(subject = %task_subject, "bus subscription closed");
    });

    Ok(SubscriptionHandle { subject, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_id;
    use crate::kernel::messages::TOPIC_URL_ANALYZE;
    use crate::kernel::nats::TestNats;

    #[tokio::test]
    async fn publish_stamps_type_and_trace_header() {
        let nats = TestNats::new();

        // Forge a message with the wrong discriminator; publish must
        // overwrite it.
        let mut msg = AnalyzeMessage::new(db_id());
        msg.message_type = MessageType::JobUpdate;

        publish(&nats, &msg).await.unwrap();

        let published = nats.messages_for_subject(TOPIC_URL_ANALYZE);
        assert_eq!(published.len(), 1);
        assert!(published[0].headers.get(TRACE_ID_HEADER).is_some());

        let decoded: AnalyzeMessage = nats.deserialize_message(&published[0]).unwrap();
        assert_eq!(decoded.message_type, MessageType::UrlAnalyze);
    }

    #[tokio::test]
    async fn publish_error_is_returned_not_retried() {
        let nats = crate::kernel::nats::FailingNats;
        let err = publish(&nats, &AnalyzeMessage::new(db_id())).await;
        assert!(err.is_err());
    }
}
