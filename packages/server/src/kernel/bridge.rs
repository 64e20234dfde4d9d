//! Notification bridge: bus events in, hub broadcasts out.
//!
//! The only component that both receives bus events and calls the hub.
//! Job-level updates go to every connection; task and subtask updates
//! are scoped to the group named by their job id. Decode failures are
//! logged and dropped, never fatal to the subscribing process.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use super::bus::{self, SubscriptionHandle};
use super::hub::NotificationHub;
use super::messages::{
    BusEvent, MessageType, TOPIC_JOB_UPDATE, TOPIC_TASK_STATUS_UPDATE, TOPIC_TASK_SUBTASK_UPDATE,
};

pub struct NotificationBridge {
    client: async_nats::Client,
    hub: Arc<NotificationHub>,
}

/// Live bridge subscriptions. `stop` is idempotent; dropping the
/// handle also tears the subscriptions down.
pub struct BridgeHandle {
    subscriptions: Vec<SubscriptionHandle>,
}

impl BridgeHandle {
    pub fn stop(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl NotificationBridge {
    pub fn new(client: async_nats::Client, hub: Arc<NotificationHub>) -> Self {
        Self { client, hub }
    }

    /// Establish all three subscriptions; failure on any one is fatal
    /// to bridge startup.
    pub async fn start(self) -> Result<BridgeHandle> {
        let job_updates = {
            let hub = Arc::clone(&self.hub);
            bus::subscribe(&self.client, TOPIC_JOB_UPDATE, None, move |msg| {
                let hub = Arc::clone(&hub);
                async move {
                    if let Some(event) = decode(MessageType::JobUpdate, &msg.payload) {
                        // Job-level updates are global: every client
                        // sees every job's status changes.
                        hub.broadcast(&event);
                    }
                    Ok(())
                }
            })
            .await?
        };

        let task_updates = {
            let hub = Arc::clone(&self.hub);
            bus::subscribe(&self.client, TOPIC_TASK_STATUS_UPDATE, None, move |msg| {
                let hub = Arc::clone(&hub);
                async move {
                    if let Some(event) = decode(MessageType::TaskStatusUpdate, &msg.payload) {
                        let group = event.job_id().to_string();
                        hub.broadcast_to_group(&event, &group);
                    }
                    Ok(())
                }
            })
            .await?
        };

        let subtask_updates = {
            let hub = Arc::clone(&self.hub);
            bus::subscribe(&self.client, TOPIC_TASK_SUBTASK_UPDATE, None, move |msg| {
                let hub = Arc::clone(&hub);
                async move {
                    if let Some(event) = decode(MessageType::SubTaskUpdate, &msg.payload) {
                        let group = event.job_id().to_string();
                        hub.broadcast_to_group(&event, &group);
                    }
                    Ok(())
                }
            })
            .await?
        };

        info!("notification bridge started");
        Ok(BridgeHandle {
            subscriptions: vec![job_updates, task_updates, subtask_updates],
        })
    }
}

/// Decode a bus payload, logging and dropping anything malformed or
/// published on the wrong topic.
fn decode(expected: MessageType, payload: &[u8]) -> Option<BusEvent> {
    let topic = expected.topic();
    match BusEvent::decode(payload) {
        Ok(event) if event.message_type() == expected => Some(event),
        Ok(event) => {
            warn!(
                topic,
                message_type = ?event.message_type(),
                "dropping bus message whose type does not match its topic"
            );
            None
        }
        Err(e) => {
            warn!(topic, error = %e, "dropping undecodable bus message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_id;
    use crate::kernel::messages::{JobUpdateMessage, TaskStatusUpdateMessage};
    use crate::kernel::jobs::{JobStatus, TaskStatus, TaskType};

    #[test]
    fn decode_drops_malformed_payloads() {
        assert!(decode(MessageType::JobUpdate, b"not json").is_none());
        assert!(decode(MessageType::JobUpdate, br#"{"type":"bogus"}"#).is_none());
    }

    #[test]
    fn decode_drops_type_topic_mismatches() {
        let task_update = serde_json::to_vec(&TaskStatusUpdateMessage::new(
            db_id(),
            TaskType::Analyzing,
            TaskStatus::Running,
        ))
        .unwrap();

        // A task update smuggled onto the job topic must not broadcast.
        assert!(decode(MessageType::JobUpdate, &task_update).is_none());
        assert!(decode(MessageType::TaskStatusUpdate, &task_update).is_some());

        let job_update =
            serde_json::to_vec(&JobUpdateMessage::new(db_id(), JobStatus::Running, None)).unwrap();
        assert!(decode(MessageType::JobUpdate, &job_update).is_some());
    }
}
