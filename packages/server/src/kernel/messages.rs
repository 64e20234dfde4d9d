//! Shared bus message contracts.
//!
//! Every independently deployed service (submitter, worker, bridge)
//! agrees on job lifecycle through these shapes. Each message carries a
//! `type` discriminator equal to its topic name; the publish path
//! re-stamps it and never trusts caller input.

use analysis::AnalysisFacts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jobs::{JobStatus, SubTask, TaskStatus, TaskType};

pub const TOPIC_URL_ANALYZE: &str = "url.analyze";
pub const TOPIC_JOB_UPDATE: &str = "job.update";
pub const TOPIC_TASK_STATUS_UPDATE: &str = "task.status_update";
pub const TOPIC_TASK_SUBTASK_UPDATE: &str = "task.subtask_update";

/// Closed set of bus message discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "url.analyze")]
    UrlAnalyze,
    #[serde(rename = "job.update")]
    JobUpdate,
    #[serde(rename = "task.status_update")]
    TaskStatusUpdate,
    #[serde(rename = "task.subtask_update")]
    SubTaskUpdate,
}

impl MessageType {
    /// The topic a message of this type is published to. Topic and
    /// discriminator are the same string by contract.
    pub fn topic(self) -> &'static str {
        match self {
            MessageType::UrlAnalyze => TOPIC_URL_ANALYZE,
            MessageType::JobUpdate => TOPIC_JOB_UPDATE,
            MessageType::TaskStatusUpdate => TOPIC_TASK_STATUS_UPDATE,
            MessageType::SubTaskUpdate => TOPIC_TASK_SUBTASK_UPDATE,
        }
    }
}

/// Kick off analysis of a submitted job. Submitter → worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub job_id: Uuid,
}

impl AnalyzeMessage {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            message_type: MessageType::UrlAnalyze,
            job_id,
        }
    }
}

/// Job-level status change, optionally carrying the final result.
/// Worker → bridge, broadcast globally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisFacts>,
}

impl JobUpdateMessage {
    pub fn new(job_id: Uuid, status: JobStatus, result: Option<AnalysisFacts>) -> Self {
        Self {
            message_type: MessageType::JobUpdate,
            job_id,
            status,
            result,
        }
    }
}

/// Task phase transition. Worker → bridge, scoped to the job's group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub job_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
}

impl TaskStatusUpdateMessage {
    pub fn new(job_id: Uuid, task_type: TaskType, status: TaskStatus) -> Self {
        Self {
            message_type: MessageType::TaskStatusUpdate,
            job_id,
            task_type,
            status,
        }
    }
}

/// Per-link subtask creation or transition. Worker → bridge, scoped to
/// the job's group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub job_id: Uuid,
    pub task_type: TaskType,
    pub key: String,
    pub subtask: SubTask,
}

impl SubTaskUpdateMessage {
    pub fn new(job_id: Uuid, task_type: TaskType, key: String, subtask: SubTask) -> Self {
        Self {
            message_type: MessageType::SubTaskUpdate,
            job_id,
            task_type,
            key,
            subtask,
        }
    }
}

/// Tagged union over every bus message, decoded by reading the `type`
/// discriminator directly.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BusEvent {
    Analyze(AnalyzeMessage),
    JobUpdate(JobUpdateMessage),
    TaskStatusUpdate(TaskStatusUpdateMessage),
    SubTaskUpdate(SubTaskUpdateMessage),
}

impl BusEvent {
    /// Decode a raw payload by its `type` field.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(rename = "type")]
            message_type: MessageType,
        }

        let probe: Probe = serde_json::from_slice(payload)?;
        Ok(match probe.message_type {
            MessageType::UrlAnalyze => BusEvent::Analyze(serde_json::from_slice(payload)?),
            MessageType::JobUpdate => BusEvent::JobUpdate(serde_json::from_slice(payload)?),
            MessageType::TaskStatusUpdate => {
                BusEvent::TaskStatusUpdate(serde_json::from_slice(payload)?)
            }
            MessageType::SubTaskUpdate => {
                BusEvent::SubTaskUpdate(serde_json::from_slice(payload)?)
            }
        })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            BusEvent::Analyze(_) => MessageType::UrlAnalyze,
            BusEvent::JobUpdate(_) => MessageType::JobUpdate,
            BusEvent::TaskStatusUpdate(_) => MessageType::TaskStatusUpdate,
            BusEvent::SubTaskUpdate(_) => MessageType::SubTaskUpdate,
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            BusEvent::Analyze(m) => m.job_id,
            BusEvent::JobUpdate(m) => m.job_id,
            BusEvent::TaskStatusUpdate(m) => m.job_id,
            BusEvent::SubTaskUpdate(m) => m.job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_id;

    #[test]
    fn discriminator_matches_topic() {
        assert_eq!(MessageType::UrlAnalyze.topic(), "url.analyze");
        assert_eq!(MessageType::JobUpdate.topic(), "job.update");
        assert_eq!(MessageType::TaskStatusUpdate.topic(), "task.status_update");
        assert_eq!(MessageType::SubTaskUpdate.topic(), "task.subtask_update");
    }

    #[test]
    fn analyze_message_wire_shape() {
        let job_id = db_id();
        let json = serde_json::to_value(AnalyzeMessage::new(job_id)).unwrap();
        assert_eq!(json["type"], "url.analyze");
        assert_eq!(json["job_id"], job_id.to_string());
    }

    #[test]
    fn job_update_omits_absent_result() {
        let msg = JobUpdateMessage::new(db_id(), JobStatus::Running, None);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("result").is_none());
    }

    #[test]
    fn decode_dispatches_on_type() {
        let job_id = db_id();
        let raw = serde_json::to_vec(&TaskStatusUpdateMessage::new(
            job_id,
            TaskType::Analyzing,
            TaskStatus::Running,
        ))
        .unwrap();

        match BusEvent::decode(&raw).unwrap() {
            BusEvent::TaskStatusUpdate(m) => {
                assert_eq!(m.job_id, job_id);
                assert_eq!(m.task_type, TaskType::Analyzing);
            }
            other => panic!("decoded wrong variant: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert!(BusEvent::decode(br#"{"type":"job.delete","job_id":"x"}"#).is_err());
    }

    #[test]
    fn subtask_message_roundtrip_preserves_fields() {
        let sub = SubTask::validating_link("https://example.com/a", "Validating link 1");
        let msg = SubTaskUpdateMessage::new(db_id(), TaskType::VerifyingLinks, "1".into(), sub);

        let raw = serde_json::to_vec(&msg).unwrap();
        match BusEvent::decode(&raw).unwrap() {
            BusEvent::SubTaskUpdate(decoded) => {
                assert_eq!(decoded.key, "1");
                assert_eq!(decoded.subtask, msg.subtask);
            }
            other => panic!("decoded wrong variant: {other:?}"),
        }
    }
}
