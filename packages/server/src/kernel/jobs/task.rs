//! Task and subtask models.
//!
//! The four pipeline phases are defined once here; the submitter and
//! the worker both depend on this module rather than agreeing on
//! strings out of band.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Extracting,
    IdentifyingVersion,
    Analyzing,
    VerifyingLinks,
}

impl TaskType {
    /// Pipeline order; also the order `get_all_for_job` returns tasks.
    pub const ALL: [TaskType; 4] = [
        TaskType::Extracting,
        TaskType::IdentifyingVersion,
        TaskType::Analyzing,
        TaskType::VerifyingLinks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Extracting => "extracting",
            TaskType::IdentifyingVersion => "identifying_version",
            TaskType::Analyzing => "analyzing",
            TaskType::VerifyingLinks => "verifying_links",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskType {
    ValidatingLink,
}

/// Per-link verification unit under the `verifying_links` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    #[serde(rename = "type")]
    pub sub_task_type: SubTaskType,
    pub status: SubTaskStatus,
    pub url: String,
    pub description: String,
}

impl SubTask {
    pub fn validating_link(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            sub_task_type: SubTaskType::ValidatingLink,
            status: SubTaskStatus::Pending,
            url: url.into(),
            description: description.into(),
        }
    }
}

/// One pipeline phase of a job, keyed by `(job_id, task_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub job_id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Subtasks keyed by a stable per-link string (1-based ordinal), so
    /// repeated updates to the same link overwrite instead of duplicate.
    pub sub_tasks: HashMap<String, SubTask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn pending(job_id: Uuid, task_type: TaskType) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            task_type,
            status: TaskStatus::Pending,
            sub_tasks: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The full task set for a new job: all four phases, all pending.
    /// Must be persisted as one atomic batch.
    pub fn batch_for_job(job_id: Uuid) -> Vec<Task> {
        TaskType::ALL
            .into_iter()
            .map(|task_type| Task::pending(job_id, task_type))
            .collect()
    }
}
