//! Store contracts the orchestration workflow depends on.
//!
//! Pure data-access traits: the workflow never embeds storage-specific
//! logic, and a not-found outcome is distinguishable from a transient
//! backend failure.

use analysis::AnalysisFacts;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::job::{Job, JobStatus};
use super::task::{SubTask, Task, TaskStatus, TaskType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),
    #[error("task {task_type} for job {job_id} not found")]
    TaskNotFound { job_id: Uuid, task_type: TaskType },
    #[error("subtask {key} on task {task_type} for job {job_id} not found")]
    SubTaskNotFound {
        job_id: Uuid,
        task_type: TaskType,
        key: String,
    },
    #[error("job {id}: invalid status transition {from:?} -> {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::JobNotFound(_)
                | StoreError::TaskNotFound { .. }
                | StoreError::SubTaskNotFound { .. }
        )
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: Job) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Job, StoreError>;

    /// All jobs, newest first.
    async fn list_all(&self) -> Result<Vec<Job>, StoreError>;

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), StoreError>;

    /// Partial update: only supplied fields change, `updated_at` always
    /// refreshes. `started_at`/`completed_at` are stamped when the
    /// status transition reaches running / a terminal state.
    async fn update(
        &self,
        id: Uuid,
        status: Option<JobStatus>,
        result: Option<AnalysisFacts>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a job's task set all-or-nothing; a partial task set must
    /// never be observable.
    async fn create_batch(&self, tasks: Vec<Task>) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        job_id: Uuid,
        task_type: TaskType,
        status: TaskStatus,
    ) -> Result<(), StoreError>;

    /// Tasks for a job in pipeline order.
    async fn get_all_for_job(&self, job_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Upsert a subtask under its stable key.
    async fn put_sub_task(
        &self,
        job_id: Uuid,
        task_type: TaskType,
        key: &str,
        sub_task: SubTask,
    ) -> Result<(), StoreError>;

    /// Overwrite an existing subtask; the key must already be present.
    async fn update_sub_task(
        &self,
        job_id: Uuid,
        task_type: TaskType,
        key: &str,
        sub_task: SubTask,
    ) -> Result<(), StoreError>;
}
