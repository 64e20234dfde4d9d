//! In-memory store implementations.
//!
//! Process-local `RwLock<HashMap>` stores backing the binaries and the
//! test suite. Persistent adapters live behind the same traits and are
//! out of scope here.

use std::collections::HashMap;
use std::sync::RwLock;

use analysis::AnalysisFacts;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::job::{Job, JobStatus};
use super::store::{JobStore, StoreError, TaskStore};
use super::task::{SubTask, Task, TaskStatus, TaskType};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_update(
        job: &mut Job,
        status: Option<JobStatus>,
        result: Option<AnalysisFacts>,
    ) -> Result<(), StoreError> {
        if let Some(next) = status {
            if !job.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    id: job.id,
                    from: job.status,
                    to: next,
                });
            }
            if next == JobStatus::Running && job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
            if next.is_terminal() && job.completed_at.is_none() {
                job.completed_at = Some(Utc::now());
            }
            job.status = next;
        }
        if let Some(facts) = result {
            job.result = Some(facts);
        }
        job.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> Result<(), StoreError> {
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Job, StoreError> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(StoreError::JobNotFound(id))
    }

    async fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        // v7 IDs are time-ordered, so newest first is a reverse ID sort.
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(jobs)
    }

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), StoreError> {
        self.update(id, Some(status), None).await
    }

    async fn update(
        &self,
        id: Uuid,
        status: Option<JobStatus>,
        result: Option<AnalysisFacts>,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let job = jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        Self::apply_update(job, status, result)
    }
}

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<(Uuid, TaskType), Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_batch(&self, tasks: Vec<Task>) -> Result<(), StoreError> {
        // Single write-lock scope keeps the batch atomic: readers see
        // either none of the tasks or all of them.
        let mut map = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        for task in tasks {
            map.insert((task.job_id, task.task_type), task);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        task_type: TaskType,
        status: TaskStatus,
    ) -> Result<(), StoreError> {
        let mut map = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let task = map
            .get_mut(&(job_id, task_type))
            .ok_or(StoreError::TaskNotFound { job_id, task_type })?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn get_all_for_job(&self, job_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let map = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        Ok(TaskType::ALL
            .into_iter()
            .filter_map(|task_type| map.get(&(job_id, task_type)).cloned())
            .collect())
    }

    async fn put_sub_task(
        &self,
        job_id: Uuid,
        task_type: TaskType,
        key: &str,
        sub_task: SubTask,
    ) -> Result<(), StoreError> {
        let mut map = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let task = map
            .get_mut(&(job_id, task_type))
            .ok_or(StoreError::TaskNotFound { job_id, task_type })?;
        task.sub_tasks.insert(key.to_string(), sub_task);
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn update_sub_task(
        &self,
        job_id: Uuid,
        task_type: TaskType,
        key: &str,
        sub_task: SubTask,
    ) -> Result<(), StoreError> {
        let mut map = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let task = map
            .get_mut(&(job_id, task_type))
            .ok_or(StoreError::TaskNotFound { job_id, task_type })?;
        if !task.sub_tasks.contains_key(key) {
            return Err(StoreError::SubTaskNotFound {
                job_id,
                task_type,
                key: key.to_string(),
            });
        }
        task.sub_tasks.insert(key.to_string(), sub_task);
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::task::SubTaskStatus;
    use url::Url;

    fn sample_job() -> Job {
        Job::new(&Url::parse("https://example.com").unwrap())
    }

    #[tokio::test]
    async fn get_missing_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.get(crate::common::db_id()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let store = MemoryJobStore::new();
        let first = sample_job();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = sample_job();

        store.create(first.clone()).await.unwrap();
        store.create(second.clone()).await.unwrap();

        let jobs = store.list_all().await.unwrap();
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }

    #[tokio::test]
    async fn update_stamps_lifecycle_timestamps() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        let id = job.id;
        store.create(job).await.unwrap();

        store.update_status(id, JobStatus::Running).await.unwrap();
        let running = store.get(id).await.unwrap();
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        store
            .update(id, Some(JobStatus::Completed), Some(AnalysisFacts::default()))
            .await
            .unwrap();
        let done = store.get(id).await.unwrap();
        assert!(done.completed_at.is_some());
        assert!(done.result.is_some());
    }

    #[tokio::test]
    async fn terminal_job_rejects_further_transitions() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        let id = job.id;
        store.create(job).await.unwrap();

        store.update_status(id, JobStatus::Running).await.unwrap();
        store.update_status(id, JobStatus::Failed).await.unwrap();

        // Re-asserting failed is an idempotent no-op.
        store.update_status(id, JobStatus::Failed).await.unwrap();

        let err = store
            .update_status(id, JobStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn task_batch_is_fully_visible() {
        let store = MemoryTaskStore::new();
        let job_id = crate::common::db_id();
        store.create_batch(Task::batch_for_job(job_id)).await.unwrap();

        let tasks = store.get_all_for_job(job_id).await.unwrap();
        assert_eq!(tasks.len(), 4);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        let types: Vec<TaskType> = tasks.iter().map(|t| t.task_type).collect();
        assert_eq!(types, TaskType::ALL);
    }

    #[tokio::test]
    async fn put_sub_task_upserts_update_requires_existing() {
        let store = MemoryTaskStore::new();
        let job_id = crate::common::db_id();
        store.create_batch(Task::batch_for_job(job_id)).await.unwrap();

        let sub = SubTask::validating_link("https://example.com/x", "Validating link 1");

        // update before put: distinct not-found error
        let err = store
            .update_sub_task(job_id, TaskType::VerifyingLinks, "1", sub.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SubTaskNotFound { .. }));

        store
            .put_sub_task(job_id, TaskType::VerifyingLinks, "1", sub.clone())
            .await
            .unwrap();

        let mut done = sub.clone();
        done.status = SubTaskStatus::Completed;
        store
            .update_sub_task(job_id, TaskType::VerifyingLinks, "1", done)
            .await
            .unwrap();

        let tasks = store.get_all_for_job(job_id).await.unwrap();
        let verify = tasks
            .iter()
            .find(|t| t.task_type == TaskType::VerifyingLinks)
            .unwrap();
        assert_eq!(verify.sub_tasks.len(), 1);
        assert_eq!(
            verify.sub_tasks.get("1").unwrap().status,
            SubTaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn update_status_for_unknown_task_is_not_found() {
        let store = MemoryTaskStore::new();
        let err = store
            .update_status(crate::common::db_id(), TaskType::Extracting, TaskStatus::Failed)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
