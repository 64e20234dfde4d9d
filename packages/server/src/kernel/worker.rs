//! Orchestration worker: drives a submitted job through the analysis
//! pipeline.
//!
//! One `url.analyze` consumption runs the whole state machine:
//! dispatch, start, fetch, the four phases in sequence, then complete
//! or fail-all. Job-level store writes and publishes are fatal to the
//! run; task and subtask ones are telemetry and never halt a phase.

use std::sync::Arc;
use std::time::Duration;

use analysis::{AnalysisFacts, LinkChecker};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::bus;
use super::fetcher::ContentFetcher;
use super::jobs::{
    JobStatus, JobStore, SubTask, SubTaskStatus, TaskStatus, TaskStore, TaskType,
};
use super::messages::{
    AnalyzeMessage, JobUpdateMessage, SubTaskUpdateMessage, TaskStatusUpdateMessage,
    TOPIC_URL_ANALYZE,
};
use super::nats::NatsPublisher;
use super::service::Service;

#[derive(Debug, Clone)]
pub struct AnalysisWorkerConfig {
    /// Queue group for competing-consumer delivery: each analyze
    /// message reaches exactly one worker instance.
    pub queue_group: String,
}

impl Default for AnalysisWorkerConfig {
    fn default() -> Self {
        Self {
            queue_group: "analysis-workers".to_string(),
        }
    }
}

/// The per-message pipeline, separated from the subscription plumbing
/// so tests can drive it directly against in-memory collaborators.
pub struct JobProcessor {
    publisher: Arc<dyn NatsPublisher>,
    job_store: Arc<dyn JobStore>,
    task_store: Arc<dyn TaskStore>,
    fetcher: Arc<dyn ContentFetcher>,
    link_checker: Arc<dyn LinkChecker>,
    fetch_timeout: Duration,
}

impl JobProcessor {
    pub fn new(
        publisher: Arc<dyn NatsPublisher>,
        job_store: Arc<dyn JobStore>,
        task_store: Arc<dyn TaskStore>,
        fetcher: Arc<dyn ContentFetcher>,
        link_checker: Arc<dyn LinkChecker>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            publisher,
            job_store,
            task_store,
            fetcher,
            link_checker,
            fetch_timeout,
        }
    }

    /// Decode and process one analyze message.
    pub async fn handle_message(&self, msg: async_nats::Message) -> Result<()> {
        let analyze: AnalyzeMessage =
            serde_json::from_slice(&msg.payload).context("undecodable analyze message")?;
        self.process(analyze.job_id).await
    }

    /// Run the full pipeline for a job.
    pub async fn process(&self, job_id: Uuid) -> Result<()> {
        // Dispatch: a missing job is fatal for this message; the
        // cleanup below is best-effort since the job may not exist.
        let job = match self.job_store.get(job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "job lookup failed");
                self.fail_all(job_id).await;
                return Err(e.into());
            }
        };
        let url = match Url::parse(&job.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(job_id = %job_id, url = %job.url, error = %e, "stored url is invalid");
                self.fail_all(job_id).await;
                return Err(e.into());
            }
        };

        info!(job_id = %job_id, url = %url, "analysis started");

        // Start: job-level write or publish failure aborts to fail-all.
        if let Err(e) = self.update_job(job_id, JobStatus::Running, None).await {
            self.fail_all(job_id).await;
            return Err(e);
        }

        match self.run_pipeline(job_id, &url).await {
            Ok(facts) => {
                if let Err(e) = self
                    .job_store
                    .update(job_id, Some(JobStatus::Completed), Some(facts.clone()))
                    .await
                {
                    self.fail_all(job_id).await;
                    return Err(e.into());
                }
                // The job is now durably completed; a publish failure
                // past this point is a transport problem, and fail-all
                // would leave a completed job with failed tasks.
                if let Err(e) = bus::publish(
                    &*self.publisher,
                    &JobUpdateMessage::new(job_id, JobStatus::Completed, Some(facts)),
                )
                .await
                {
                    warn!(job_id = %job_id, error = %e, "completed job.update publish failed");
                    return Err(e);
                }
                info!(job_id = %job_id, "analysis completed");
                Ok(())
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "pipeline failed");
                self.fail_all(job_id).await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, job_id: Uuid, url: &Url) -> Result<AnalysisFacts> {
        let body = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| anyhow!("fetch timed out after {:?}", self.fetch_timeout))??;

        // extracting: parse the raw content into a traversable document
        self.set_task_status(job_id, TaskType::Extracting, TaskStatus::Running)
            .await;
        if let Err(e) = analysis::check_parseable(&body) {
            self.set_task_status(job_id, TaskType::Extracting, TaskStatus::Failed)
                .await;
            return Err(e.into());
        }
        self.set_task_status(job_id, TaskType::Extracting, TaskStatus::Completed)
            .await;

        // identifying_version: pure string inspection, cannot fail
        self.set_task_status(job_id, TaskType::IdentifyingVersion, TaskStatus::Running)
            .await;
        let html_version = analysis::detect_html_version(&body);
        self.set_task_status(job_id, TaskType::IdentifyingVersion, TaskStatus::Completed)
            .await;

        // analyzing: title, headings, links, login form
        self.set_task_status(job_id, TaskType::Analyzing, TaskStatus::Running)
            .await;
        let mut facts = analysis::analyze(&body, url);
        facts.html_version = html_version;
        self.set_task_status(job_id, TaskType::Analyzing, TaskStatus::Completed)
            .await;

        // verifying_links: one subtask per discovered link, in order
        self.set_task_status(job_id, TaskType::VerifyingLinks, TaskStatus::Running)
            .await;
        for (index, link) in facts.links.iter().enumerate() {
            let key = (index + 1).to_string();
            let resolved = url.join(link).ok();
            let sub_url = resolved
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_else(|| link.clone());

            let mut sub = SubTask::validating_link(sub_url, format!("Validating link {link}"));
            self.record_sub_task(job_id, &key, sub.clone()).await;

            let reachable = match &resolved {
                Some(resolved) => self.link_checker.is_reachable(resolved.as_str()).await,
                None => false,
            };
            if reachable {
                facts.accessible_link_count += 1;
            } else {
                facts.inaccessible_link_count += 1;
            }

            sub.status = SubTaskStatus::Completed;
            self.record_sub_task(job_id, &key, sub).await;
        }
        self.set_task_status(job_id, TaskType::VerifyingLinks, TaskStatus::Completed)
            .await;

        Ok(facts)
    }

    /// Persist and publish a job-level transition. Failures here are
    /// fatal: job status is the correctness-bearing contract.
    async fn update_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        result: Option<AnalysisFacts>,
    ) -> Result<()> {
        self.job_store
            .update(job_id, Some(status), result.clone())
            .await?;
        bus::publish(
            &*self.publisher,
            &JobUpdateMessage::new(job_id, status, result),
        )
        .await?;
        Ok(())
    }

    /// Persist and publish a task transition. Best-effort: task status
    /// is observability, not correctness-critical.
    async fn set_task_status(&self, job_id: Uuid, task_type: TaskType, status: TaskStatus) {
        if let Err(e) = self
            .task_store
            .update_status(job_id, task_type, status)
            .await
        {
            warn!(job_id = %job_id, task_type = %task_type, error = %e, "task status write failed");
        }
        if let Err(e) = bus::publish(
            &*self.publisher,
            &TaskStatusUpdateMessage::new(job_id, task_type, status),
        )
        .await
        {
            warn!(job_id = %job_id, task_type = %task_type, error = %e, "task status publish failed");
        }
    }

    /// Upsert a subtask and publish the update. Best-effort, like task
    /// transitions.
    async fn record_sub_task(&self, job_id: Uuid, key: &str, sub: SubTask) {
        if let Err(e) = self
            .task_store
            .put_sub_task(job_id, TaskType::VerifyingLinks, key, sub.clone())
            .await
        {
            warn!(job_id = %job_id, key, error = %e, "subtask write failed");
        }
        if let Err(e) = bus::publish(
            &*self.publisher,
            &SubTaskUpdateMessage::new(job_id, TaskType::VerifyingLinks, key.to_string(), sub),
        )
        .await
        {
            warn!(job_id = %job_id, key, error = %e, "subtask publish failed");
        }
    }

    /// Collapse the job and all four tasks to failed. Idempotent and
    /// best-effort throughout; safe even when some tasks already
    /// completed or the job does not exist.
    pub async fn fail_all(&self, job_id: Uuid) {
        if let Err(e) = self
            .job_store
            .update(job_id, Some(JobStatus::Failed), None)
            .await
        {
            warn!(job_id = %job_id, error = %e, "job failed-status write failed");
        }
        if let Err(e) = bus::publish(
            &*self.publisher,
            &JobUpdateMessage::new(job_id, JobStatus::Failed, None),
        )
        .await
        {
            warn!(job_id = %job_id, error = %e, "job failed-status publish failed");
        }

        for task_type in TaskType::ALL {
            if let Err(e) = self
                .task_store
                .update_status(job_id, task_type, TaskStatus::Failed)
                .await
            {
                warn!(job_id = %job_id, task_type = %task_type, error = %e, "task fail-all write failed");
            }
            if let Err(e) = bus::publish(
                &*self.publisher,
                &TaskStatusUpdateMessage::new(job_id, task_type, TaskStatus::Failed),
            )
            .await
            {
                warn!(job_id = %job_id, task_type = %task_type, error = %e, "task fail-all publish failed");
            }
        }
    }
}

/// Worker service: a queue-group subscription on `url.analyze` feeding
/// the processor.
pub struct AnalysisWorker {
    client: async_nats::Client,
    processor: Arc<JobProcessor>,
    config: AnalysisWorkerConfig,
}

impl AnalysisWorker {
    pub fn new(
        client: async_nats::Client,
        processor: JobProcessor,
        config: AnalysisWorkerConfig,
    ) -> Self {
        Self {
            client,
            processor: Arc::new(processor),
            config,
        }
    }
}

#[async_trait]
impl Service for AnalysisWorker {
    fn name(&self) -> &'static str {
        "analysis-worker"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        let processor = Arc::clone(&self.processor);
        let subscription = bus::subscribe(
            &self.client,
            TOPIC_URL_ANALYZE,
            Some(&self.config.queue_group),
            move |msg| {
                let processor = Arc::clone(&processor);
                async move { processor.handle_message(msg).await }
            },
        )
        .await?;

        info!(queue_group = %self.config.queue_group, "analysis worker subscribed");
        shutdown.cancelled().await;
        subscription.unsubscribe();
        Ok(())
    }
}
