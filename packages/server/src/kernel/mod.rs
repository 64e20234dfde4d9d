//! Kernel module - orchestration infrastructure and shared contracts.

pub mod bridge;
pub mod bus;
pub mod fetcher;
pub mod hub;
pub mod jobs;
pub mod messages;
pub mod nats;
pub mod service;
pub mod worker;

pub use bridge::{BridgeHandle, NotificationBridge};
pub use bus::{BusMessage, SubscriptionHandle, TRACE_ID_HEADER};
pub use fetcher::{ContentFetcher, HttpFetcher, StaticFetcher};
pub use hub::{ControlAction, ControlFrame, NotificationHub, WsConnection, OUTBOX_CAPACITY};
pub use jobs::{
    Job, JobStatus, JobStore, MemoryJobStore, MemoryTaskStore, StoreError, SubTask, SubTaskStatus,
    Task, TaskStatus, TaskStore, TaskType,
};
pub use messages::{
    AnalyzeMessage, BusEvent, JobUpdateMessage, MessageType, SubTaskUpdateMessage,
    TaskStatusUpdateMessage, TOPIC_JOB_UPDATE, TOPIC_TASK_STATUS_UPDATE,
    TOPIC_TASK_SUBTASK_UPDATE, TOPIC_URL_ANALYZE,
};
pub use nats::{FailingNats, NatsClientPublisher, NatsPublisher, PublishedMessage, TestNats};
pub use service::{Service, ServiceHost};
pub use worker::{AnalysisWorker, AnalysisWorkerConfig, JobProcessor};
