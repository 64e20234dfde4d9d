//! Job/task domain model and store contracts.

pub mod job;
pub mod memory;
pub mod store;
pub mod task;

pub use job::{Job, JobStatus};
pub use memory::{MemoryJobStore, MemoryTaskStore};
pub use store::{JobStore, StoreError, TaskStore};
pub use task::{SubTask, SubTaskStatus, SubTaskType, Task, TaskStatus, TaskType};
