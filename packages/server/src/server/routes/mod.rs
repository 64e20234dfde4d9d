pub mod analyze;
pub mod health;
pub mod jobs;
pub mod ws;

pub use analyze::analyze_handler;
pub use health::health_handler;
pub use jobs::{job_tasks_handler, list_jobs_handler};
pub use ws::ws_handler;
