// Linkscope - URL Analysis Orchestration Core
//
// This crate provides the job/task orchestration protocol for URL
// analysis and its real-time fan-out layer: shared bus message
// contracts, the job/task/subtask state model, the worker-side
// pipeline, and the WebSocket notification hub + bridge.

pub mod common;
pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
