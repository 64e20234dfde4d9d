//! Common utilities shared across the kernel and HTTP surface.

pub mod id;

pub use id::db_id;
