//! Page analysis library.
//!
//! Pure HTML inspection (title, headings, links, login forms), URL
//! validation/normalization, and link reachability checking. The
//! orchestration server consumes these through the `analyze` /
//! `validate` functions and the `LinkChecker` trait; nothing in this
//! crate knows about jobs, tasks, or the message bus.

pub mod analyzer;
pub mod facts;
pub mod link_check;
pub mod url_check;
pub mod version;

pub use analyzer::{analyze, check_parseable, AnalyzeError};
pub use facts::AnalysisFacts;
pub use link_check::{HttpLinkChecker, LinkChecker, StaticLinkChecker};
pub use url_check::{validate, ValidationError};
pub use version::detect_html_version;
