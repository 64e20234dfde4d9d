//! Result shape produced by page analysis.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Everything the analyzer learned about a page.
///
/// `accessible_link_count` and `inaccessible_link_count` start at zero;
/// they are filled in by the link verification phase, which is the only
/// part of analysis that touches the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFacts {
    pub html_version: String,
    pub title: String,
    /// Heading tag name (`h1`..`h6`) to occurrence count. Tags that do
    /// not appear on the page are absent from the map.
    pub headings: HashMap<String, usize>,
    /// Every `href`-bearing anchor in document order. Repeated hrefs
    /// are kept; deduplication would skew the link counts.
    pub links: Vec<String>,
    pub internal_link_count: usize,
    pub external_link_count: usize,
    pub accessible_link_count: usize,
    pub inaccessible_link_count: usize,
    pub has_login_form: bool,
}
