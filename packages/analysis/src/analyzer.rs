//! DOM inspection: title, headings, links, and login form detection.

use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use crate::facts::AnalysisFacts;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("document is empty")]
    EmptyDocument,
}

/// Verify that a fetched body is a parseable document.
///
/// html5ever is a recovering parser, so the only unconditionally
/// unparseable input is an empty (or whitespace-only) body.
pub fn check_parseable(html: &str) -> Result<(), AnalyzeError> {
    if html.trim().is_empty() {
        return Err(AnalyzeError::EmptyDocument);
    }
    Ok(())
}

/// Inspect a page and collect structural facts.
///
/// Traversal is a single parse followed by selector scans, all
/// synchronous (the parsed `Html` is not `Send`, so it must never be
/// held across an await point). `html_version` and the reachability
/// counters are left for the caller to fill in.
pub fn analyze(html: &str, base_url: &Url) -> AnalysisFacts {
    let document = Html::parse_document(html);
    let mut facts = AnalysisFacts::default();

    facts.title = extract_title(&document);
    facts.headings = count_headings(&document);
    facts.links = collect_links(&document);
    facts.has_login_form = detect_login_form(&document);

    for link in &facts.links {
        if is_internal(link, base_url) {
            facts.internal_link_count += 1;
        } else {
            facts.external_link_count += 1;
        }
    }

    facts
}

fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn count_headings(document: &Html) -> std::collections::HashMap<String, usize> {
    let mut headings = std::collections::HashMap::new();
    for level in 1..=6 {
        let tag = format!("h{level}");
        let Ok(selector) = Selector::parse(&tag) else {
            continue;
        };
        let count = document.select(&selector).count();
        if count > 0 {
            headings.insert(tag, count);
        }
    }
    headings
}

fn collect_links(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// A link is internal when it resolves to the same host as the page.
/// Unresolvable hrefs and hrefs without a host count as external.
fn is_internal(href: &str, base_url: &Url) -> bool {
    match base_url.join(href) {
        Ok(resolved) => resolved.host_str().is_some() && resolved.host_str() == base_url.host_str(),
        Err(_) => false,
    }
}

/// A login form is a `form` with both a password-type and an
/// email-type input somewhere among its descendants.
fn detect_login_form(document: &Html) -> bool {
    let (Ok(forms), Ok(password), Ok(email)) = (
        Selector::parse("form"),
        Selector::parse(r#"input[type="password"]"#),
        Selector::parse(r#"input[type="email"]"#),
    ) else {
        return false;
    };

    document.select(&forms).any(|form| {
        form.select(&password).next().is_some() && form.select(&email).next().is_some()
    })
}
