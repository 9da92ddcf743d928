//! Portal page navigation and data extraction.
//!
//! A [`PortalPage`] is one navigation context over the live session: the
//! steady loop drives a single long-lived page, while one-off refresh
//! scans run on ephemeral pages so they never disturb in-flight
//! navigation state. Every navigation classifies a redirect to the login
//! screen as [`ScrapeError::SessionLost`].

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::agent::AgentProfile;
use crate::domain::services::{PortalScraper, ScrapeError};
use crate::domain::snapshot::QueueCounts;
use crate::infrastructure::http_client::HttpClient;

/// Portal paths and selectors.
mod portal_layout {
    /// Review queue overview page (relative to the portal origin)
    pub const REVIEW_QUEUES_PATH: &str = "review/email";

    /// Ad search page used for per-agent totals
    pub const SEARCH_PATH: &str = "search/item";

    /// Fixed search filter; only `admin_user` varies per agent
    pub const SEARCH_QUERY: &str = "submitted=1&search=&event_type_from=&event_type_to=&event_type=&category=&rejection=&location=";

    pub const QUEUE_COUNT_SELECTOR: &str = ".review-tabs .review-count";
    pub const EDIT_LINK_SELECTOR: &str = "a.ui-btn.is-standard.edit.is-s";
    pub const CHECKED_PERMISSION_SELECTOR: &str = ".permissions .ui-checkbox[checked]";
}

lazy_static! {
    static ref RESULT_TOTAL_RE: Regex =
        Regex::new(r"of ([\d,]+) results").expect("result-count pattern is valid");
}

/// One navigation context over a portal session.
pub struct PortalPage {
    http: Arc<HttpClient>,
    base: Url,
}

impl PortalPage {
    pub(crate) fn new(http: Arc<HttpClient>, base: Url) -> Self {
        Self { http, base }
    }

    fn page_url(&self, path: &str, query: Option<&str>) -> Result<Url, ScrapeError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ScrapeError::Parse(format!("invalid portal url {path:?}: {e}")))?;
        url.set_query(query);
        Ok(url)
    }

    /// Navigate and return the page body. A final URL on the login screen
    /// means the session credentials no longer hold.
    async fn goto(&mut self, url: Url) -> Result<String, ScrapeError> {
        let response = self.http.get(url.as_str()).await?;
        let final_url = response.url().clone();
        if final_url.path().contains("login") {
            return Err(ScrapeError::SessionLost);
        }
        if !response.status().is_success() {
            return Err(ScrapeError::Http {
                status: response.status().as_u16(),
                url: final_url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl PortalScraper for PortalPage {
    async fn fetch_queue_counts(&mut self) -> Result<QueueCounts, ScrapeError> {
        let url = self.page_url(portal_layout::REVIEW_QUEUES_PATH, None)?;
        let body = self.goto(url).await?;
        parse_queue_counts(&body)
    }

    async fn fetch_agent_total(&mut self, agent: &AgentProfile) -> Result<u64, ScrapeError> {
        let query = format!("{}&admin_user={}", portal_layout::SEARCH_QUERY, agent.admin_user);
        let url = self.page_url(portal_layout::SEARCH_PATH, Some(&query))?;
        let body = self.goto(url).await?;
        parse_result_total(&body).ok_or_else(|| {
            ScrapeError::Parse(format!("no result total found for agent {}", agent.id))
        })
    }

    async fn fetch_permissions(&mut self, agent: &AgentProfile) -> Result<String, ScrapeError> {
        let Some(permission_url) = &agent.permission_url else {
            return Ok("N/A".to_string());
        };
        let url = Url::parse(permission_url)
            .map_err(|e| ScrapeError::Parse(format!("invalid permission url: {e}")))?;
        let listing = self.goto(url).await?;

        let Some(edit_href) = parse_edit_link(&listing)? else {
            return Ok("User Not Found".to_string());
        };
        let edit_url = self
            .base
            .join(&edit_href)
            .map_err(|e| ScrapeError::Parse(format!("invalid edit link {edit_href:?}: {e}")))?;
        let edit_page = self.goto(edit_url).await?;

        let labels = parse_checked_permissions(&edit_page)?;
        Ok(format_permissions(&labels))
    }
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Parse(format!("invalid selector {css:?}: {e}")))
}

/// Extract queue name -> count from the review overview page.
pub(crate) fn parse_queue_counts(body: &str) -> Result<QueueCounts, ScrapeError> {
    let document = Html::parse_document(body);
    let count_selector = selector(portal_layout::QUEUE_COUNT_SELECTOR)?;

    let mut counts = QueueCounts::new();
    for element in document.select(&count_selector) {
        let Some(queue) = element.value().attr("data-type") else {
            continue;
        };
        let text: String = element.text().collect();
        if let Ok(value) = text.trim().replace(',', "").parse::<u64>() {
            counts.insert(queue.to_string(), value);
        }
    }
    Ok(counts)
}

/// Extract the cumulative result total from the search page text, e.g.
/// "Showing 1-25 of 4,521 results".
pub(crate) fn parse_result_total(body: &str) -> Option<u64> {
    let captures = RESULT_TOTAL_RE.captures(body)?;
    captures.get(1)?.as_str().replace(',', "").parse().ok()
}

/// Href of the user edit button on the permission listing page.
pub(crate) fn parse_edit_link(body: &str) -> Result<Option<String>, ScrapeError> {
    let document = Html::parse_document(body);
    let link_selector = selector(portal_layout::EDIT_LINK_SELECTOR)?;
    Ok(document
        .select(&link_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(ToString::to_string))
}

/// Labels of the checked permission boxes on the user edit page.
pub(crate) fn parse_checked_permissions(body: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(body);
    let checked_selector = selector(portal_layout::CHECKED_PERMISSION_SELECTOR)?;

    let mut labels = Vec::new();
    for element in document.select(&checked_selector) {
        let Some(parent) = element.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let label: String = parent.text().collect::<String>().trim().to_string();
        if !label.is_empty() {
            labels.push(label);
        }
    }
    Ok(labels)
}

/// Compact display form of a permission label list.
pub(crate) fn format_permissions(labels: &[String]) -> String {
    if labels.is_empty() {
        return "-".to_string();
    }
    labels
        .iter()
        .map(|label| match label.as_str() {
            "Member" => "M",
            "Listing fee" => "L",
            "General" => "G",
            "Manager" => "MGR",
            "Fraud" => "FRD",
            "Edited" => "E",
            "Verification" => "V",
            "Email" => "MAIL",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_counts_parse_from_review_tabs() {
        let body = r#"
            <div class="review-tabs">
                <span class="review-count" data-type="general">1,204</span>
                <span class="review-count" data-type="fraud">17</span>
                <span class="review-count">99</span>
                <span class="review-count" data-type="edited">n/a</span>
            </div>
        "#;
        let counts = parse_queue_counts(body).unwrap();
        assert_eq!(counts.get("general"), Some(&1204));
        assert_eq!(counts.get("fraud"), Some(&17));
        // untyped and non-numeric entries are skipped
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn result_total_handles_thousands_separator() {
        let body = "<body>Showing 1-25 of 4,521 results</body>";
        assert_eq!(parse_result_total(body), Some(4521));
        assert_eq!(parse_result_total("<body>no results here</body>"), None);
    }

    #[test]
    fn edit_link_extraction() {
        let body = r#"<a class="ui-btn is-standard edit is-s" href="/users/42/edit">Edit</a>"#;
        assert_eq!(parse_edit_link(body).unwrap().as_deref(), Some("/users/42/edit"));
        assert_eq!(parse_edit_link("<p>empty</p>").unwrap(), None);
    }

    #[test]
    fn checked_permissions_use_parent_label_text() {
        let body = r#"
            <div class="permissions">
                <label> Member <input class="ui-checkbox" type="checkbox" checked></label>
                <label> Fraud <input class="ui-checkbox" type="checkbox"></label>
                <label> Listing fee <input class="ui-checkbox" type="checkbox" checked></label>
            </div>
        "#;
        let labels = parse_checked_permissions(body).unwrap();
        assert_eq!(labels, vec!["Member".to_string(), "Listing fee".to_string()]);
    }

    #[test]
    fn permission_formatting_compacts_known_labels() {
        let labels = vec![
            "Member".to_string(),
            "Listing fee".to_string(),
            "Manager".to_string(),
            "Custom".to_string(),
        ];
        assert_eq!(format_permissions(&labels), "M L MGR Custom");
        assert_eq!(format_permissions(&[]), "-");
    }
}
