//! Service layer traits at the engine's external seams.
//!
//! The portal scraper and the state sink are external collaborators; the
//! engine only depends on these interfaces and on the typed error
//! classification below (no error-text matching anywhere in the core).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::agent::AgentProfile;
use crate::domain::snapshot::{QueueCounts, StatusUpdate};

/// Typed scrape failure classification.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The underlying portal session is gone (logged out / disconnected);
    /// the session handle must be discarded and recreated.
    #[error("portal session is no longer valid (redirected to login)")]
    SessionLost,

    /// A fresh session could not be established; the caller backs off.
    #[error("portal session unavailable: {0}")]
    SessionUnavailable(String),

    /// A single call exceeded its per-call timeout (transient).
    #[error("request timed out: {url}")]
    Timeout { url: String },

    /// Transport-level failure (transient).
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success HTTP status (transient).
    #[error("http status {status} from {url}")]
    Http { status: u16, url: String },

    /// Page content did not match the expected structure (transient).
    #[error("failed to parse page content: {0}")]
    Parse(String),
}

impl ScrapeError {
    /// Whether the session handle should be discarded so the next
    /// `ensure_ready` recreates it from scratch.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionLost)
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Scraping operations against the portal, performed on one page
/// (navigation context) of the live session.
#[async_trait]
pub trait PortalScraper: Send {
    /// Review queue name -> backlog count.
    async fn fetch_queue_counts(&mut self) -> Result<QueueCounts, ScrapeError>;

    /// Cumulative processed-ad count for one agent.
    async fn fetch_agent_total(&mut self, agent: &AgentProfile) -> Result<u64, ScrapeError>;

    /// Compact permission string for one agent ("N/A" when the agent has
    /// no permission page configured).
    async fn fetch_permissions(&mut self, agent: &AgentProfile) -> Result<String, ScrapeError>;
}

/// Self-healing source of scrape pages.
///
/// The scheduler consumes pages exclusively through this seam: a
/// long-lived working page for the steady loop and ephemeral pages for
/// one-off scans. `invalidate` discards the backing session after a
/// [`ScrapeError::SessionLost`] classification so the next `ensure_page`
/// rebuilds it from scratch.
#[async_trait]
pub trait PageSource: Send {
    type Page: PortalScraper;

    /// Return the steady-state working page, creating the session and
    /// page if needed.
    async fn ensure_page(&mut self) -> Result<&mut Self::Page, ScrapeError>;

    /// Open a short-lived page over the live session for a one-off scan.
    async fn ephemeral_page(&mut self) -> Result<Self::Page, ScrapeError>;

    /// Discard the live session handle.
    fn invalidate(&mut self);
}

/// Push side of the state sink.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn push_status(&self, update: &StatusUpdate) -> anyhow::Result<()>;
}
