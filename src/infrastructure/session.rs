//! Portal session lifecycle management.
//!
//! One long-lived authenticated session backs the whole steady loop, with
//! a single working page for navigation. The manager recreates both on
//! detected death and hands out ephemeral pages for one-off scans. It
//! only manages the session resource; business state is never touched
//! here.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::services::{PageSource, ScrapeError};
use crate::infrastructure::config::{AppConfig, PortalConfig};
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};
use crate::infrastructure::portal::PortalPage;

/// Browser-exported cookie record (Puppeteer `cookies.json` shape).
#[derive(Debug, Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

/// One live authenticated portal session.
pub struct PortalSession {
    pub id: Uuid,
    base: Url,
    http: Arc<HttpClient>,
    connected: bool,
}

impl PortalSession {
    async fn connect(config: &PortalConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("invalid portal base url {:?}", config.base_url))?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie_file) = &config.cookie_file {
            match load_exported_cookies(&jar, cookie_file, &base).await {
                Ok(count) => info!("🍪 Loaded {count} cookies from {cookie_file:?}"),
                Err(err) => warn!("⚠️ Could not load {cookie_file:?}: {err:#}"),
            }
        }

        let http = HttpClient::new(
            &HttpClientConfig {
                user_agent: config.user_agent.clone(),
                timeout_seconds: config.request_timeout_seconds,
                max_requests_per_second: config.max_requests_per_second,
            },
            jar,
        )?;

        let session = Self {
            id: Uuid::new_v4(),
            base,
            http: Arc::new(http),
            connected: true,
        };
        session.check_login().await;
        Ok(session)
    }

    /// Verify the landing page is reachable without a login redirect.
    /// Failures are logged only; scrapes surface the typed error later.
    async fn check_login(&self) {
        let url = match self.base.join("search/item") {
            Ok(url) => url,
            Err(err) => {
                warn!("⚠️ Login check skipped, bad url: {err}");
                return;
            }
        };
        match self.http.get(url.as_str()).await {
            Ok(response) if response.url().path().contains("login") => {
                error!("❌ Session expired (redirected to login) - refresh the exported cookies");
            }
            Ok(_) => info!("✅ Portal login verified"),
            Err(err) => warn!("⚠️ Login check failed: {err}"),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Open a new navigation context over this session.
    pub fn open_page(&self) -> PortalPage {
        PortalPage::new(Arc::clone(&self.http), self.base.clone())
    }
}

/// Owns the lifecycle of the portal session and its steady-state working
/// page.
pub struct SessionManager {
    config: Arc<AppConfig>,
    session: Option<PortalSession>,
    working_page: Option<PortalPage>,
}

impl SessionManager {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            session: None,
            working_page: None,
        }
    }

    /// Idempotent: return the live session, or discard the stale handle
    /// and create a fresh one. Creation failure surfaces
    /// [`ScrapeError::SessionUnavailable`]; the caller backs off, no
    /// internal retry.
    pub async fn ensure_ready(&mut self) -> Result<&mut PortalSession, ScrapeError> {
        if self.session.as_ref().is_none_or(|s| !s.is_connected()) {
            if self.session.take().is_some() {
                self.working_page = None;
                info!("🔄 Discarding stale portal session");
            }
            info!("🚀 Opening new portal session...");
            let session = PortalSession::connect(&self.config.portal)
                .await
                .map_err(|err| ScrapeError::SessionUnavailable(format!("{err:#}")))?;
            info!(session_id = %session.id, "✅ Portal session established");
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| ScrapeError::SessionUnavailable("session missing after connect".into()))
    }

    /// Return the steady-state working page, opening one if needed.
    pub async fn ensure_page(&mut self) -> Result<&mut PortalPage, ScrapeError> {
        self.ensure_ready().await?;
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ScrapeError::SessionUnavailable("session missing".into()))?;
        if self.working_page.is_none() {
            info!("📄 Opening steady-state working page");
            self.working_page = Some(session.open_page());
        }
        self.working_page
            .as_mut()
            .ok_or_else(|| ScrapeError::SessionUnavailable("working page missing".into()))
    }

    /// Open a short-lived page for a one-off scan, leaving the working
    /// page's navigation state untouched.
    pub async fn ephemeral_page(&mut self) -> Result<PortalPage, ScrapeError> {
        let session = self.ensure_ready().await?;
        Ok(session.open_page())
    }

    /// Discard the session handle after a session-lost classification so
    /// the next `ensure_ready` recreates it from scratch.
    pub fn invalidate(&mut self) {
        if let Some(session) = self.session.take() {
            warn!(session_id = %session.id, "🔄 Portal session marked dead; reconnecting next tick");
        }
        self.working_page = None;
    }
}

#[async_trait::async_trait]
impl PageSource for SessionManager {
    type Page = PortalPage;

    async fn ensure_page(&mut self) -> Result<&mut PortalPage, ScrapeError> {
        SessionManager::ensure_page(self).await
    }

    async fn ephemeral_page(&mut self) -> Result<PortalPage, ScrapeError> {
        SessionManager::ephemeral_page(self).await
    }

    fn invalidate(&mut self) {
        SessionManager::invalidate(self);
    }
}

/// Seed the cookie jar from a browser-exported cookies.json. Returns the
/// number of cookies loaded.
async fn load_exported_cookies(jar: &Jar, path: &Path, base: &Url) -> Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .context("failed to read cookie file")?;
    let cookies: Vec<ExportedCookie> =
        serde_json::from_str(&content).context("cookie file is not a cookie export")?;

    let mut loaded = 0;
    for cookie in &cookies {
        let mut header = format!("{}={}", cookie.name, cookie.value);
        if let Some(domain) = &cookie.domain {
            header.push_str("; Domain=");
            header.push_str(domain.trim_start_matches('.'));
        }
        if let Some(path) = &cookie.path {
            header.push_str("; Path=");
            header.push_str(path);
        }
        jar.add_cookie_str(&header, base);
        loaded += 1;
    }
    // a jar that swallowed everything silently would be a config problem
    if loaded > 0 && jar.cookies(base).is_none() {
        warn!("⚠️ Cookie file loaded but no cookie matches the portal domain");
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exported_cookies_are_loaded_into_the_jar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        tokio::fs::write(
            &path,
            r#"[
                {"name": "auth", "value": "tok123", "domain": ".admin.example.com", "path": "/"},
                {"name": "sid", "value": "abc"}
            ]"#,
        )
        .await
        .unwrap();

        let jar = Jar::default();
        let base = Url::parse("https://admin.example.com/").unwrap();
        let loaded = load_exported_cookies(&jar, &path, &base).await.unwrap();
        assert_eq!(loaded, 2);

        let header = jar.cookies(&base).unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("auth=tok123"));
        assert!(header.contains("sid=abc"));
    }

    #[tokio::test]
    async fn invalid_cookie_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        let jar = Jar::default();
        let base = Url::parse("https://admin.example.com/").unwrap();
        assert!(load_exported_cookies(&jar, &path, &base).await.is_err());
    }
}
