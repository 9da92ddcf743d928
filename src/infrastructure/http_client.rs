//! HTTP client for portal scraping with rate limiting.
//!
//! One client per portal session; the cookie jar carries the session
//! credentials, and the rate limiter keeps the scrape loop polite toward
//! the portal.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};

/// HTTP client configuration for scraping.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

/// Rate-limited HTTP client bound to one session cookie jar.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpClient {
    pub fn new(config: &HttpClientConfig, jar: Arc<Jar>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_provider(jar)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Fetch a URL, waiting for the rate limiter first. Status handling
    /// is left to the caller, which needs the final URL for login-redirect
    /// detection.
    pub async fn get(&self, url: &str) -> std::result::Result<Response, reqwest::Error> {
        self.rate_limiter.until_ready().await;
        tracing::debug!("Fetching URL: {url}");
        self.client.get(url).send().await
    }
}
