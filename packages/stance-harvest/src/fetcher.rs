//! Page fetching.
//!
//! One GET per candidate page, no retries. The dispatcher decides what a
//! failure means for the candidate's row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser-like User-Agent; the candidate pages block obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A successfully fetched document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,

    /// `Content-Type` header, if the server sent one
    pub content_type: Option<String>,

    /// Decoded response body
    pub body: String,

    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: None,
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Fetches candidate pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one URL. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;

    /// Fetcher name (for logging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build with the default timeout and User-Agent.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_settings(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Build with an explicit timeout and User-Agent.
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    /// Use an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: Box::new(err),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            transport_error(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(url, e))?;

        debug!(url = %url, content_length = body.len(), "Page fetched");

        Ok(FetchedPage {
            url: url.to_string(),
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_page_builder() {
        let page = FetchedPage::new("http://x/a", "<html></html>").with_content_type("text/html");

        assert_eq!(page.url, "http://x/a");
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
        assert_eq!(page.body, "<html></html>");
    }

    #[test]
    fn test_http_fetcher_builds() {
        let fetcher = HttpFetcher::with_settings(Duration::from_secs(5), "test-agent").unwrap();
        assert_eq!(fetcher.name(), "http");
    }
}
