//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the harvest pipeline without making real
//! network calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::extractor::{ISSUE_SELECTOR, RESPONSE_SELECTOR};
use crate::fetcher::{FetchedPage, PageFetcher};
use crate::resolver::LinkResolver;

/// Build a candidate page in the default layout from (issue, response) pairs.
pub fn issue_page(pairs: &[(&str, &str)]) -> String {
    let issues: Vec<&str> = pairs.iter().map(|(issue, _)| *issue).collect();
    let responses: Vec<&str> = pairs.iter().map(|(_, response)| *response).collect();
    layout_page(&issues, &responses)
}

/// Build a candidate page with independent issue and response lists.
pub fn layout_page(issues: &[&str], responses: &[&str]) -> String {
    let issue_class = selector_classes(ISSUE_SELECTOR);
    let response_class = selector_classes(RESPONSE_SELECTOR);

    let mut html = String::from("<!DOCTYPE html><html><body><div class=\"accordion\">");
    for issue in issues {
        html.push_str(&format!("<div class=\"{issue_class}\">\n    {issue}\n</div>"));
    }
    for response in responses {
        html.push_str(&format!("<div class=\"{response_class}\">\n    {response}\n</div>"));
    }
    html.push_str("</div></body></html>");
    html
}

/// `div.a.b` → `a b`
fn selector_classes(selector: &str) -> String {
    selector.split('.').skip(1).collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
enum MockResponse {
    Page(FetchedPage),
    Status(u16),
    Transport,
    Fault,
}

/// A mock fetcher serving canned pages and failures.
///
/// Unknown URLs answer with HTTP 404. Clones share state, so a clone kept by
/// the test can inspect calls made through the harvester.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    latency: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` as `text/html` at `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_page_of_type(url, html, "text/html; charset=utf-8")
    }

    /// Serve `body` with an explicit content type.
    pub fn with_page_of_type(
        self,
        url: impl Into<String>,
        body: impl Into<String>,
        content_type: &str,
    ) -> Self {
        let url = url.into();
        let page = FetchedPage::new(url.clone(), body).with_content_type(content_type);
        self.insert(url, MockResponse::Page(page))
    }

    /// Answer `url` with a non-2xx status.
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.insert(url.into(), MockResponse::Status(status))
    }

    /// Fail `url` with a transport error.
    pub fn with_transport_failure(self, url: impl Into<String>) -> Self {
        self.insert(url.into(), MockResponse::Transport)
    }

    /// Panic while fetching `url`, simulating an internal task fault.
    pub fn with_fault(self, url: impl Into<String>) -> Self {
        self.insert(url.into(), MockResponse::Fault)
    }

    /// Delay every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Highest number of fetches that were in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn insert(self, url: String, response: MockResponse) -> Self {
        self.responses.write().unwrap().insert(url, response);
        self
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self.responses.read().unwrap().get(url).cloned();
        match response {
            Some(MockResponse::Page(page)) => Ok(page),
            Some(MockResponse::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(MockResponse::Transport) => Err(FetchError::Transport {
                url: url.to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Mock connection refused",
                )),
            }),
            Some(MockResponse::Fault) => panic!("mock fault fetching {url}"),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock resolver with canned name → link answers.
///
/// Unknown names resolve to nothing.
#[derive(Clone, Default)]
pub struct MockResolver {
    links: Arc<RwLock<HashMap<String, String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.write().unwrap().insert(name.into(), url.into());
        self
    }

    /// Names resolved so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl LinkResolver for MockResolver {
    async fn resolve(&self, name: &str) -> FetchResult<Option<String>> {
        self.calls.write().unwrap().push(name.to_string());
        Ok(self.links.read().unwrap().get(name).cloned())
    }
}
