//! Issue/response extraction from candidate pages.
//!
//! A candidate page exposes two parallel collections of blocks: one holding
//! issue labels, one holding the candidate's responses. They are paired by
//! position. A page whose layout no longer matches simply yields nothing.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::fetcher::FetchedPage;
use crate::types::{IssueResponse, SENTINEL};

/// Issue label blocks on a Political Courage Test page.
pub const ISSUE_SELECTOR: &str = "div.col-lg-8.col-md-6.col-sm.col-10.text-left.candidate-text";

/// Response blocks on a Political Courage Test page.
pub const RESPONSE_SELECTOR: &str =
    "div.col-lg-2.col-md-3.col-sm-3.col-10.text-left.candidate-text.pct-accordion-assigned-item-pre-break";

/// What to do when a page has more issue blocks than response blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// Stop at the shorter sequence; trailing issues are dropped.
    #[default]
    Truncate,
    /// Keep trailing issues with the sentinel as their response.
    PadResponses,
}

/// Selector contract for candidate pages.
#[derive(Debug, Clone)]
pub struct PageLayout {
    issue: Selector,
    response: Selector,
    pairing: PairingMode,
}

impl PageLayout {
    /// Build a layout from CSS selectors.
    pub fn new(issue_selector: &str, response_selector: &str) -> Result<Self, ParseError> {
        Ok(Self {
            issue: parse_selector(issue_selector)?,
            response: parse_selector(response_selector)?,
            pairing: PairingMode::default(),
        })
    }

    /// Set the pairing mode.
    pub fn with_pairing(mut self, pairing: PairingMode) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn pairing(&self) -> PairingMode {
        self.pairing
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new(ISSUE_SELECTOR, RESPONSE_SELECTOR).expect("built-in selectors are valid")
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Extracts ordered issue/response pairs from HTML.
#[derive(Debug, Clone, Default)]
pub struct IssueExtractor {
    layout: PageLayout,
}

impl IssueExtractor {
    pub fn new(layout: PageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Extract from a fetched page, rejecting bodies that are declared as
    /// something other than markup.
    pub fn extract(&self, page: &FetchedPage) -> Result<Vec<IssueResponse>, ParseError> {
        if let Some(content_type) = page.content_type.as_deref() {
            if !is_markup(content_type) {
                return Err(ParseError::NotHtml {
                    url: page.url.clone(),
                    content_type: content_type.to_string(),
                });
            }
        }

        Ok(self.extract_html(&page.body))
    }

    /// Extract from raw HTML. Pure: the same document always yields the
    /// same sequence.
    pub fn extract_html(&self, html: &str) -> Vec<IssueResponse> {
        let document = Html::parse_document(html);

        let issues: Vec<String> = document
            .select(&self.layout.issue)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect();
        let mut responses = document
            .select(&self.layout.response)
            .map(|el| el.text().collect::<String>().trim().to_string());

        let mut pairs = Vec::with_capacity(issues.len());
        for issue in issues {
            let response = match (responses.next(), self.layout.pairing) {
                (Some(response), _) => response,
                (None, PairingMode::Truncate) => break,
                (None, PairingMode::PadResponses) => SENTINEL.to_string(),
            };
            pairs.push(IssueResponse { issue, response });
        }

        pairs
    }
}

fn is_markup(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    essence.is_empty() || essence.starts_with("text/") || essence.contains("html") || essence.contains("xml")
}
