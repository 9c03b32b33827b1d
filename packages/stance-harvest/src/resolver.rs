//! Candidate link resolution.
//!
//! Produces the `name,link` table the harvester consumes: a search-based
//! resolver, a roster pass that resolves every name, and a repair pass that
//! retries only the rows still missing a link. All of it is sequential and
//! paced to stay under the search engine's rate limits.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::error::{FetchError, FetchResult, HarvestError, SourceError, WriteError};
use crate::fetcher::DEFAULT_TIMEOUT;
use crate::links::{read_links, write_links};
use crate::types::{LinkRecord, NAME_COLUMN};

const SEARCH_ENDPOINT: &str = "https://www.google.com/search";

/// Prefix added to every candidate name before searching.
pub const QUERY_PREFIX: &str = "just facts vote smart candidate political courage test";

/// Rotated per request to look like ordinary browser traffic.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Gecko/20100101 Firefox/85.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Linux; Android 10; Pixel 3 XL) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.93 Mobile Safari/537.36",
];

/// Column holding names in a roster file.
const ROSTER_NAME_COLUMN: &str = "full_name";

/// Turns a candidate name into the URL of their page.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Resolve one name. `Ok(None)` means the search found nothing usable.
    async fn resolve(&self, name: &str) -> FetchResult<Option<String>>;
}

/// Resolver that takes the first organic web search result.
pub struct SearchResolver {
    client: reqwest::Client,
}

impl SearchResolver {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Search URL for a candidate name.
    pub fn search_url(name: &str) -> String {
        let query = format!("{} {}", QUERY_PREFIX, name);
        match Url::parse_with_params(SEARCH_ENDPOINT, &[("q", query.as_str())]) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}?q={}", SEARCH_ENDPOINT, query.replace(' ', "+")),
        }
    }
}

#[async_trait]
impl LinkResolver for SearchResolver {
    async fn resolve(&self, name: &str) -> FetchResult<Option<String>> {
        let url = Self::search_url(name);
        let user_agent = USER_AGENTS[fastrand::usize(..USER_AGENTS.len())];

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(candidate = %name, status = status.as_u16(), "Error fetching search results");
            return Ok(None);
        }

        let html = response.text().await.map_err(|e| FetchError::Transport {
            url: url.clone(),
            source: Box::new(e),
        })?;

        let link = first_result_link(&html);
        if link.is_none() {
            warn!(candidate = %name, "No valid result link found");
        }
        Ok(link)
    }
}

/// Link of the first result heading on a search results page.
pub fn first_result_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let heading = Selector::parse("h3").ok()?;

    let first = document.select(&heading).next()?;
    let anchor = first
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")?;
    let href = anchor.value().attr("href")?;

    Some(unwrap_redirect(href))
}

/// Search engines wrap results as `/url?q=<target>`; return the target.
fn unwrap_redirect(href: &str) -> String {
    let Ok(parsed) = Url::parse(SEARCH_ENDPOINT).and_then(|base| base.join(href)) else {
        return href.to_string();
    };

    let param = |key: &str| {
        parsed
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    param("url")
        .or_else(|| (parsed.path() == "/url").then(|| param("q")).flatten())
        .unwrap_or_else(|| href.to_string())
}

/// Pause between resolver calls.
#[derive(Debug, Clone)]
pub struct ResolvePacing {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ResolvePacing {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay: min_delay.min(max_delay),
            max_delay: max_delay.max(min_delay),
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    async fn pause(&self) {
        let span = self.max_delay.saturating_sub(self.min_delay).as_millis() as u64;
        let delay = self.min_delay + Duration::from_millis(fastrand::u64(0..=span));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for ResolvePacing {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(10))
    }
}

/// Outcome of a resolve or repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResolveReport {
    /// Names looked up
    pub attempted: usize,

    /// Names that came back with a link
    pub resolved: usize,
}

/// Re-resolve every row of a link table whose link is missing, then write
/// the table back in place.
pub async fn repair_links<R: LinkResolver>(
    path: impl AsRef<Path>,
    resolver: &R,
    pacing: &ResolvePacing,
) -> Result<ResolveReport, HarvestError> {
    let path = path.as_ref();
    let mut links = read_links(path)?;
    let mut report = ResolveReport::default();

    for record in links.values_mut().filter(|r| r.url.is_none()) {
        info!(candidate = %record.name, "Updating link");
        report.attempted += 1;

        let link = resolve_or_log(resolver, &record.name).await;
        *record = LinkRecord::new(record.name.clone(), link.as_deref());
        if record.url.is_some() {
            report.resolved += 1;
        }
        info!(candidate = %record.name, link = %record.link_cell(), "Updated link");

        pacing.pause().await;
    }

    write_links(path, &links)?;
    info!(
        path = %path.display(),
        attempted = report.attempted,
        resolved = report.resolved,
        "Link table repaired"
    );
    Ok(report)
}

/// Resolve every name in a roster and append `name,link` rows to `output`.
///
/// The roster's `full_name` column is used, or its first column when there
/// is none. The header is only written when `output` is new or empty.
pub async fn resolve_roster<R: LinkResolver>(
    roster: impl AsRef<Path>,
    output: impl AsRef<Path>,
    resolver: &R,
    pacing: &ResolvePacing,
) -> Result<ResolveReport, HarvestError> {
    let names = read_roster(roster.as_ref())?;
    let total = names.len();
    let mut report = ResolveReport::default();
    let mut records = Vec::with_capacity(total);

    for (index, name) in names.into_iter().enumerate() {
        let link = resolve_or_log(resolver, &name).await;
        let record = LinkRecord::new(name, link.as_deref());

        report.attempted += 1;
        if record.url.is_some() {
            report.resolved += 1;
        }
        info!(
            "Processed {}/{}: {} -> {}",
            index + 1,
            total,
            record.name,
            record.link_cell()
        );
        records.push(record);

        if index + 1 < total {
            pacing.pause().await;
        }
    }

    append_links(output.as_ref(), &records)?;
    Ok(report)
}

async fn resolve_or_log<R: LinkResolver>(resolver: &R, name: &str) -> Option<String> {
    match resolver.resolve(name).await {
        Ok(link) => link,
        Err(e) => {
            warn!(candidate = %name, error = %e, "Link resolution failed");
            None
        }
    }
}

fn read_roster(path: &Path) -> Result<Vec<String>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let malformed = |source| SourceError::Malformed {
        path: path.to_path_buf(),
        source,
    };
    let headers = reader.headers().map_err(malformed)?.clone();
    if headers.is_empty() {
        return Err(SourceError::MissingHeader {
            path: path.to_path_buf(),
        });
    }
    let column = headers
        .iter()
        .position(|h| h.trim() == ROSTER_NAME_COLUMN)
        .unwrap_or(0);

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        if let Some(name) = record.get(column).map(str::trim).filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn append_links(path: &Path, records: &[LinkRecord]) -> Result<(), WriteError> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| WriteError::Create {
            path: path.to_path_buf(),
            source,
        })?;

    let csv_error = |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_writer(file);
    if is_new {
        writer.write_record([NAME_COLUMN, "link"]).map_err(csv_error)?;
    }
    for record in records {
        writer
            .write_record([record.name.as_str(), record.link_cell()])
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockResolver;

    #[test]
    fn test_search_url_encodes_query() {
        let url = SearchResolver::search_url("Sanders Bernard");

        assert_eq!(
            url,
            "https://www.google.com/search?q=just+facts+vote+smart+candidate+political+courage+test+Sanders+Bernard"
        );
    }

    #[test]
    fn test_first_result_unwraps_redirect() {
        let html = r#"
            <html><body>
              <a href="/url?q=https://justfacts.votesmart.org/candidate/political-courage-test/27110/bernie-sanders&amp;sa=U">
                <div><h3>Bernie Sanders' Political Courage Test</h3></div>
              </a>
              <a href="/url?q=https://example.com/second"><h3>Second</h3></a>
            </body></html>
        "#;

        assert_eq!(
            first_result_link(html).as_deref(),
            Some("https://justfacts.votesmart.org/candidate/political-courage-test/27110/bernie-sanders")
        );
    }

    #[test]
    fn test_first_result_prefers_url_param() {
        let html = r#"<a href="/link?url=https://x.org/a&q=ignored"><h3>A</h3></a>"#;

        assert_eq!(first_result_link(html).as_deref(), Some("https://x.org/a"));
    }

    #[test]
    fn test_first_result_plain_href() {
        let html = r#"<a href="https://x.org/direct"><h3>A</h3></a>"#;

        assert_eq!(first_result_link(html).as_deref(), Some("https://x.org/direct"));
    }

    #[test]
    fn test_first_result_missing() {
        assert_eq!(first_result_link("<html><body><p>nothing</p></body></html>"), None);
        assert_eq!(first_result_link("<div><h3>No link</h3></div>"), None);
        assert_eq!(first_result_link("<a name=\"x\"><h3>No href</h3></a>"), None);
    }

    #[tokio::test]
    async fn test_repair_only_touches_missing_links() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(&path, "name,link\nA,http://x/a\nB,None\nC,\n").unwrap();
        let resolver = MockResolver::new().with_link("B", "http://x/b");

        let report = repair_links(&path, &resolver, &ResolvePacing::none()).await.unwrap();

        assert_eq!(report, ResolveReport { attempted: 2, resolved: 1 });
        assert_eq!(resolver.calls(), vec!["B", "C"]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "name,link\nA,http://x/a\nB,http://x/b\nC,None\n"
        );
    }

    #[tokio::test]
    async fn test_roster_appends_without_repeating_header() {
        let dir = tempfile::tempdir().unwrap();
        let roster = dir.path().join("roster.csv");
        let output = dir.path().join("links.csv");
        std::fs::write(&roster, "last_name,full_name\nSanders,Bernard Sanders\nKing,Angus King\n").unwrap();
        std::fs::write(&output, "name,link\nOld,http://x/old\n").unwrap();
        let resolver = MockResolver::new().with_link("Angus King", "http://x/king");

        let report = resolve_roster(&roster, &output, &resolver, &ResolvePacing::none())
            .await
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.resolved, 1);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "name,link\nOld,http://x/old\nBernard Sanders,None\nAngus King,http://x/king\n"
        );
    }

    #[tokio::test]
    async fn test_roster_writes_header_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let roster = dir.path().join("roster.txt");
        let output = dir.path().join("links.csv");
        std::fs::write(&roster, "name\nAngus King\n").unwrap();

        resolve_roster(&roster, &output, &MockResolver::new(), &ResolvePacing::none())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "name,link\nAngus King,None\n"
        );
    }
}
