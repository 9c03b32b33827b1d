//! Candidate stance harvesting.
//!
//! Scrapes per-candidate policy-issue pages, where neither the set of issues
//! nor their order is known in advance, into one rectangular table: a `name`
//! column followed by every issue label seen anywhere in the run, sorted.
//!
//! # Pipeline
//!
//! ```text
//! links.csv ─▶ Harvester ─┬─▶ fetch ─▶ extract ─┐
//!                         ├─▶ fetch ─▶ extract ─┼─▶ collector (schema + records)
//!                         └─▶ ...               ┘        │ channel closed
//!                                                        ▼
//!                                               assemble ─▶ table.csv
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use stance_harvest::{read_links, HarvestConfig, Harvester, HttpFetcher, IssueExtractor};
//! use tokio_util::sync::CancellationToken;
//!
//! let links = read_links("legislators_links.csv")?;
//! let harvester = Harvester::new(HttpFetcher::new()?, IssueExtractor::default(), HarvestConfig::new());
//! let report = harvester
//!     .run(links, "political_stance.csv".as_ref(), &CancellationToken::new())
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`links`] - Link table reading and writing
//! - [`fetcher`] - Page fetching (`PageFetcher`, `HttpFetcher`)
//! - [`extractor`] - Issue/response extraction from HTML
//! - [`schema`] - Run-wide issue label schema
//! - [`dispatcher`] - Worker pool and result collection
//! - [`assembler`] - Row backfilling and table output
//! - [`resolver`] - Search-based link resolution and repair
//! - [`ranking`] - Weighted-distance candidate ranking
//! - [`testing`] - Mock implementations for testing

pub mod assembler;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod links;
mod persist;
pub mod ranking;
pub mod resolver;
pub mod schema;
pub mod testing;
pub mod types;

pub use assembler::{assemble, write_table};
pub use dispatcher::{FaultPolicy, Harvest, HarvestConfig, HarvestReport, Harvester, DEFAULT_CONCURRENCY};
pub use error::{FetchError, HarvestError, ParseError, RankingError, SourceError, WriteError};
pub use extractor::{IssueExtractor, PageLayout, PairingMode};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};
pub use links::{read_links, write_links, LinkTable};
pub use ranking::{rank_candidates, Preference, RankedCandidate};
pub use resolver::{repair_links, resolve_roster, LinkResolver, ResolvePacing, ResolveReport, SearchResolver};
pub use schema::{FrozenSchema, SchemaRegistry};
pub use types::{CandidateRecord, IssueResponse, LinkRecord, OutputRow, Table, SENTINEL};
