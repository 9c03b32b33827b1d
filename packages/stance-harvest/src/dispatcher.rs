//! Harvest pipeline - fan out over candidates, fan in to one table.
//!
//! Every candidate gets its own task, gated by a semaphore. Tasks never share
//! state: each one sends its outcome over a channel to a single collector
//! that owns the [`SchemaRegistry`] and the record list. The dispatcher joins
//! every task, then drops its sender; the channel closing is the barrier
//! after which the schema is frozen and rows are assembled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assembler::{assemble, write_table};
use crate::error::{HarvestError, Result};
use crate::extractor::IssueExtractor;
use crate::fetcher::PageFetcher;
use crate::links::LinkTable;
use crate::schema::{FrozenSchema, SchemaRegistry};
use crate::types::{CandidateRecord, IssueResponse, LinkRecord, Table};

/// Worker slots when none are configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// What to do with a candidate whose task panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Leave the candidate out of the table.
    #[default]
    Drop,
    /// Emit an all-sentinel row, like any other failure.
    SentinelRow,
}

/// Configuration for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Number of candidates processed at once
    pub concurrency: usize,

    /// Lower bound of the per-task throttle delay
    pub min_delay: Duration,

    /// Upper bound of the per-task throttle delay
    pub max_delay: Duration,

    pub fault_policy: FaultPolicy,

    /// Order rows by candidate name instead of completion order
    pub sort_rows: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(2),
            fault_policy: FaultPolicy::default(),
            sort_rows: false,
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set concurrency (at least one slot is always used).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the throttle range. Bounds are swapped if given backwards.
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min.min(max);
        self.max_delay = max.max(min);
        self
    }

    /// Disable throttling.
    pub fn without_delay(self) -> Self {
        self.with_delay(Duration::ZERO, Duration::ZERO)
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn sort_rows(mut self) -> Self {
        self.sort_rows = true;
        self
    }

    fn throttle(&self) -> Duration {
        let span = self.max_delay.saturating_sub(self.min_delay).as_millis() as u64;
        if span == 0 {
            return self.min_delay;
        }
        self.min_delay + Duration::from_millis(fastrand::u64(0..=span))
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    /// Candidates in the link table
    pub candidates: usize,

    /// Rows in the output table
    pub rows: usize,

    /// Pages fetched and parsed
    pub scraped: usize,

    /// Candidates with no usable link
    pub missing_links: usize,

    pub fetch_failures: usize,
    pub parse_failures: usize,

    /// Tasks that panicked
    pub faulted: usize,

    /// Faulted candidates left out of the table
    pub dropped: usize,

    /// Distinct issue labels in the final schema
    pub issues: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestReport {
    fn new(candidates: usize) -> Self {
        let now = Utc::now();
        Self {
            candidates,
            rows: 0,
            scraped: 0,
            missing_links: 0,
            fetch_failures: 0,
            parse_failures: 0,
            faulted: 0,
            dropped: 0,
            issues: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// True when every candidate's page was scraped.
    pub fn is_complete(&self) -> bool {
        self.scraped == self.candidates
    }
}

/// A finished table plus the run's counters.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub table: Table,
    pub report: HarvestReport,
}

/// How a single candidate's task ended.
#[derive(Debug)]
enum TaskStatus {
    Scraped(Vec<IssueResponse>),
    MissingLink,
    FetchFailed,
    ParseFailed,
}

#[derive(Debug)]
enum TaskMessage {
    Finished { name: String, status: TaskStatus },
    Faulted { name: String },
}

/// What the collector hands back after the barrier.
struct Collected {
    schema: FrozenSchema,
    records: Vec<CandidateRecord>,
    report: HarvestReport,
}

/// Runs the fetch → extract → aggregate pipeline over a link table.
pub struct Harvester<F> {
    fetcher: Arc<F>,
    extractor: Arc<IssueExtractor>,
    config: HarvestConfig,
}

impl<F: PageFetcher + 'static> Harvester<F> {
    pub fn new(fetcher: F, extractor: IssueExtractor, config: HarvestConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            config,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest every candidate and write the table to `output`.
    ///
    /// Nothing is written if the run is cancelled or the write fails; an
    /// existing file at `output` is left as it was.
    pub async fn run(
        &self,
        links: LinkTable,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<HarvestReport> {
        let harvest = self.collect(links, cancel).await?;
        write_table(output, &harvest.table)?;

        info!(
            output = %output.display(),
            rows = harvest.report.rows,
            issues = harvest.report.issues,
            "Harvest written"
        );
        Ok(harvest.report)
    }

    /// Harvest every candidate into an in-memory table.
    pub async fn collect(&self, links: LinkTable, cancel: &CancellationToken) -> Result<Harvest> {
        let total = links.len();
        info!(
            candidates = total,
            concurrency = self.config.concurrency,
            fetcher = self.fetcher.name(),
            "Starting harvest"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(collect_outcomes(rx, total, self.config.fault_policy));

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(total);

        for (name, record) in links {
            let task = CandidateTask {
                record,
                fetcher: Arc::clone(&self.fetcher),
                extractor: Arc::clone(&self.extractor),
                delay: self.config.throttle(),
                cancel: cancel.clone(),
            };
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return;
                };
                if let Some(message) = task.run().await {
                    let _ = tx.send(message);
                }
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                error!(candidate = %name, error = %e, "Candidate task faulted");
                let _ = tx.send(TaskMessage::Faulted { name });
            }
        }

        // Last sender gone: the collector drains and returns.
        drop(tx);
        let collected = collector
            .await
            .map_err(|e| HarvestError::Collector(e.to_string()))?;

        if cancel.is_cancelled() {
            warn!("Harvest cancelled before all candidates finished");
            return Err(HarvestError::Cancelled);
        }

        let Collected {
            schema,
            mut records,
            mut report,
        } = collected;

        if self.config.sort_rows {
            records.sort_by(|a, b| a.name.cmp(&b.name));
        }

        let table = assemble(&schema, records);
        report.rows = table.rows.len();
        report.issues = schema.len();
        report.finished_at = Utc::now();

        info!(
            candidates = report.candidates,
            scraped = report.scraped,
            missing_links = report.missing_links,
            fetch_failures = report.fetch_failures,
            parse_failures = report.parse_failures,
            faulted = report.faulted,
            issues = report.issues,
            "Harvest complete"
        );

        Ok(Harvest { table, report })
    }
}

/// One candidate's unit of work.
struct CandidateTask<F> {
    record: LinkRecord,
    fetcher: Arc<F>,
    extractor: Arc<IssueExtractor>,
    delay: Duration,
    cancel: CancellationToken,
}

impl<F: PageFetcher> CandidateTask<F> {
    /// Scrape, then throttle. Returns `None` if cancelled.
    async fn run(self) -> Option<TaskMessage> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let status = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            status = self.scrape() => status,
        };

        if !self.delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        Some(TaskMessage::Finished {
            name: self.record.name,
            status,
        })
    }

    async fn scrape(&self) -> TaskStatus {
        let name = &self.record.name;
        let Some(url) = self.record.usable_url() else {
            warn!(candidate = %name, "Link missing or invalid");
            return TaskStatus::MissingLink;
        };

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(candidate = %name, url = %url, error = %e, "Failed to fetch candidate page");
                return TaskStatus::FetchFailed;
            }
        };

        match self.extractor.extract(&page) {
            Ok(pairs) => {
                debug!(candidate = %name, issues = pairs.len(), "Extracted issues");
                TaskStatus::Scraped(pairs)
            }
            Err(e) => {
                warn!(candidate = %name, url = %url, error = %e, "Failed to parse candidate page");
                TaskStatus::ParseFailed
            }
        }
    }
}

/// Sole owner of the schema and the record list until the channel closes.
async fn collect_outcomes(
    mut rx: mpsc::UnboundedReceiver<TaskMessage>,
    total: usize,
    fault_policy: FaultPolicy,
) -> Collected {
    let mut schema = SchemaRegistry::new();
    let mut records = Vec::with_capacity(total);
    let mut report = HarvestReport::new(total);
    let mut processed = 0usize;

    while let Some(message) = rx.recv().await {
        processed += 1;
        match message {
            TaskMessage::Finished { name, status } => {
                let record = match status {
                    TaskStatus::Scraped(pairs) => {
                        report.scraped += 1;
                        let record = CandidateRecord::from_pairs(name, pairs);
                        let added = schema.merge(record.labels());
                        if added > 0 {
                            debug!(candidate = %record.name, added, schema_size = schema.len(), "Schema grew");
                        }
                        record
                    }
                    TaskStatus::MissingLink => {
                        report.missing_links += 1;
                        CandidateRecord::empty(name)
                    }
                    TaskStatus::FetchFailed => {
                        report.fetch_failures += 1;
                        CandidateRecord::empty(name)
                    }
                    TaskStatus::ParseFailed => {
                        report.parse_failures += 1;
                        CandidateRecord::empty(name)
                    }
                };

                info!(
                    processed,
                    total,
                    candidate = %record.name,
                    issues = record.responses.len(),
                    "Processed {}/{}: {}",
                    processed,
                    total,
                    record.name
                );
                records.push(record);
            }
            TaskMessage::Faulted { name } => {
                report.faulted += 1;
                match fault_policy {
                    FaultPolicy::Drop => {
                        report.dropped += 1;
                        warn!(processed, total, candidate = %name, "Dropping faulted candidate");
                    }
                    FaultPolicy::SentinelRow => {
                        warn!(processed, total, candidate = %name, "Keeping faulted candidate as sentinel row");
                        records.push(CandidateRecord::empty(name));
                    }
                }
            }
        }
    }

    Collected {
        schema: schema.freeze(),
        records,
        report,
    }
}
