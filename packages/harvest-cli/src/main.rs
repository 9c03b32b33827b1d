//! Command-line entry point for stance harvesting.
//!
//! Reports are printed to stdout as JSON; logs go to stderr.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use stance_harvest::{
    rank_candidates, read_links, repair_links, resolve_roster, FaultPolicy, HarvestConfig,
    Harvester, HttpFetcher, IssueExtractor, PageLayout, PairingMode, Preference, ResolvePacing,
    SearchResolver,
};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Scrape candidate issue stances into a single CSV table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every candidate in a link table
    Scrape {
        #[arg(long, default_value = "legislators_links.csv")]
        links: PathBuf,
        #[arg(long, default_value = "political_stance.csv")]
        out: PathBuf,
        /// Overrides HARVEST_CONCURRENCY
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        min_delay_ms: Option<u64>,
        #[arg(long)]
        max_delay_ms: Option<u64>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Write rows sorted by name instead of completion order
        #[arg(long)]
        sort_rows: bool,
        /// Keep candidates whose task panicked as all-sentinel rows
        #[arg(long)]
        keep_faulted: bool,
        /// Pair extra issues with the sentinel instead of dropping them
        #[arg(long)]
        pad_responses: bool,
    },

    /// Look up a link for every name in a roster
    Resolve {
        #[arg(long, default_value = "legislators.csv")]
        roster: PathBuf,
        #[arg(long, default_value = "legislators_links.csv")]
        out: PathBuf,
    },

    /// Fill in missing links in an existing link table
    Repair {
        #[arg(long, default_value = "legislators_links.csv")]
        links: PathBuf,
    },

    /// Rank candidates by distance to your own coded answers
    Rank {
        /// Table with numerically coded responses
        #[arg(long)]
        table: PathBuf,
        /// JSON file of [value, weight] pairs, one per issue column
        #[arg(long)]
        preferences: PathBuf,
        #[arg(short, default_value_t = 10)]
        k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stance_harvest=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Scrape {
            links,
            out,
            concurrency,
            min_delay_ms,
            max_delay_ms,
            timeout_secs,
            sort_rows,
            keep_faulted,
            pad_responses,
        } => {
            let timeout = timeout_secs.map(Duration::from_secs).unwrap_or(config.timeout);
            let fetcher = HttpFetcher::with_settings(timeout, &config.user_agent)
                .context("Failed to build HTTP client")?;

            let mut layout = PageLayout::default();
            if pad_responses {
                layout = layout.with_pairing(PairingMode::PadResponses);
            }

            let mut harvest_config = HarvestConfig::new()
                .with_concurrency(concurrency.unwrap_or(config.concurrency))
                .with_delay(
                    min_delay_ms.map(Duration::from_millis).unwrap_or(config.min_delay),
                    max_delay_ms.map(Duration::from_millis).unwrap_or(config.max_delay),
                );
            if sort_rows {
                harvest_config = harvest_config.sort_rows();
            }
            if keep_faulted {
                harvest_config = harvest_config.with_fault_policy(FaultPolicy::SentinelRow);
            }

            let table = read_links(&links)
                .with_context(|| format!("Failed to read link table {}", links.display()))?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling harvest");
                    on_interrupt.cancel();
                }
            });

            let harvester = Harvester::new(fetcher, IssueExtractor::new(layout), harvest_config);
            let report = harvester.run(table, &out, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Resolve { roster, out } => {
            let resolver = SearchResolver::new().context("Failed to build HTTP client")?;
            let report = resolve_roster(&roster, &out, &resolver, &ResolvePacing::default()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Repair { links } => {
            let resolver = SearchResolver::new().context("Failed to build HTTP client")?;
            let report = repair_links(&links, &resolver, &ResolvePacing::default()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Rank {
            table,
            preferences,
            k,
        } => {
            let raw = std::fs::read_to_string(&preferences)
                .with_context(|| format!("Failed to read {}", preferences.display()))?;
            let preferences: Vec<Preference> =
                serde_json::from_str(&raw).context("Preferences must be a list of [value, weight] pairs")?;

            let ranked = rank_candidates(&table, &preferences, k)?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
    }

    Ok(())
}
