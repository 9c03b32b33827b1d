use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use stance_harvest::{fetcher, DEFAULT_CONCURRENCY};

/// Harvest settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub timeout: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            concurrency: env::var("HARVEST_CONCURRENCY")
                .unwrap_or_else(|_| DEFAULT_CONCURRENCY.to_string())
                .parse()
                .context("HARVEST_CONCURRENCY must be a valid number")?,
            timeout: Duration::from_secs(
                env::var("HARVEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| fetcher::DEFAULT_TIMEOUT.as_secs().to_string())
                    .parse()
                    .context("HARVEST_TIMEOUT_SECS must be a valid number")?,
            ),
            min_delay: Duration::from_millis(
                env::var("HARVEST_MIN_DELAY_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .context("HARVEST_MIN_DELAY_MS must be a valid number")?,
            ),
            max_delay: Duration::from_millis(
                env::var("HARVEST_MAX_DELAY_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .context("HARVEST_MAX_DELAY_MS must be a valid number")?,
            ),
            user_agent: env::var("HARVEST_USER_AGENT")
                .unwrap_or_else(|_| fetcher::DEFAULT_USER_AGENT.to_string()),
        })
    }
}
