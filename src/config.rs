//! Environment-driven configuration.
//!
//! Values come from the process environment, after `dotenvy` has merged in a
//! `.env` file if one exists. Only `SCRAPER_API_KEY` is mandatory.

use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const DEFAULT_API_URL: &str = "https://scraper-api.smartproxy.com/v2/scrape";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:database/market_listings.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub location: String,
    pub query: String,
    pub poll_interval: Duration,
    pub run_duration: Duration,
    pub database_url: String,
    pub request_timeout: Duration,
    pub log_blank_fragments: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(raw) => {
                    let secs: u64 = raw
                        .trim()
                        .parse()
                        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(Duration::from_secs(default)),
            }
        };

        let api_key = get("SCRAPER_API_KEY", "");
        if api_key.is_empty() {
            bail!("SCRAPER_API_KEY must be set");
        }

        let location = get("MARKET_LOCATION", "toronto").to_lowercase();
        let query = get("MARKET_QUERY", "bmw");

        let poll_interval = secs("POLL_INTERVAL_SECS", 300)?;
        if poll_interval.is_zero() {
            bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        let log_blank_fragments = match get("LOG_BLANK_FRAGMENTS", "false").to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => bail!("LOG_BLANK_FRAGMENTS must be true or false, got '{other}'"),
        };

        Ok(Self {
            api_url: get("SCRAPER_API_URL", DEFAULT_API_URL),
            api_key,
            location,
            query,
            poll_interval,
            run_duration: secs("RUN_DURATION_SECS", 3600)?,
            database_url: get("DATABASE_URL", DEFAULT_DATABASE_URL),
            request_timeout: secs("REQUEST_TIMEOUT_SECS", 60)?,
            log_blank_fragments,
        })
    }
}
