use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod database;
mod extractor;
mod listing_finder;
mod models;
mod scheduler;
mod scraper;
mod traits;
mod validator;

use crate::config::Config;
use crate::database::Database;
use crate::extractor::Extractor;
use crate::listing_finder::ListingFinder;
use crate::scheduler::Scheduler;
use crate::scraper::Scraper;
use crate::traits::SiteConfig;
use crate::validator::Validator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Marketplace Watcher");

    let config = Config::from_env()?;
    let site = SiteConfig::facebook_marketplace();

    let database = Database::new(&config.database_url).await?;
    info!(existing_listings = database.count().await?, "Database ready");
    let scraper = Scraper::new(
        &config.api_url,
        &config.api_key,
        config.request_timeout,
        site.clone(),
    )?;

    let finder = Arc::new(ListingFinder::new(
        Box::new(scraper),
        Extractor::new(site)?,
        Validator::new(config.log_blank_fragments),
        database.clone(),
        config.location.clone(),
        config.query.clone(),
    ));

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping after the current cycle");
            ctrl_c.cancel();
        }
    });

    info!(
        location = %config.location,
        query = %config.query,
        "Scheduler started - checking every {}s for {}s",
        config.poll_interval.as_secs(),
        config.run_duration.as_secs()
    );

    let mut scheduler = Scheduler::new(config.poll_interval, config.run_duration);
    let summary = scheduler.run(finder, shutdown).await;

    info!(
        state = ?scheduler.state(),
        cancelled = summary.cancelled,
        new_listings = summary.inserted,
        "Run complete"
    );

    match database.list_all().await {
        Ok(listings) => {
            for listing in &listings {
                debug!(
                    id = listing.id,
                    created_at = %listing.created_at,
                    "{} - {} ({})",
                    listing.title,
                    listing.price,
                    listing.url
                );
            }
            info!(total_listings = listings.len(), "Listings stored so far");
        }
        Err(e) => error!("Failed to load stored listings: {:#}", e),
    }

    database.close().await;
    Ok(())
}
