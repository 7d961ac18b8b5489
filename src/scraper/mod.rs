//! Listing fetcher backed by a remote page-rendering service.
//!
//! The marketplace only serves listings to a real browser, so the search page
//! is requested through a scraping API that returns the rendered HTML inside
//! a JSON envelope. Any failure along the way degrades to "no listings this
//! cycle"; the next scheduled cycle is the retry.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{Fragment, RenderRequest, RenderResponse};
use crate::traits::{ListingSource, SiteConfig};

/// Why a fetch produced no fragments
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to render service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("render service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("render service returned an unreadable envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("render service returned no results")]
    NoResults,

    #[error("first result has no rendered content")]
    NoContent,
}

pub struct Scraper {
    client: Client,
    api_url: String,
    api_key: String,
    site: SiteConfig,
    card_selector: Selector,
}

impl Scraper {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration, site: SiteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let card_selector = Selector::parse(&site.selectors.listing_card)
            .map_err(|e| anyhow!("Failed to parse listing card selector: {:?}", e))?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            site,
            card_selector,
        })
    }

    /// Request a rendered snapshot of the search page and return its HTML
    async fn render(&self, location: &str, query: &str) -> Result<String, FetchError> {
        let request = RenderRequest {
            target: "universal".to_string(),
            locale: "en-US".to_string(),
            device_type: "desktop".to_string(),
            headless: "html".to_string(),
            url: self.site.build_search_url(location, query),
        };
        debug!(url = %request.url, "Requesting rendered search page");

        let response = self
            .client
            .post(&self.api_url)
            .header("accept", "application/json")
            .header("authorization", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        classify(status, &body)
    }

    /// Locate every listing card in a rendered page
    pub fn locate_fragments(&self, html: &str) -> Vec<Fragment> {
        let document = Html::parse_document(html);
        document
            .select(&self.card_selector)
            .map(|card| Fragment::new(card.html()))
            .collect()
    }
}

/// Turn a render-service response into the rendered page, or the reason there is none
pub fn classify(status: StatusCode, body: &str) -> Result<String, FetchError> {
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    parse_envelope(body)
}

/// Pull the first result's rendered content out of the service envelope.
///
/// A `null` body is treated like an envelope without results.
pub fn parse_envelope(body: &str) -> Result<String, FetchError> {
    let envelope: Option<RenderResponse> = serde_json::from_str(body)?;
    let first = envelope
        .unwrap_or_default()
        .results
        .into_iter()
        .next()
        .ok_or(FetchError::NoResults)?;

    first
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or(FetchError::NoContent)
}

#[async_trait]
impl ListingSource for Scraper {
    async fn fetch(&self, location: &str, query: &str) -> Vec<Fragment> {
        if location.trim().is_empty() || query.trim().is_empty() {
            warn!(location, query, "Location and query are both required, skipping fetch");
            return Vec::new();
        }

        info!("Scraping {} for '{}' on {}", location, query, self.site.name);

        let html = match self.render(location, query).await {
            Ok(html) => html,
            Err(FetchError::NoResults | FetchError::NoContent) => {
                info!(location, query, "No results found in the response");
                return Vec::new();
            }
            Err(e @ FetchError::Envelope(_)) => {
                error!(location, query, "Error decoding render response: {}", e);
                return Vec::new();
            }
            Err(e) => {
                error!(location, query, "Error while scraping: {}", e);
                return Vec::new();
            }
        };

        let fragments = self.locate_fragments(&html);
        if fragments.is_empty() {
            info!(location, query, "No listings found in the rendered page");
        } else {
            info!(location, query, count = fragments.len(), "Found listings");
        }

        fragments
    }
}
