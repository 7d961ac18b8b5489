//! Data models for marketplace listings and render-service payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing persisted in the `market_listings` table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub mileage: Option<String>,
    pub price: String,
    pub location: String,
    pub url: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A validated listing that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub title: String,
    pub mileage: Option<String>,
    pub price: String,
    pub location: String,
    pub url: String,
    pub image: Option<String>,
}

/// Fields extracted from one fragment, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub title: Option<String>,
    pub price: Option<String>,
    pub mileage: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

/// Markup of a single listing card, as located in the rendered results page.
///
/// Kept as an owned string rather than a parsed node so it can be held across
/// await points (`scraper::Html` is not `Send`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
}

impl Fragment {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

/// Request body for the remote render service
#[derive(Debug, Serialize)]
pub struct RenderRequest {
    pub target: String,
    pub locale: String,
    pub device_type: String,
    pub headless: String,
    pub url: String,
}

/// Envelope returned by the remote render service
#[derive(Debug, Default, Deserialize)]
pub struct RenderResponse {
    #[serde(default)]
    pub results: Vec<RenderResult>,
}

/// A single page render inside the envelope
#[derive(Debug, Default, Deserialize)]
pub struct RenderResult {
    #[serde(default)]
    pub content: Option<String>,
}
