use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::database::Database;
use crate::extractor::Extractor;
use crate::models::Fragment;
use crate::scheduler::Cycle;
use crate::traits::ListingSource;
use crate::validator::Validator;

/// Counts produced by one ingestion cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fragments: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub inserted: usize,
    pub failed: usize,
}

enum FragmentOutcome {
    Inserted(i64),
    Invalid,
    Duplicate,
    NotStored,
}

/// One fetch → extract → validate → dedup → insert pass for a fixed search
pub struct ListingFinder {
    source: Box<dyn ListingSource>,
    extractor: Extractor,
    validator: Validator,
    database: Database,
    location: String,
    query: String,
}

impl ListingFinder {
    pub fn new(
        source: Box<dyn ListingSource>,
        extractor: Extractor,
        validator: Validator,
        database: Database,
        location: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            source,
            extractor,
            validator,
            database,
            location: location.into(),
            query: query.into(),
        }
    }

    /// Run one cycle and return how many listings were newly stored
    pub async fn run_once(&self) -> usize {
        self.check_for_new_listings().await.inserted
    }

    pub async fn check_for_new_listings(&self) -> CycleReport {
        let fragments = self.source.fetch(&self.location, &self.query).await;

        let mut report = CycleReport {
            fragments: fragments.len(),
            ..CycleReport::default()
        };

        if fragments.is_empty() {
            info!("No listings found to process");
            return report;
        }

        for (index, fragment) in fragments.iter().enumerate() {
            match self.process_fragment(fragment).await {
                Ok(FragmentOutcome::Inserted(id)) => {
                    debug!(id, "Uploaded listing to database");
                    report.inserted += 1;
                }
                Ok(FragmentOutcome::Invalid) => report.invalid += 1,
                Ok(FragmentOutcome::Duplicate) => report.duplicates += 1,
                Ok(FragmentOutcome::NotStored) => report.failed += 1,
                Err(e) => {
                    error!(index, "Error processing listing: {:#}", e);
                    report.failed += 1;
                }
            }
        }

        if report.inserted > 0 {
            info!(
                fragments = report.fragments,
                invalid = report.invalid,
                duplicates = report.duplicates,
                failed = report.failed,
                "Found {} new listings",
                report.inserted
            );
        } else {
            info!(
                fragments = report.fragments,
                invalid = report.invalid,
                duplicates = report.duplicates,
                failed = report.failed,
                "No new listings found"
            );
        }

        report
    }

    async fn process_fragment(&self, fragment: &Fragment) -> Result<FragmentOutcome> {
        let record = self.extractor.extract(fragment)?;

        let Some(listing) = self.validator.validate(record) else {
            return Ok(FragmentOutcome::Invalid);
        };

        if self.database.listing_exists(&listing.url).await? {
            info!(url = %listing.url, "Listing already exists, skipping");
            return Ok(FragmentOutcome::Duplicate);
        }

        info!("New listing found: {} - {}", listing.title, listing.price);

        Ok(match self.database.create_listing(&listing).await {
            Some(id) => FragmentOutcome::Inserted(id),
            None => FragmentOutcome::NotStored,
        })
    }
}

#[async_trait]
impl Cycle for ListingFinder {
    async fn run_cycle(&self) -> Result<usize> {
        Ok(self.run_once().await)
    }
}
