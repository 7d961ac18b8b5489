use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{error, info, warn};

use crate::models::{Listing, NewListing};

/// Directory holding the database file of a `sqlite:` url, if it has one
fn database_dir(db_url: &str) -> Option<&Path> {
    let path = db_url.strip_prefix("sqlite:")?.trim_start_matches("//");
    let path = path.split('?').next()?;
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Result of an insert that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The url was already stored before the insert was attempted
    AlreadyExists,
    /// The existence check passed but the unique constraint rejected the row
    Conflict,
}

/// Record store backed by a single-connection SQLite pool.
///
/// One connection keeps writes serialized and lets `sqlite::memory:` behave
/// as one database rather than one per pooled connection.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!(db_url, "Creating database file");
            if let Some(parent) = database_dir(db_url) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            Sqlite::create_database(db_url)
                .await
                .with_context(|| format!("Failed to create database at {db_url}"))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(db_url)
            .await
            .with_context(|| format!("Failed to open database at {db_url}"))?;

        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    pub async fn listing_exists(&self, url: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM market_listings WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up listing by url")?;

        Ok(count > 0)
    }

    /// Insert a listing unless its url is already stored.
    ///
    /// Returns the new row id, or `None` when nothing was inserted. A lost
    /// race on the unique url constraint is reported like an existing
    /// listing; any other storage failure is logged as an error.
    pub async fn create_listing(&self, listing: &NewListing) -> Option<i64> {
        match self.insert_listing(listing).await {
            Ok(InsertOutcome::Inserted(id)) => Some(id),
            Ok(InsertOutcome::AlreadyExists) => {
                info!(url = %listing.url, "Listing already exists, skipping insert");
                None
            }
            Ok(InsertOutcome::Conflict) => {
                warn!(url = %listing.url, "Unique constraint hit while inserting listing");
                None
            }
            Err(e) => {
                error!(url = %listing.url, "Unexpected error while inserting listing: {:#}", e);
                None
            }
        }
    }

    /// Insert without logging, classifying why nothing was inserted
    pub async fn insert_listing(&self, listing: &NewListing) -> Result<InsertOutcome> {
        if self.listing_exists(&listing.url).await? {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let result = sqlx::query(
            r"
            INSERT INTO market_listings (title, mileage, price, location, url, image)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&listing.title)
        .bind(&listing.mileage)
        .bind(&listing.price)
        .bind(&listing.location)
        .bind(&listing.url)
        .bind(&listing.image)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(e).context("Failed to insert listing"),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(
            r"
            SELECT id, title, mileage, price, location, url, image, created_at
            FROM market_listings
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load listings")?;

        Ok(listings)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM market_listings")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count listings")?;

        Ok(count)
    }

    /// Close the pool, waiting for the connection to be released
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
