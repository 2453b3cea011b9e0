//! Repository Implementation

use crate::schema::SQLITE_INIT;
use crate::StorageError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

/// A reading to be recorded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub zip: i64,
    pub air_quality: f64,
}

/// A persisted reading row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredReading {
    pub id: i64,
    pub zip: i64,
    pub air_quality: Option<f64>,
}

/// Projection used for aggregation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AirQualitySample {
    pub air_quality: Option<f64>,
}

/// Repository for readings, backed by a SQLite pool
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Connect to the database named by `url` and apply the schema.
    ///
    /// The database file is created when missing.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        if !url.starts_with("sqlite:") {
            return Err(StorageError::InvalidUrl {
                url: url.to_string(),
                reason: "expected a sqlite: URL".to_string(),
            });
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repository = Self { pool };
        repository.migrate().await?;

        info!("Connected to database at {}", url);
        Ok(repository)
    }

    /// Create a private in-memory database.
    ///
    /// Each SQLite memory connection is its own database, so the pool holds
    /// exactly one connection and never recycles it.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let repository = Self { pool };
        repository.migrate().await?;

        debug!("Created in-memory repository");
        Ok(repository)
    }

    /// Apply the schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SQLITE_INIT {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a reading, returning its row id
    pub async fn insert(&self, reading: &Reading) -> Result<i64, StorageError> {
        let result = sqlx::query("INSERT INTO readings (zip, air_quality) VALUES (?1, ?2)")
            .bind(reading.zip)
            .bind(reading.air_quality)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted reading {} for zip {}", id, reading.zip);
        Ok(id)
    }

    /// Air-quality values of every reading for `zip`, oldest first
    pub async fn find_by_zip(&self, zip: i64) -> Result<Vec<AirQualitySample>, StorageError> {
        let samples = sqlx::query_as::<_, AirQualitySample>(
            "SELECT air_quality FROM readings WHERE zip = ?1 ORDER BY id",
        )
        .bind(zip)
        .fetch_all(&self.pool)
        .await?;

        Ok(samples)
    }

    /// Full rows for `zip`, oldest first
    pub async fn readings_for_zip(&self, zip: i64) -> Result<Vec<StoredReading>, StorageError> {
        let rows = sqlx::query_as::<_, StoredReading>(
            "SELECT id, zip, air_quality FROM readings WHERE zip = ?1 ORDER BY id",
        )
        .bind(zip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Total number of readings
    pub async fn count(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool. Subsequent calls fail.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
