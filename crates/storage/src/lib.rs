//! Storage Layer
//!
//! Persists air-quality readings in SQLite behind a repository.

mod repository;
mod schema;

pub use repository::{AirQualitySample, Reading, Repository, StoredReading};
pub use schema::SQLITE_INIT;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid database URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
