//! SQL DDL applied on every connect.

/// Readings are append-only; `air_quality` stays nullable so rows written by
/// other tools without a value still aggregate (as zero).
pub const SQLITE_INIT: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS readings (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        zip         INTEGER NOT NULL,
        air_quality REAL
    )",
    "CREATE INDEX IF NOT EXISTS idx_readings_zip ON readings (zip)",
];
