//! Register payload and zip query validation

use crate::coerce::{coerce_number, parse_numeric_str};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Payload key carrying the zip code
pub const ZIP_FIELD: &str = "zip";
/// Payload key carrying the air-quality value
pub const AIR_QUALITY_FIELD: &str = "airQuality";

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Inclusive range accepted for air quality; unbounded when unset
    pub air_quality_range: Option<(f64, f64)>,
}

/// A register payload that passed validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidReading {
    pub zip: i64,
    pub air_quality: f64,
}

/// Parsed zip from a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipQuery {
    /// An integral zip that may exist in storage
    Exact(i64),
    /// Numeric, but no stored (integral) zip can equal it
    Unmatchable,
}

/// Validator for reading input
#[derive(Debug, Clone, Default)]
pub struct ReadingValidator {
    config: ValidationConfig,
}

impl ReadingValidator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a register payload.
    ///
    /// Both keys must be present; a JSON `null` counts as present.
    pub fn validate_register(&self, payload: &Map<String, Value>) -> Result<ValidReading, ValidationError> {
        let (Some(zip), Some(air_quality)) = (payload.get(ZIP_FIELD), payload.get(AIR_QUALITY_FIELD)) else {
            return Err(ValidationError::MissingFields);
        };

        let zip = coerce_number(zip)
            .and_then(integral)
            .ok_or(ValidationError::NotNumeric { field: ZIP_FIELD })?;
        let air_quality = coerce_number(air_quality).ok_or(ValidationError::NotNumeric {
            field: AIR_QUALITY_FIELD,
        })?;

        if let Some(range) = self.config.air_quality_range {
            self.validate_range(AIR_QUALITY_FIELD, air_quality, range)?;
        }

        debug!(zip, air_quality, "Register payload accepted");
        Ok(ValidReading { zip, air_quality })
    }

    /// Parse the `zip` query parameter of a status request
    pub fn parse_zip_query(&self, raw: Option<&str>) -> Result<ZipQuery, ValidationError> {
        let raw = raw.filter(|s| !s.is_empty()).ok_or(ValidationError::ZipRequired)?;
        // Overflowing or infinite input is still numeric; it just cannot match
        let number = parse_numeric_str(raw).ok_or(ValidationError::ZipRequired)?;

        Ok(integral(number).map_or(ZipQuery::Unmatchable, ZipQuery::Exact))
    }

    /// Validate a single value against an inclusive range
    pub fn validate_range(
        &self,
        field: &'static str,
        value: f64,
        range: (f64, f64),
    ) -> Result<(), ValidationError> {
        if value < range.0 || value > range.1 {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min: range.0,
                max: range.1,
            })
        } else {
            Ok(())
        }
    }
}

fn integral(n: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}
