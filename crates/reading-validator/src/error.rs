//! Validation Error Types

use thiserror::Error;

/// Errors during input validation
///
/// The display text of each variant is what callers see in the response body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// `zip` or `airQuality` absent from the payload
    #[error("zip and airQuality are required.")]
    MissingFields,

    /// A field was present but is not a usable number
    #[error("zip and airQuality must be numeric.")]
    NotNumeric { field: &'static str },

    /// Status query without a numeric zip
    #[error("a zip code is required.")]
    ZipRequired,

    /// Value outside the configured range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
