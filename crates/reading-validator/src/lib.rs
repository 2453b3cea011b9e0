//! Reading Input Validation
//!
//! Turns loosely typed request input into typed readings and zip queries.

mod coerce;
mod error;
mod validator;

pub use coerce::coerce_number;
pub use error::ValidationError;
pub use validator::{ReadingValidator, ValidReading, ValidationConfig, ZipQuery};
