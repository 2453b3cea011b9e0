//! Average air quality over a zip's readings

use rust_decimal::prelude::*;
use storage::AirQualitySample;

/// Mean air quality, or `None` when there are no samples.
///
/// A sample without a value (or a NaN) contributes 0 to the sum but still
/// counts toward the divisor.
pub fn mean_air_quality(samples: &[AirQualitySample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let sum: f64 = samples
        .iter()
        .map(|s| s.air_quality.filter(|v| !v.is_nan()).unwrap_or(0.0))
        .sum();

    Some(sum / samples.len() as f64)
}

/// Format with exactly two decimals, rounding half away from zero on the
/// exact binary value (so 0.125 gives "0.13" but 1.005 gives "1.00").
///
/// Follows `toFixed(2)` at the edges: a negative value that rounds to zero
/// keeps its sign ("-0.00"), negative zero does not, and magnitudes of 1e21
/// and beyond (or non-finite values) use the shortest number form ("1e+21").
pub fn format_two_decimals(value: f64) -> String {
    if !value.is_finite() || value.abs() >= 1e21 {
        return shortest_number_form(value);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    match Decimal::from_f64_retain(magnitude) {
        Some(exact) => {
            let rounded = exact.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            format!("{sign}{:.2}", rounded)
        }
        None => format!("{sign}{:.2}", magnitude),
    }
}

fn shortest_number_form(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    // `{:e}` prints the shortest round-trip mantissa; only the exponent sign differs
    let formatted = format!("{:e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
        _ => formatted,
    }
}
