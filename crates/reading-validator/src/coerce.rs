//! Loose numeric coercion of JSON values

use serde_json::Value;

/// Coerce a JSON value to a finite number.
///
/// Numbers pass through. Strings are trimmed; an empty string is 0, anything
/// else must parse as a decimal or `0x`/`0o`/`0b` literal. Booleans are 1 and 0, `null` is 0.
/// Arrays, objects and non-finite results yield `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => coerce_str(s)?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };

    number.is_finite().then_some(number)
}

/// String half of [`coerce_number`]; only finite results count.
pub(crate) fn coerce_str(raw: &str) -> Option<f64> {
    parse_numeric_str(raw).filter(|n| n.is_finite())
}

/// Parse a numeric string the way a loose `Number(...)` conversion does.
///
/// Accepts decimal literals (which may overflow to infinity), signed
/// `Infinity`, and unsigned `0x`/`0o`/`0b` integers. The empty string is 0.
/// `None` means "not a number".
pub(crate) fn parse_numeric_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    let prefixed = trimmed.get(..2).map(str::to_ascii_lowercase);
    let radix = match prefixed.as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix(&trimmed[2..], radix);
    }

    // f64's parser also takes "inf" and "nan"; only plain decimal literals count
    let is_decimal = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'));
    if !is_decimal {
        return None;
    }

    trimmed.parse::<f64>().ok()
}

fn parse_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    })
}
