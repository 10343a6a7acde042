//! Never-failing coercion of loosely typed values into integers.
//!
//! Generation output is free to emit `"1,200,000"`, `1200000`, `1.2e6` or
//! `"unknown"` for the same field. [`coerce_int`] maps all of these onto
//! `Option<i64>`, where `None` means "unknown" and is distinct from zero.

use serde_json::Value;

/// Coerce an arbitrary JSON value into an integer, or `None`.
///
/// - `null`, booleans, arrays and objects yield `None`.
/// - Integers pass through; finite floats truncate toward zero.
/// - Strings are trimmed, `,` thousands separators are removed, and the
///   remainder is parsed as an integer, then as a finite float.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_int)),
        Value::String(s) => coerce_str(s),
        _ => None,
    }
}

/// Coerce an optional value; absent input yields `None`.
pub fn coerce_opt(value: Option<&Value>) -> Option<i64> {
    value.and_then(coerce_int)
}

fn coerce_str(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    cleaned.parse::<f64>().ok().and_then(float_to_int)
}

fn float_to_int(f: f64) -> Option<i64> {
    // `as` saturates; reject values outside i64 instead of clamping them.
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}
