//! Conversion of stored or displayed values to numbers.
//!
//! The evaluator normally reads raw numbers from its cache. Coercion is the
//! bridge for everything else: literal text typed into a cell ("5%",
//! "$1,000.00"), text returned by functions, and empty cells.

use super::Value;

/// Numeric value of anything a cell can hold; 0 when nothing numeric can be read.
pub fn coerce_to_number(value: &Value) -> f64 {
    try_coerce(value).unwrap_or(0.0)
}

/// Like [`coerce_to_number`] but distinguishes "not a number" (None) from 0.
///
/// Empty cells, error markers, unresolved formulas and unparsable text are None.
pub fn try_coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => coerce_str(s),
        Value::Empty | Value::Error(_) => None,
    }
}

/// Parse a display-style string.
///
/// - `"5%"` -> 0.05
/// - `"$1,000.50"` / `"-$1,000"` / `"1,250"` -> plain decimal
/// - `"42"` -> 42
/// - `"=A1"` (unresolved formula) or anything else -> None
pub fn coerce_str(text: &str) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() || s.starts_with('=') {
        return None;
    }

    if s.contains('%') {
        let stripped = s.replace('%', "");
        return parse_decimal(&strip_symbols(&stripped)).map(|n| n / 100.0);
    }

    if s.contains('$') || s.contains(',') {
        return parse_decimal(&strip_symbols(s));
    }

    parse_decimal(s)
}

fn strip_symbols(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect()
}

/// Decimal parse that refuses the words Rust's float parser accepts ("inf", "NaN").
fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim();
    let digits = s.trim_start_matches(['+', '-']);
    if digits.is_empty()
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}
