//! Display formatting for raw results.
//!
//! Format codes are a small closed language:
//! - contains `$` -> currency, e.g. `$#,##0.00` renders `-$1,234.50`
//! - contains `%` -> percentage, e.g. `0.0%` renders `5.0%` for 0.05
//! - contains `,` -> thousands grouping, e.g. `#,##0` renders `12,345`
//! - otherwise -> fixed decimals, e.g. `0.000`
//!
//! The decimal count is the longest run of `0` directly after a `.`.
//! Codes using any other characters (`General`, date codes, ...) are not
//! recognized and render like no format at all.

use super::Value;

/// A recognized format code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatCode {
    Currency { decimals: usize, grouped: bool },
    Percent { decimals: usize },
    Grouped { decimals: usize },
    Fixed { decimals: usize },
}

impl FormatCode {
    /// Parse a format code. Returns None for empty or unrecognized codes.
    pub fn parse(code: &str) -> Option<FormatCode> {
        let code = code.trim();
        if code.is_empty()
            || !code
                .chars()
                .all(|c| matches!(c, '0' | '#' | ',' | '.' | '$' | '%' | '-') || c.is_whitespace())
        {
            return None;
        }

        let decimals = decimal_count(code);
        let grouped = code.contains(',');
        Some(if code.contains('$') {
            FormatCode::Currency { decimals, grouped }
        } else if code.contains('%') {
            FormatCode::Percent { decimals }
        } else if grouped {
            FormatCode::Grouped { decimals }
        } else {
            FormatCode::Fixed { decimals }
        })
    }

    pub fn apply(&self, n: f64) -> String {
        if !n.is_finite() {
            return format_number(n);
        }
        match *self {
            FormatCode::Currency { decimals, grouped } => {
                let digits = fixed_abs(n, decimals, grouped);
                format!("{}${}", sign(n, &digits), digits)
            }
            FormatCode::Percent { decimals } => {
                let scaled = n * 100.0;
                let digits = fixed_abs(scaled, decimals, false);
                format!("{}{}%", sign(scaled, &digits), digits)
            }
            FormatCode::Grouped { decimals } => {
                let digits = fixed_abs(n, decimals, true);
                format!("{}{}", sign(n, &digits), digits)
            }
            FormatCode::Fixed { decimals } => {
                let digits = fixed_abs(n, decimals, false);
                format!("{}{}", sign(n, &digits), digits)
            }
        }
    }
}

/// Format a raw value for display under an optional format code.
///
/// Only numbers are affected by the code; text renders as itself, empty as
/// `""`, and errors as their marker.
pub fn format_value(value: &Value, format: Option<&str>) -> String {
    match value {
        Value::Empty => String::new(),
        Value::Text(s) => s.clone(),
        Value::Error(e) => e.marker().to_string(),
        Value::Number(n) => match format.and_then(FormatCode::parse) {
            Some(code) => code.apply(*n),
            None => format_number(*n),
        },
    }
}

/// Plain rendering of a number with no format code.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NUM!".to_string()
    } else if n.is_infinite() {
        "#DIV/0!".to_string()
    } else if n == 0.0 {
        // Avoid rendering negative zero as "-0".
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// Longest run of `0` immediately following a `.`.
fn decimal_count(code: &str) -> usize {
    code.split('.')
        .skip(1)
        .map(|after| after.chars().take_while(|c| *c == '0').count())
        .max()
        .unwrap_or(0)
}

/// `|n|` with a fixed number of decimals, optionally thousands-grouped.
fn fixed_abs(n: f64, decimals: usize, grouped: bool) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    if !grouped {
        return fixed;
    }
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let mut out = group_thousands(int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Leading minus for negatives, unless rounding left nothing but zeros.
fn sign(n: f64, digits: &str) -> &'static str {
    let all_zero = digits.chars().all(|c| matches!(c, '0' | '.' | ','));
    if n < 0.0 && !all_zero { "-" } else { "" }
}
