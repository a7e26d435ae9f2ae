//! Text-level formula reduction.
//!
//! Formulas are never parsed into a tree. Instead:
//! 1. the innermost function call is located, evaluated by the caller, and its
//!    result spliced back into the text, until no calls remain;
//! 2. the remaining cell references are replaced by numeric literals;
//! 3. the pure-arithmetic string is handed to [`super::Arithmetic`].
//!
//! Double-quoted string literals (backslash escapes) are opaque to every step
//! here. Single quotes delimit sheet names in references, except inside
//! [`split_arguments`], which also honors single-quoted strings.

use regex::Regex;
use std::sync::OnceLock;

use super::cell_ref::reference_token_re;
use super::{FormulaError, Value, parse_cell_ref, parse_range_ref};

/// Reduction passes allowed per byte of formula text.
const PASSES_PER_BYTE: usize = 2;
/// Extra passes for very short formulas.
const MIN_PASSES: usize = 8;

/// A located function call: `name(args)` spanning `start..end` in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub args: String,
    pub start: usize,
    pub end: usize,
}

fn call_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*\(").expect("call regex must compile")
    })
}

/// Split a function's argument text at top-level commas.
///
/// Commas inside nested parentheses or quoted strings do not split.
/// Arguments are trimmed; blank input yields no arguments.
///
/// ```
/// use sheetwise_engine::engine::split_arguments;
/// assert_eq!(split_arguments("MAX(1,2), 3"), vec!["MAX(1,2)", "3"]);
/// ```
pub fn split_arguments(args: &str) -> Vec<String> {
    if args.trim().is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in args.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    out.push(current.trim().to_string());
    out
}

/// Copy of `text` with the contents of string literals blanked out.
///
/// Byte offsets are preserved so matches on the mask index into the original.
fn mask_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in text.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    push_blank(&mut out, ch);
                } else if ch == '\\' {
                    escaped = true;
                    push_blank(&mut out, ch);
                } else if ch == q {
                    quote = None;
                    out.push(ch);
                } else {
                    push_blank(&mut out, ch);
                }
            }
            None => {
                if ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

fn push_blank(out: &mut String, ch: char) {
    for _ in 0..ch.len_utf8() {
        out.push(' ');
    }
}

/// Locate an innermost function call.
///
/// The right-most `name(` in the text cannot contain another call, so it is
/// always innermost. Single quotes are not string delimiters here because
/// they quote sheet names in references.
pub fn find_innermost_call(expression: &str) -> Result<Option<Call>, FormulaError> {
    let masked = mask_strings(expression);
    let Some(open) = call_open_re()
        .find_iter(&masked)
        .filter(|m| !preceded_by_reference_char(&masked, m.start()))
        .last()
    else {
        return Ok(None);
    };

    let args_start = open.end();
    let mut depth = 1usize;
    for (offset, ch) in masked[args_start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = args_start + offset;
                    return Ok(Some(Call {
                        name: expression[open.start()..args_start - 1].to_string(),
                        args: expression[args_start..close].to_string(),
                        start: open.start(),
                        end: close + 1,
                    }));
                }
            }
            _ => {}
        }
    }
    Err(FormulaError::Unbalanced(expression.to_string()))
}

/// A name glued to a number, `$`, `!` or a quote is not a call (`1e5(`, `Sheet!A(`).
fn preceded_by_reference_char(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '!' | '\'' | '.' | '_'))
}

/// Maximum reduction passes for an expression.
pub fn pass_limit(expression: &str) -> usize {
    expression.len() * PASSES_PER_BYTE + MIN_PASSES
}

/// Repeatedly reduce innermost function calls.
///
/// `call` receives the function name and its raw argument text and returns
/// the call's value. Numbers are spliced back as parenthesized literals so a
/// negative result keeps its sign next to a unary or binary minus; text is
/// spliced back as a double-quoted string literal. An expression without
/// calls is returned unchanged.
pub fn reduce_embedded_calls<F>(expression: &str, mut call: F) -> Result<String, FormulaError>
where
    F: FnMut(&str, &str) -> Result<Value, FormulaError>,
{
    let limit = pass_limit(expression);
    let mut current = expression.to_string();

    for _ in 0..limit {
        let Some(found) = find_innermost_call(&current)? else {
            return Ok(current);
        };
        tracing::trace!(function = %found.name, args = %found.args, "reducing call");
        let replacement = match call(&found.name, &found.args)? {
            Value::Number(n) => number_literal(n),
            Value::Empty => number_literal(0.0),
            Value::Text(s) => string_literal(&s),
            Value::Error(e) => return Err(FormulaError::Cell(e)),
        };
        current.replace_range(found.start..found.end, &replacement);
    }

    Err(FormulaError::TooManyPasses(limit))
}

/// Byte spans of every cell or range reference outside string literals.
fn reference_spans(expression: &str) -> Vec<(usize, usize)> {
    let masked = mask_strings(expression);
    reference_token_re()
        .find_iter(&masked)
        .filter(|m| is_standalone(&masked, m.start(), m.end()))
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Every cell or range reference outside string literals, as written.
pub fn reference_tokens(expression: &str) -> Vec<&str> {
    reference_spans(expression)
        .into_iter()
        .map(|(start, end)| &expression[start..end])
        .collect()
}

/// Replace every cell or range reference outside string literals.
///
/// `resolve` receives the reference text exactly as written (including `$`
/// markers and sheet qualifiers) and returns its replacement.
pub fn substitute_references<F>(expression: &str, mut resolve: F) -> Result<String, FormulaError>
where
    F: FnMut(&str) -> Result<String, FormulaError>,
{
    let mut out = String::with_capacity(expression.len());
    let mut last = 0usize;

    for (start, end) in reference_spans(expression) {
        out.push_str(&expression[last..start]);
        out.push_str(&resolve(&expression[start..end])?);
        last = end;
    }
    out.push_str(&expression[last..]);
    Ok(out)
}

/// Token boundaries: not glued to identifier characters on either side.
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let glued = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$';
    !before.is_some_and(glued) && !after.is_some_and(|c| glued(c) || c == '(')
}

/// True when the whole expression is one reference such as `B1` or `Data!$C$3`.
pub fn as_single_reference(expression: &str) -> bool {
    parse_cell_ref(expression).is_some()
}

/// True when the whole expression is one range such as `A1:B4`.
pub fn as_single_range(expression: &str) -> bool {
    parse_range_ref(expression).is_some()
}

/// The unescaped contents when the whole expression is one string literal.
pub fn as_string_literal(expression: &str) -> Option<String> {
    let s = expression.trim();
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if s.len() < 2 || !s.ends_with(quote) {
        return None;
    }
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            out.push(chars.next()?);
        } else if ch == quote {
            // An unescaped quote in the middle means this is not one literal.
            return None;
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

/// Float literal for splicing into arithmetic, parenthesized.
pub fn number_literal(n: f64) -> String {
    let n = if n == 0.0 { 0.0 } else { n };
    let mut text = n.to_string();
    if !text.contains('.') && n.is_finite() {
        text.push_str(".0");
    }
    format!("({})", text)
}

/// Double-quoted string literal with `\` and `"` escaped.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
