use regex::Regex;
use rhai::{Engine, FLOAT};
use std::sync::OnceLock;

use super::FormulaError;

fn whitelist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9+\-*/().\s]+$").expect("arithmetic whitelist regex must compile")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[0-9]+(?:\.[0-9]*)?|\.[0-9]+").expect("number literal regex must compile")
    })
}

/// Evaluates fully substituted formula text (numbers and `+ - * / ^ ( )` only)
/// with an embedded Rhai engine.
pub struct Arithmetic {
    engine: Engine,
}

impl Arithmetic {
    /// Create a Rhai engine limited to expression evaluation.
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(256, 0);
        Arithmetic { engine }
    }

    /// Evaluate an arithmetic expression.
    ///
    /// `^` is exponentiation. Anything besides digits, `.`, whitespace and
    /// `+ - * / ( )` is rejected before Rhai sees the text. Every numeric
    /// literal is evaluated as a float, so `1/2` is `0.5`.
    pub fn evaluate(&self, expression: &str) -> Result<f64, FormulaError> {
        let rewritten = expression.replace('^', "**");
        if !whitelist_re().is_match(&rewritten) {
            return Err(FormulaError::Disallowed(expression.trim().to_string()));
        }
        let normalized = float_literals(&rewritten);
        self.engine
            .eval_expression::<FLOAT>(&normalized)
            .map_err(|e| FormulaError::Arithmetic(e.to_string()))
    }
}

impl Default for Arithmetic {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite every integer or decimal literal as a float literal (`12` -> `12.0`, `.5` -> `0.5`).
fn float_literals(expression: &str) -> String {
    number_re()
        .replace_all(expression, |caps: &regex::Captures| {
            let text = &caps[0];
            match text.parse::<f64>() {
                Ok(n) => {
                    let mut out = n.to_string();
                    if !out.contains('.') {
                        out.push_str(".0");
                    }
                    out
                }
                Err(_) => text.to_string(),
            }
        })
        .to_string()
}
