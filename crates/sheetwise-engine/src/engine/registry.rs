//! Function registry: the contract between the evaluator and function libraries.
//!
//! The engine itself defines no functions. Libraries register handlers by
//! name; lookups are case-insensitive (names are stored upper-cased).
//!
//! A handler receives its raw argument strings (already split at top-level
//! commas and trimmed, with nested calls already reduced) and an
//! [`EvalContext`] for resolving them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{FormulaError, Value, coerce_to_number};

/// What a function handler may ask of the evaluator.
pub trait EvalContext {
    /// Raw numeric value of a single cell reference (`A1`, `$B$2`, `Sheet!C3`).
    /// Unparseable references resolve to 0.
    fn resolve_cell(&mut self, reference: &str) -> f64;

    /// Numeric values of a range in row-major order. Cells that do not coerce
    /// to a number (empty, text) are skipped; malformed ranges yield nothing.
    fn resolve_range(&mut self, range: &str) -> Vec<f64>;

    /// Evaluate an arbitrary formula fragment (no leading `=`).
    fn evaluate(&mut self, expression: &str) -> Result<Value, FormulaError>;

    /// Evaluate a fragment and coerce the result to a number.
    fn evaluate_number(&mut self, expression: &str) -> Result<f64, FormulaError> {
        match self.evaluate(expression)? {
            Value::Error(e) => Err(FormulaError::Cell(e)),
            value => Ok(coerce_to_number(&value)),
        }
    }
}

/// A registered function implementation.
pub type FunctionHandler =
    Arc<dyn Fn(&[String], &mut dyn EvalContext) -> Result<Value, FormulaError> + Send + Sync>;

/// Case-insensitive table of function handlers.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionHandler>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a function.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[String], &mut dyn EvalContext) -> Result<Value, FormulaError>
            + Send
            + Sync
            + 'static,
    {
        self.functions
            .insert(name.to_ascii_uppercase(), Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_handler(&mut self, name: &str, handler: FunctionHandler) {
        self.functions.insert(name.to_ascii_uppercase(), handler);
    }

    /// Look up a function by name (any case).
    pub fn get(&self, name: &str) -> Option<&FunctionHandler> {
        self.functions.get(&name.to_ascii_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, upper-cased and sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Copy every function of `other` into this registry, replacing duplicates.
    pub fn extend(&mut self, other: &FunctionRegistry) {
        for (name, handler) in &other.functions {
            self.functions.insert(name.clone(), Arc::clone(handler));
        }
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl EvalContext for Fixed {
        fn resolve_cell(&mut self, _reference: &str) -> f64 {
            7.0
        }
        fn resolve_range(&mut self, _range: &str) -> Vec<f64> {
            vec![1.0, 2.0]
        }
        fn evaluate(&mut self, expression: &str) -> Result<Value, FormulaError> {
            Ok(Value::Text(expression.to_string()))
        }
    }

    #[test]
    fn lookups_ignore_case() {
        let mut registry = FunctionRegistry::new();
        registry.register("Double", |args, ctx| {
            Ok(Value::Number(ctx.evaluate_number(&args[0])? * 2.0))
        });
        assert!(registry.contains("DOUBLE"));
        assert!(registry.contains("double"));
        assert!(registry.get("dOuBlE").is_some());
        assert_eq!(registry.names(), vec!["DOUBLE".to_string()]);
    }

    #[test]
    fn handlers_see_the_context() {
        let mut registry = FunctionRegistry::new();
        registry.register("TOTAL", |args, ctx| {
            let cell = ctx.resolve_cell(&args[0]);
            let range: f64 = ctx.resolve_range(&args[1]).iter().sum();
            Ok(Value::Number(cell + range))
        });
        let handler = registry.get("total").unwrap();
        let result = handler(&["A1".to_string(), "B1:B2".to_string()], &mut Fixed).unwrap();
        assert_eq!(result, Value::Number(10.0));
    }

    #[test]
    fn missing_functions_are_none() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("SUM").is_none());
    }

    #[test]
    fn extend_replaces_duplicates() {
        let mut a = FunctionRegistry::new();
        a.register("F", |_, _| Ok(Value::Number(1.0)));
        let mut b = FunctionRegistry::new();
        b.register("f", |_, _| Ok(Value::Number(2.0)));
        b.register("G", |_, _| Ok(Value::Number(3.0)));
        a.extend(&b);
        assert_eq!(a.len(), 2);
        let result = a.get("F").unwrap()(&[], &mut Fixed).unwrap();
        assert_eq!(result, Value::Number(2.0));
    }
}
