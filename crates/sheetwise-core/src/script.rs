//! User-defined functions written in Rhai.
//!
//! Every `fn NAME(a, b) { ... }` in a script becomes a spreadsheet function
//! callable as `=NAME(x, y)`. Arguments are evaluated by the sheet first:
//! ranges arrive as arrays of numbers, everything else as a number or string.

use rhai::{AST, Array, Dynamic, Engine, Scope};
use sheetwise_engine::engine::{
    EvalContext, FormulaError, FunctionRegistry, Value, as_single_range,
};
use std::sync::Arc;

use crate::error::{Result, SheetwiseError};

/// Compiled user functions, ready to be installed into a registry.
#[derive(Clone)]
pub struct ScriptFunctions {
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

impl ScriptFunctions {
    /// Compile a script. Nothing is registered anywhere until [`Self::register`].
    pub fn compile(source: &str) -> Result<Self> {
        let engine = Engine::new();
        let ast = engine
            .compile(source)
            .map_err(|e| SheetwiseError::RhaiCompile(format!("Error in custom functions: {}", e)))?;
        Ok(ScriptFunctions {
            engine: Arc::new(engine),
            ast: Arc::new(ast),
        })
    }

    /// Names of the script's functions, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ast
            .iter_functions()
            .map(|f| f.name.to_string())
            .collect();
        names.sort();
        names
    }

    /// Install every script function, replacing same-named functions.
    pub fn register(&self, registry: &mut FunctionRegistry) {
        for f in self.ast.iter_functions() {
            let name = f.name.to_string();
            let arity = f.params.len();
            let engine = Arc::clone(&self.engine);
            let ast = Arc::clone(&self.ast);
            tracing::debug!(function = %name, arity, "registering script function");
            registry.register(f.name, move |args, ctx| {
                call_script(&engine, &ast, &name, arity, args, ctx)
            });
        }
    }
}

fn call_script(
    engine: &Engine,
    ast: &AST,
    name: &str,
    arity: usize,
    args: &[String],
    ctx: &mut dyn EvalContext,
) -> std::result::Result<Value, FormulaError> {
    if args.len() != arity {
        return Err(FormulaError::arity(name, &arity.to_string(), args.len()));
    }

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(argument(arg, ctx)?);
    }

    let result = engine
        .call_fn::<Dynamic>(&mut Scope::new(), ast, name, values)
        .map_err(|e| FormulaError::handler(name, e.to_string()))?;
    Ok(dynamic_to_value(result))
}

fn argument(arg: &str, ctx: &mut dyn EvalContext) -> std::result::Result<Dynamic, FormulaError> {
    if as_single_range(arg) {
        let array: Array = ctx.resolve_range(arg).into_iter().map(Dynamic::from_float).collect();
        return Ok(Dynamic::from_array(array));
    }
    match ctx.evaluate(arg)? {
        Value::Number(n) => Ok(Dynamic::from_float(n)),
        Value::Text(s) => Ok(Dynamic::from(s)),
        Value::Empty => Ok(Dynamic::from_float(0.0)),
        Value::Error(e) => Err(FormulaError::Cell(e)),
    }
}

/// Convert a Rhai result to a cell value.
fn dynamic_to_value(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Empty;
    }
    if let Ok(n) = value.as_float() {
        return Value::from_number(n);
    }
    if let Ok(n) = value.as_int() {
        return Value::Number(n as f64);
    }
    if let Ok(b) = value.as_bool() {
        return Value::Number(if b { 1.0 } else { 0.0 });
    }
    if value.is_string() {
        return Value::Text(value.into_string().unwrap_or_default());
    }
    Value::Text(value.to_string())
}

/// Compile `source` and install its functions. A compile error leaves the
/// registry untouched. Returns the names installed.
pub fn register_script(registry: &mut FunctionRegistry, source: &str) -> Result<Vec<String>> {
    let functions = ScriptFunctions::compile(source)?;
    functions.register(registry);
    Ok(functions.names())
}
