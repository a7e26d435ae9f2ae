//! Built-in spreadsheet functions and their metadata.
//!
//! Conventions:
//! - Names are ALL CAPS; lookups through the registry ignore case.
//! - Numeric arguments may be ranges (`B9:C20`), references, or any
//!   expression. Ranges contribute only the cells that read as numbers.
//! - If you add a new built-in, add it to `BUILTINS`; `register_builtins`
//!   installs the whole table.

use sheetwise_engine::engine::{
    CellError, EvalContext, FormulaError, FunctionRegistry, Value, as_single_range, format_number,
    try_coerce,
};

type Handler = fn(&[String], &mut dyn EvalContext) -> Result<Value, FormulaError>;

pub struct Builtin {
    pub name: &'static str,
    pub description: &'static str,
    handler: Handler,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "SUM",
        description: "Sum of numeric values",
        handler: sum,
    },
    Builtin {
        name: "AVERAGE",
        description: "Mean of numeric values",
        handler: average,
    },
    Builtin {
        name: "MIN",
        description: "Smallest numeric value",
        handler: min,
    },
    Builtin {
        name: "MAX",
        description: "Largest numeric value",
        handler: max,
    },
    Builtin {
        name: "COUNT",
        description: "Count of numeric values",
        handler: count,
    },
    Builtin {
        name: "PRODUCT",
        description: "Product of numeric values",
        handler: product,
    },
    Builtin {
        name: "ABS",
        description: "Absolute value",
        handler: abs,
    },
    Builtin {
        name: "ROUND",
        description: "Round to a number of digits, halves away from zero",
        handler: round,
    },
    Builtin {
        name: "POWER",
        description: "Raise a number to a power",
        handler: power,
    },
    Builtin {
        name: "SQRT",
        description: "Square root",
        handler: sqrt,
    },
    Builtin {
        name: "PMT",
        description: "Periodic payment of a loan: PMT(rate, nper, pv, [fv], [type])",
        handler: pmt,
    },
    Builtin {
        name: "IF",
        description: "IF(condition, then, [else]); any non-zero condition is true",
        handler: if_,
    },
    Builtin {
        name: "CONCAT",
        description: "Join values as text",
        handler: concat,
    },
];

/// Install every built-in into a registry. Existing functions with the same
/// name are replaced.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    for builtin in BUILTINS {
        registry.register(builtin.name, builtin.handler);
    }
}

/// A registry holding only the built-ins.
pub fn builtin_registry() -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_builtins(&mut registry);
    registry
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTINS.iter().map(|b| b.name).collect()
}

fn check_arity(
    name: &str,
    args: &[String],
    min: usize,
    max: Option<usize>,
) -> Result<(), FormulaError> {
    let n = args.len();
    if n >= min && max.is_none_or(|max| n <= max) {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    };
    Err(FormulaError::arity(name, &expected, n))
}

/// Evaluate an argument, surfacing error markers as errors.
fn value_of(arg: &str, ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    match ctx.evaluate(arg)? {
        Value::Error(e) => Err(FormulaError::Cell(e)),
        value => Ok(value),
    }
}

/// Numbers from every argument: ranges expand, other arguments are evaluated.
/// Blank arguments and values that do not read as numbers are skipped.
fn numbers(args: &[String], ctx: &mut dyn EvalContext) -> Result<Vec<f64>, FormulaError> {
    let mut out = Vec::new();
    for arg in args {
        if arg.is_empty() {
            continue;
        }
        if as_single_range(arg) {
            out.extend(ctx.resolve_range(arg));
        } else {
            out.extend(try_coerce(&value_of(arg, ctx)?));
        }
    }
    Ok(out)
}

fn number(args: &[String], index: usize, ctx: &mut dyn EvalContext) -> Result<f64, FormulaError> {
    match args.get(index).map(String::as_str) {
        None | Some("") => Ok(0.0),
        Some(arg) => ctx.evaluate_number(arg),
    }
}

fn sum(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    Ok(Value::Number(numbers(args, ctx)?.iter().sum()))
}

fn average(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    let values = numbers(args, ctx)?;
    if values.is_empty() {
        return Ok(Value::Error(CellError::DivZero));
    }
    Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
}

fn min(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    let values = numbers(args, ctx)?;
    Ok(Value::Number(values.into_iter().reduce(f64::min).unwrap_or(0.0)))
}

fn max(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    let values = numbers(args, ctx)?;
    Ok(Value::Number(values.into_iter().reduce(f64::max).unwrap_or(0.0)))
}

fn count(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    Ok(Value::Number(numbers(args, ctx)?.len() as f64))
}

fn product(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    let values = numbers(args, ctx)?;
    if values.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::from_number(values.iter().product()))
}

fn abs(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    check_arity("ABS", args, 1, Some(1))?;
    Ok(Value::Number(number(args, 0, ctx)?.abs()))
}

fn round(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    const MAX_DIGITS: f64 = 15.0;
    check_arity("ROUND", args, 1, Some(2))?;
    let x = number(args, 0, ctx)?;
    let digits = number(args, 1, ctx)?.trunc().clamp(-MAX_DIGITS, MAX_DIGITS) as i32;
    let scale = 10f64.powi(digits);
    Ok(Value::from_number((x * scale).round() / scale))
}

fn power(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    check_arity("POWER", args, 2, Some(2))?;
    let base = number(args, 0, ctx)?;
    let exponent = number(args, 1, ctx)?;
    Ok(Value::from_number(base.powf(exponent)))
}

fn sqrt(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    check_arity("SQRT", args, 1, Some(1))?;
    let x = number(args, 0, ctx)?;
    if x < 0.0 {
        return Ok(Value::Error(CellError::Num));
    }
    Ok(Value::Number(x.sqrt()))
}

/// Payment per period. A positive present value gives a positive payment.
fn pmt(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    check_arity("PMT", args, 3, Some(5))?;
    let rate = number(args, 0, ctx)?;
    let nper = number(args, 1, ctx)?;
    let pv = number(args, 2, ctx)?;
    let fv = number(args, 3, ctx)?;
    let due = number(args, 4, ctx)?;

    if nper == 0.0 {
        return Ok(Value::Error(CellError::Num));
    }
    if rate == 0.0 {
        return Ok(Value::from_number((pv + fv) / nper));
    }
    let growth = (1.0 + rate).powf(nper);
    let timing = if due != 0.0 { 1.0 + rate } else { 1.0 };
    Ok(Value::from_number(
        rate * (pv * growth + fv) / (timing * (growth - 1.0)),
    ))
}

fn if_(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    check_arity("IF", args, 2, Some(3))?;
    let branch = if ctx.evaluate_number(&args[0])? != 0.0 {
        args.get(1)
    } else {
        args.get(2)
    };
    match branch.map(String::as_str) {
        None | Some("") => Ok(Value::Number(0.0)),
        Some(arg) => value_of(arg, ctx),
    }
}

fn concat(args: &[String], ctx: &mut dyn EvalContext) -> Result<Value, FormulaError> {
    let mut out = String::new();
    for arg in args {
        if arg.is_empty() {
            continue;
        }
        if as_single_range(arg) {
            for n in ctx.resolve_range(arg) {
                out.push_str(&format_number(n));
            }
            continue;
        }
        match value_of(arg, ctx)? {
            Value::Number(n) => out.push_str(&format_number(n)),
            Value::Text(s) => out.push_str(&s),
            Value::Empty | Value::Error(_) => {}
        }
    }
    Ok(Value::Text(out))
}
