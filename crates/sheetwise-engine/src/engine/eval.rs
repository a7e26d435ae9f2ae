//! Whole-workbook evaluation.
//!
//! Every call to [`Evaluator::evaluate_workbook`] runs one [`Pass`]: a fresh
//! result cache and in-flight set, dropped when the call returns. Cells are
//! evaluated on demand, so a formula may reference cells below or to the
//! right of it (or on another sheet) and still see their final values.
//!
//! Per cell the pass moves through `Unvisited -> InProgress -> Resolved`.
//! Meeting an `InProgress` cell again means a circular reference; that cell
//! resolves to `#CYCLE!` and so does everything depending on it.
//!
//! Before a formula runs, the formula cells it reads are settled deepest first
//! from an explicit work stack, so long dependency chains do not turn into
//! deep recursion.
//!
//! Display strings are derived after the sweep from (raw value, format code)
//! for every cell alike, whether a cell was reached by the sweep or pulled in
//! earlier as another cell's dependency.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::preprocess::{
    as_single_range, as_single_reference, as_string_literal, number_literal,
    reduce_embedded_calls, reference_tokens, split_arguments, substitute_references,
};
use super::{
    Arithmetic, Cell, CellError, CellType, EvalContext, FormatCode, FormulaError,
    FunctionRegistry, Sheet, Value, Workbook, coerce_str, coerce_to_number, format_value,
    parse_cell_ref, parse_range_ref, try_coerce,
};

/// Nested cell evaluations allowed before a chain is treated as circular.
/// Settling keeps acyclic chains shallow, so only reference loops get here.
const MAX_DEPTH: usize = 64;

/// Position of a cell within a workbook (all 0-indexed).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct CellAddr {
    pub sheet: usize,
    pub row: usize,
    pub col: usize,
}

impl CellAddr {
    pub fn new(sheet: usize, row: usize, col: usize) -> CellAddr {
        CellAddr { sheet, row, col }
    }
}

/// Where a cell stands within one evaluation pass.
#[derive(Clone, Debug, PartialEq)]
pub enum CellState {
    Unvisited,
    InProgress,
    Resolved(Value),
}

/// Results for one sheet: raw values and display strings, shaped like the input rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SheetResult {
    pub name: String,
    pub values: Vec<Vec<Value>>,
    pub display: Vec<Vec<String>>,
}

impl SheetResult {
    /// Raw value at a position; positions outside the input grid are empty.
    pub fn value(&self, row: usize, col: usize) -> &Value {
        const EMPTY: &Value = &Value::Empty;
        self.values
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(EMPTY)
    }

    /// Display string at a position; positions outside the input grid are `""`.
    pub fn display(&self, row: usize, col: usize) -> &str {
        self.display
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Value at an A1-style reference (sheet qualifiers are ignored).
    pub fn value_at(&self, reference: &str) -> &Value {
        const EMPTY: &Value = &Value::Empty;
        match parse_cell_ref(reference) {
            Some(r) => self.value(r.cell.row, r.cell.col),
            None => EMPTY,
        }
    }

    /// Display string at an A1-style reference (sheet qualifiers are ignored).
    pub fn display_at(&self, reference: &str) -> &str {
        match parse_cell_ref(reference) {
            Some(r) => self.display(r.cell.row, r.cell.col),
            None => "",
        }
    }
}

/// Results for every sheet of a workbook, in workbook order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkbookResult {
    pub sheets: Vec<SheetResult>,
}

impl WorkbookResult {
    pub fn sheet(&self, name: &str) -> Option<&SheetResult> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
    }
}

/// Formula evaluator: a function registry plus the arithmetic host.
///
/// Holds no per-evaluation state; each `evaluate_*` call is independent.
#[derive(Default)]
pub struct Evaluator {
    registry: FunctionRegistry,
    arithmetic: Arithmetic,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new(registry: FunctionRegistry) -> Self {
        Evaluator {
            registry,
            arithmetic: Arithmetic::new(),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Evaluate every cell of every sheet.
    pub fn evaluate_workbook(&self, workbook: &Workbook) -> WorkbookResult {
        let mut pass = Pass::new(workbook, &self.registry, &self.arithmetic);

        let values: Vec<Vec<Vec<Value>>> = workbook
            .sheets
            .iter()
            .enumerate()
            .map(|(s, sheet)| {
                sheet
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(r, row)| {
                        (0..row.len())
                            .map(|c| pass.evaluate_cell(CellAddr::new(s, r, c)))
                            .collect()
                    })
                    .collect()
            })
            .collect();

        tracing::debug!(
            sheets = workbook.sheets.len(),
            cells = pass.cache.len(),
            "evaluation pass complete"
        );

        let sheets = workbook
            .sheets
            .iter()
            .zip(values)
            .map(|(sheet, values)| {
                let display = sheet
                    .rows
                    .iter()
                    .zip(&values)
                    .map(|(cells, row_values)| {
                        cells
                            .iter()
                            .zip(row_values)
                            .map(|(cell, value)| display_string(cell, value))
                            .collect()
                    })
                    .collect();
                SheetResult {
                    name: sheet.name.clone(),
                    values,
                    display,
                }
            })
            .collect();

        WorkbookResult { sheets }
    }

    /// Evaluate a single sheet on its own.
    pub fn evaluate_sheet(&self, sheet: &Sheet) -> SheetResult {
        let workbook = Workbook::with_sheet(sheet.clone());
        self.evaluate_workbook(&workbook)
            .sheets
            .pop()
            .unwrap_or_default()
    }

    /// Evaluate a formula (leading `=` optional) as if it lived on `sheet`
    /// without being part of the grid.
    pub fn evaluate_formula(&self, workbook: &Workbook, sheet: usize, formula: &str) -> Value {
        let trimmed = formula.trim();
        let body = trimmed.strip_prefix('=').unwrap_or(trimmed);
        let mut pass = Pass::new(workbook, &self.registry, &self.arithmetic);
        pass.sheet = sheet;
        pass.evaluate_formula(body)
    }
}

/// Display text for an evaluated cell.
///
/// Typed text that reads as a number keeps its spelling unless a format
/// code applies; every other cell renders its raw value.
fn display_string(cell: &Cell, value: &Value) -> String {
    let format = cell.format.as_deref();
    match &cell.contents {
        CellType::Text(text) if format.and_then(FormatCode::parse).is_none() => text.clone(),
        _ => format_value(value, format),
    }
}

/// State of one evaluation pass.
struct Pass<'a> {
    workbook: &'a Workbook,
    registry: &'a FunctionRegistry,
    arithmetic: &'a Arithmetic,
    cache: HashMap<CellAddr, Value>,
    in_flight: HashSet<CellAddr>,
    /// Sheet that unqualified references resolve against.
    sheet: usize,
    /// Error met while a handler resolved cells or ranges.
    poisoned: Option<CellError>,
    /// Cell evaluations currently nested on the call stack.
    depth: usize,
}

impl<'a> Pass<'a> {
    fn new(
        workbook: &'a Workbook,
        registry: &'a FunctionRegistry,
        arithmetic: &'a Arithmetic,
    ) -> Self {
        Pass {
            workbook,
            registry,
            arithmetic,
            cache: HashMap::new(),
            in_flight: HashSet::new(),
            sheet: 0,
            poisoned: None,
            depth: 0,
        }
    }

    fn state(&self, addr: &CellAddr) -> CellState {
        if let Some(value) = self.cache.get(addr) {
            CellState::Resolved(value.clone())
        } else if self.in_flight.contains(addr) {
            CellState::InProgress
        } else {
            CellState::Unvisited
        }
    }

    fn evaluate_cell(&mut self, addr: CellAddr) -> Value {
        match self.state(&addr) {
            CellState::Resolved(value) => return value,
            CellState::InProgress => {
                tracing::debug!(
                    sheet = addr.sheet,
                    row = addr.row,
                    col = addr.col,
                    "circular reference"
                );
                return Value::Error(CellError::Cycle);
            }
            CellState::Unvisited => {}
        }
        if self.depth >= MAX_DEPTH {
            tracing::debug!(
                sheet = addr.sheet,
                row = addr.row,
                col = addr.col,
                "reference loop too deep"
            );
            return Value::Error(CellError::Cycle);
        }

        let workbook = self.workbook;
        let Some(cell) = workbook
            .sheets
            .get(addr.sheet)
            .and_then(|s| s.get(addr.row, addr.col))
        else {
            return Value::Empty;
        };

        self.in_flight.insert(addr);
        self.depth += 1;
        let outer_sheet = std::mem::replace(&mut self.sheet, addr.sheet);

        let value = match &cell.contents {
            CellType::Empty => Value::Empty,
            CellType::Number(n) => Value::Number(*n),
            CellType::Text(s) => match coerce_str(s) {
                Some(n) => Value::Number(n),
                None => Value::Text(s.clone()),
            },
            CellType::Formula(formula) => {
                self.settle_dependencies(addr, formula);
                self.evaluate_formula(formula)
            }
        };

        self.sheet = outer_sheet;
        self.depth -= 1;
        self.in_flight.remove(&addr);
        self.cache.insert(addr, value.clone());
        value
    }

    /// Evaluate the formula cells that `root` reads, deepest first, from an
    /// explicit stack. Each of them then finds its own inputs cached.
    fn settle_dependencies(&mut self, root: CellAddr, formula: &str) {
        let mut expanded = HashSet::from([root]);
        let mut stack: Vec<(CellAddr, bool)> = self
            .pending_dependencies(root.sheet, formula)
            .into_iter()
            .rev()
            .map(|dep| (dep, false))
            .collect();

        while let Some((addr, ready)) = stack.pop() {
            if ready {
                self.evaluate_cell(addr);
                continue;
            }
            if !expanded.insert(addr) {
                continue;
            }
            stack.push((addr, true));
            if let Some(formula) = self.formula_at(addr) {
                for dep in self.pending_dependencies(addr.sheet, formula).into_iter().rev() {
                    if !expanded.contains(&dep) {
                        stack.push((dep, false));
                    }
                }
            }
        }
    }

    /// Unevaluated formula cells referenced by `formula` on `sheet`.
    fn pending_dependencies(&self, sheet: usize, formula: &str) -> Vec<CellAddr> {
        let mut deps = Vec::new();
        for token in reference_tokens(formula) {
            if let Some(range) = parse_range_ref(token) {
                let Some(target) = self.sheet_for(sheet, range.sheet.as_deref()) else {
                    continue;
                };
                let (rows, cols) = self.dimensions(target);
                deps.extend(
                    range
                        .cells_within(rows, cols)
                        .map(|cell| CellAddr::new(target, cell.row, cell.col)),
                );
            } else if let Some(addr) = self.lookup_on(sheet, token) {
                deps.push(addr);
            }
        }
        deps.retain(|addr| {
            self.formula_at(*addr).is_some()
                && !self.cache.contains_key(addr)
                && !self.in_flight.contains(addr)
        });
        deps
    }

    fn formula_at(&self, addr: CellAddr) -> Option<&'a str> {
        let workbook = self.workbook;
        let cell = workbook.sheets.get(addr.sheet)?.get(addr.row, addr.col)?;
        match &cell.contents {
            CellType::Formula(formula) => Some(formula),
            _ => None,
        }
    }

    fn dimensions(&self, sheet: usize) -> (usize, usize) {
        self.workbook
            .sheets
            .get(sheet)
            .map(Sheet::dimensions)
            .unwrap_or((0, 0))
    }

    /// Evaluate formula text, degrading failures to the original text.
    fn evaluate_formula(&mut self, formula: &str) -> Value {
        match self.evaluate_expression(formula) {
            Ok(Value::Error(e)) | Err(FormulaError::Cell(e)) => Value::Error(e),
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(formula = %formula, error = %err, "formula left unresolved");
                Value::Text(format!("={}", formula))
            }
        }
    }

    fn evaluate_expression(&mut self, expression: &str) -> Result<Value, FormulaError> {
        let reduced =
            reduce_embedded_calls(expression, |name, args| self.call_function(name, args))?;
        let reduced = reduced.trim();

        if let Some(text) = as_string_literal(reduced) {
            return Ok(Value::Text(text));
        }

        if as_single_reference(reduced) {
            return match self.lookup(reduced) {
                Some(addr) => match self.evaluate_cell(addr) {
                    Value::Empty => Ok(Value::Number(0.0)),
                    Value::Error(e) => Err(FormulaError::Cell(e)),
                    value => Ok(value),
                },
                None => Ok(Value::Number(0.0)),
            };
        }

        let substituted =
            substitute_references(reduced, |reference| self.reference_literal(reference))?;
        let n = self.arithmetic.evaluate(&substituted)?;
        Ok(Value::from_number(n))
    }

    fn call_function(&mut self, name: &str, args: &str) -> Result<Value, FormulaError> {
        let registry = self.registry;
        let Some(handler) = registry.get(name) else {
            return Err(FormulaError::UnknownFunction(name.to_ascii_uppercase()));
        };
        let args = split_arguments(args);

        let outer = self.poisoned.take();
        let result = handler(&args, self);
        let poisoned = std::mem::replace(&mut self.poisoned, outer);

        if let Some(e) = poisoned {
            return Err(FormulaError::Cell(e));
        }
        match result? {
            Value::Error(e) => Err(FormulaError::Cell(e)),
            value => Ok(value),
        }
    }

    /// Replacement text for a reference inside arithmetic.
    fn reference_literal(&mut self, reference: &str) -> Result<String, FormulaError> {
        if as_single_range(reference) {
            return Err(FormulaError::BareRange(reference.to_string()));
        }
        let Some(addr) = self.lookup(reference) else {
            return Ok(number_literal(0.0));
        };
        match self.evaluate_cell(addr) {
            Value::Error(e) => Err(FormulaError::Cell(e)),
            value => Ok(number_literal(coerce_to_number(&value))),
        }
    }

    /// Resolve reference text to a workbook address. Unknown sheets resolve to None.
    fn lookup(&self, reference: &str) -> Option<CellAddr> {
        self.lookup_on(self.sheet, reference)
    }

    /// Like [`Pass::lookup`], with unqualified references on `sheet`.
    fn lookup_on(&self, sheet: usize, reference: &str) -> Option<CellAddr> {
        let parsed = parse_cell_ref(reference)?;
        let sheet = self.sheet_for(sheet, parsed.sheet.as_deref())?;
        Some(CellAddr::new(sheet, parsed.cell.row, parsed.cell.col))
    }

    /// Index of a qualifier's sheet, or `current` when unqualified.
    fn sheet_for(&self, current: usize, qualifier: Option<&str>) -> Option<usize> {
        match qualifier {
            Some(name) => self.workbook.sheet_index(name),
            None => Some(current),
        }
    }
}

impl EvalContext for Pass<'_> {
    fn resolve_cell(&mut self, reference: &str) -> f64 {
        let Some(addr) = self.lookup(reference) else {
            return 0.0;
        };
        match self.evaluate_cell(addr) {
            Value::Error(e) => {
                self.poisoned.get_or_insert(e);
                0.0
            }
            value => coerce_to_number(&value),
        }
    }

    fn resolve_range(&mut self, range: &str) -> Vec<f64> {
        let Some(parsed) = parse_range_ref(range) else {
            return Vec::new();
        };
        let Some(sheet) = self.sheet_for(self.sheet, parsed.sheet.as_deref()) else {
            return Vec::new();
        };

        // Cells past the stored grid are empty and would be skipped anyway.
        let (rows, cols) = self.dimensions(sheet);
        let mut out = Vec::new();
        for cell in parsed.cells_within(rows, cols) {
            match self.evaluate_cell(CellAddr::new(sheet, cell.row, cell.col)) {
                Value::Error(e) => {
                    self.poisoned.get_or_insert(e);
                }
                value => out.extend(try_coerce(&value)),
            }
        }
        out
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value, FormulaError> {
        self.evaluate_expression(expression)
    }
}
