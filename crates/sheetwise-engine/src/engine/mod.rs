//! Spreadsheet engine API.
//!
//! - [`Cell`], [`CellType`], [`Sheet`], [`Workbook`] - Source data
//! - [`CellRef`], [`parse_cell_ref`], [`parse_range_ref`] - A1 references and ranges
//! - [`Value`], [`CellError`] - Raw evaluation results
//! - [`coerce_to_number`] - Display strings back to numbers
//! - [`format_value`] - Raw values to display strings
//! - [`FunctionRegistry`], [`EvalContext`] - Pluggable function handlers
//! - [`reduce_embedded_calls`], [`substitute_references`] - Text-level reduction
//! - [`Evaluator`] - Whole-workbook evaluation

mod arithmetic;
mod cell;
mod cell_ref;
mod coerce;
mod error;
mod eval;
mod format;
mod preprocess;
mod registry;
mod value;

pub use arithmetic::Arithmetic;
pub use cell::{Cell, CellType, Sheet, Workbook};
pub use cell_ref::{
    CellRef, RangeRef, Reference, column_to_index, index_to_column, parse_cell_ref,
    parse_range_ref, range_cells,
};
pub use coerce::{coerce_str, coerce_to_number, try_coerce};
pub use error::FormulaError;
pub use eval::{CellAddr, CellState, Evaluator, SheetResult, WorkbookResult};
pub use format::{FormatCode, format_number, format_value};
pub use preprocess::{
    Call, as_single_range, as_single_reference, as_string_literal, find_innermost_call,
    number_literal, pass_limit, reduce_embedded_calls, reference_tokens, split_arguments,
    string_literal, substitute_references,
};
pub use registry::{EvalContext, FunctionHandler, FunctionRegistry};
pub use value::{CellError, Value};
