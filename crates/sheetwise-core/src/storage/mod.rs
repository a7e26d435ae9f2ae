//! Workbook import/export.
//!
//! - [`json`] - Workbooks with formats, and evaluated results
//! - [`csv`] - Single sheets in, display grids out

pub mod csv;
pub mod json;

pub use csv::{parse_csv, parse_csv_content, write_display_csv};
pub use json::{parse_workbook, parse_workbook_content, results_to_json, write_workbook};
