//! JSON workbook files.
//!
//! A workbook file is an array of sheets, an object `{"sheets": [...]}`,
//! or a single sheet object:
//!
//! ```json
//! [
//!   { "name": "Loan", "rows": [
//!       ["Principal", { "value": 250000, "format": "$#,##0.00" }],
//!       ["Payment", "=PMT(0.005, 360, B1)"]
//!   ] }
//! ]
//! ```
//!
//! Cells are `null`, a number, a string (`=` starts a formula) or
//! `{ "value": ..., "format": ... }`.

use serde::Deserialize;
use sheetwise_engine::engine::{Sheet, Workbook, WorkbookResult};
use std::fs;
use std::path::Path;

use crate::error::{Result, SheetwiseError};

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkbookFile {
    Sheets(Vec<Sheet>),
    Wrapped { sheets: Vec<Sheet> },
    Single(Sheet),
}

/// Parse a workbook file.
pub fn parse_workbook(path: &Path) -> Result<Workbook> {
    let content = fs::read_to_string(path)?;
    parse_workbook_content(&content)
}

/// Parse workbook JSON from a string.
pub fn parse_workbook_content(content: &str) -> Result<Workbook> {
    let file: WorkbookFile = serde_json::from_str(content).map_err(|e| SheetwiseError::Parse {
        line: e.line(),
        message: e.to_string(),
    })?;
    let sheets = match file {
        WorkbookFile::Sheets(sheets) | WorkbookFile::Wrapped { sheets } => sheets,
        WorkbookFile::Single(sheet) => vec![sheet],
    };
    Ok(Workbook { sheets })
}

/// Write a workbook as pretty-printed JSON (array form).
pub fn write_workbook(path: &Path, workbook: &Workbook) -> Result<()> {
    let content = serde_json::to_string_pretty(workbook)?;
    fs::write(path, content + "\n")?;
    Ok(())
}

/// Evaluated results as pretty-printed JSON: per sheet its name, raw values
/// (numbers, strings, `null`, error markers) and display strings.
pub fn results_to_json(results: &WorkbookResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}
