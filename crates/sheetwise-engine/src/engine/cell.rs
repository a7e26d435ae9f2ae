//! Cell data structures for the spreadsheet grid.
//!
//! This module provides the source-side data types:
//! - [`CellType`] - The type of content in a cell (empty, text, number, or formula)
//! - [`Cell`] - A cell with content and an optional format code
//! - [`Sheet`] - A named, possibly ragged grid of cells
//! - [`Workbook`] - An ordered list of sheets
//!
//! Source cells are never mutated by evaluation. Results live in a separate
//! plane (see [`super::SheetResult`]).
//!
//! On the wire a cell is `null`, a bare number, a bare string, or an object
//! `{ "value": ..., "format": ... }`. A string value starting with `=` is a formula.

use serde::{Deserialize, Serialize};

/// The type of content stored in a cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellType {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Formula text without the leading `=`.
    Formula(String),
}

/// A cell in the spreadsheet grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCell", into = "RawCell")]
pub struct Cell {
    pub contents: CellType,
    /// Format code applied to the evaluated result when rendering.
    pub format: Option<String>,
}

impl Cell {
    pub fn new_empty() -> Cell {
        Cell::default()
    }

    pub fn new_text(text: &str) -> Cell {
        Cell {
            contents: CellType::Text(text.to_string()),
            format: None,
        }
    }

    pub fn new_number(n: f64) -> Cell {
        Cell {
            contents: CellType::Number(n),
            format: None,
        }
    }

    /// Create a new cell containing a formula (given without the leading `=`).
    pub fn new_formula(formula: &str) -> Cell {
        Cell {
            contents: CellType::Formula(formula.to_string()),
            format: None,
        }
    }

    /// Attach a format code.
    pub fn with_format(mut self, format: &str) -> Cell {
        self.format = Some(format.to_string());
        self
    }

    /// Parse user input and create appropriate cell type.
    /// - Empty string or whitespace -> Empty
    /// - Starts with '=' -> Formula (without the '=')
    /// - Quoted string -> Text (without quotes)
    /// - Valid number -> Number
    /// - Otherwise -> Text
    pub fn from_input(input: &str) -> Cell {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Cell::new_empty();
        }

        if let Some(formula) = trimmed.strip_prefix('=') {
            return Cell::new_formula(formula);
        }

        if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
            let text = &trimmed[1..trimmed.len() - 1];
            return Cell::new_text(text);
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            return Cell::new_number(n);
        }

        Cell::new_text(trimmed)
    }

    /// The cell's stored value as originally entered (formulas keep their `=`).
    pub fn to_input_string(&self) -> String {
        match &self.contents {
            CellType::Empty => String::new(),
            CellType::Text(s) => s.clone(),
            CellType::Number(n) => n.to_string(),
            CellType::Formula(s) => format!("={}", s),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.contents, CellType::Formula(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.contents, CellType::Empty)
    }
}

/// A named sheet: ordered rows of ordered cells. Rows may differ in length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: &str) -> Sheet {
        Sheet {
            name: name.to_string(),
            rows: Vec::new(),
        }
    }

    /// Build a sheet from rows of user-style input strings (see [`Cell::from_input`]).
    pub fn from_inputs<R, S>(name: &str, rows: R) -> Sheet
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Sheet {
            name: name.to_string(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|s| Cell::from_input(s.as_ref())).collect())
                .collect(),
        }
    }

    /// The cell at a position, or None when outside the stored grid.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(col)
    }

    /// Store a cell, growing the grid with empty cells as needed.
    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, Cell::new_empty);
        }
        cells[col] = cell;
    }

    /// Number of rows and the widest row.
    pub fn dimensions(&self) -> (usize, usize) {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        (self.rows.len(), width)
    }
}

/// An ordered list of sheets. Order is display order only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Workbook {
        Workbook::default()
    }

    pub fn with_sheet(sheet: Sheet) -> Workbook {
        Workbook {
            sheets: vec![sheet],
        }
    }

    /// Index of a sheet by name. Exact match first, then ASCII case-insensitive.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .or_else(|| {
                self.sheets
                    .iter()
                    .position(|s| s.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }
}

/// Wire representation of a cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCell {
    Empty,
    Number(f64),
    Text(String),
    Formatted {
        #[serde(default)]
        value: Option<RawScalar>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Number(f64),
    Text(String),
}

fn contents_from_text(text: String) -> CellType {
    match text.strip_prefix('=') {
        Some(formula) => CellType::Formula(formula.to_string()),
        None => CellType::Text(text),
    }
}

impl From<RawCell> for Cell {
    fn from(raw: RawCell) -> Cell {
        match raw {
            RawCell::Empty => Cell::new_empty(),
            RawCell::Number(n) => Cell::new_number(n),
            RawCell::Text(text) => Cell {
                contents: contents_from_text(text),
                format: None,
            },
            RawCell::Formatted { value, format } => {
                let contents = match value {
                    None => CellType::Empty,
                    Some(RawScalar::Number(n)) => CellType::Number(n),
                    Some(RawScalar::Text(text)) => contents_from_text(text),
                };
                Cell { contents, format }
            }
        }
    }
}

impl From<Cell> for RawCell {
    fn from(cell: Cell) -> RawCell {
        let value = match cell.contents {
            CellType::Empty => None,
            CellType::Number(n) => Some(RawScalar::Number(n)),
            CellType::Text(s) => Some(RawScalar::Text(s)),
            CellType::Formula(s) => Some(RawScalar::Text(format!("={}", s))),
        };
        match (value, cell.format) {
            (None, None) => RawCell::Empty,
            (Some(RawScalar::Number(n)), None) => RawCell::Number(n),
            (Some(RawScalar::Text(s)), None) => RawCell::Text(s),
            (value, format) => RawCell::Formatted { value, format },
        }
    }
}
