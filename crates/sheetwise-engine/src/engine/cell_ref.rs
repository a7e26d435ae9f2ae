//! Cell reference parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet-style cell references
//! (e.g., "A1", "$B$2", "'Q1 Plan'!AA100", "B9:C20") and zero-indexed
//! row/column coordinates.
//!
//! Column letters use bijective base-26: there is no zero digit, so `A` is 1,
//! `Z` is 26 and `AA` is 27 before the final shift to a zero-based index.
//!
//! # Examples
//!
//! ```
//! use sheetwise_engine::engine::{CellRef, parse_cell_ref};
//!
//! let cell = CellRef::from_str("B3").unwrap();
//! assert_eq!(cell.row, 2); // 0-indexed
//! assert_eq!(cell.col, 1);
//! assert_eq!(cell.to_string(), "B3");
//!
//! let qualified = parse_cell_ref("'Loan Plan'!$C$9").unwrap();
//! assert_eq!(qualified.sheet.as_deref(), Some("Loan Plan"));
//! assert_eq!(qualified.cell, CellRef::new(8, 2));
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A reference to a cell by row and column indices (0-indexed).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> CellRef {
        CellRef { row, col }
    }

    /// Parse a plain cell reference (e.g., "A1", "b2", "$AA$10").
    /// Returns None if the input is invalid. Sheet qualifiers are rejected here;
    /// use [`parse_cell_ref`] for those.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellRef> {
        let parsed = parse_cell_ref(name)?;
        if parsed.sheet.is_some() {
            return None;
        }
        Some(parsed.cell)
    }

    /// Convert column index to spreadsheet-style letters (0 -> A, 25 -> Z, 26 -> AA).
    pub fn col_to_letters(col: usize) -> String {
        index_to_column(col)
    }
}

impl std::str::FromStr for CellRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::from_str(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", index_to_column(self.col), self.row + 1)
    }
}

/// A cell reference with an optional sheet qualifier.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Reference {
    pub sheet: Option<String>,
    pub cell: CellRef,
}

/// A rectangular range reference with an optional sheet qualifier.
///
/// Corners are kept as written; [`RangeRef::cells`] normalizes them.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    /// Top-left and bottom-right corners as `(min_row, min_col, max_row, max_col)`.
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (
            self.start.row.min(self.end.row),
            self.start.col.min(self.end.col),
            self.start.row.max(self.end.row),
            self.start.col.max(self.end.col),
        )
    }

    /// All cells covered by the range, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + use<> {
        let (min_row, min_col, max_row, max_col) = self.bounds();
        (min_row..=max_row)
            .flat_map(move |row| (min_col..=max_col).map(move |col| CellRef::new(row, col)))
    }

    /// Cells of the range inside a grid of `rows` x `cols`, in row-major order.
    pub fn cells_within(&self, rows: usize, cols: usize) -> impl Iterator<Item = CellRef> + use<> {
        let (min_row, min_col, max_row, max_col) = self.bounds();
        let row_end = max_row.saturating_add(1).min(rows);
        let col_end = max_col.saturating_add(1).min(cols);
        (min_row..row_end)
            .flat_map(move |row| (min_col..col_end).map(move |col| CellRef::new(row, col)))
    }

    /// Number of cells covered. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let (min_row, min_col, max_row, max_col) = self.bounds();
        (max_row - min_row + 1) * (max_col - min_col + 1)
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write_sheet_qualifier(f, sheet)?;
        }
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write_sheet_qualifier(f, sheet)?;
        }
        write!(f, "{}", self.cell)
    }
}

fn write_sheet_qualifier(f: &mut fmt::Formatter<'_>, sheet: &str) -> fmt::Result {
    let bare = !sheet.is_empty()
        && sheet
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if bare {
        write!(f, "{}!", sheet)
    } else {
        write!(f, "'{}'!", sheet.replace('\'', "''"))
    }
}

/// Convert column letters to a zero-based index (A -> 0, Z -> 25, AA -> 26).
///
/// Case-insensitive. Returns None for empty input, non-letters, or overflow.
pub fn column_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc = 0usize;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = (b.to_ascii_uppercase() - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// Convert a zero-based column index to letters (0 -> A, 25 -> Z, 26 -> AA).
pub fn index_to_column(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index as u128 + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Pattern for an optional sheet qualifier followed by a single cell.
const QUALIFIER: &str = r"(?:(?:'(?<quoted>(?:[^']|'')+)'|(?<bare>[A-Za-z0-9_.]+))!)?";
const CELL: &str = r"\$?[A-Za-z]{1,3}\$?[0-9]+";

fn cell_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^{}\$?(?<letters>[A-Za-z]{{1,3}})\$?(?<numbers>[0-9]+)$",
            QUALIFIER
        ))
        .expect("cell reference regex must compile")
    })
}

/// Regex matching a reference token (cell or range, optionally sheet-qualified)
/// anywhere inside formula text. Callers check the preceding character themselves.
pub(crate) fn reference_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{}{}(?::{})?", QUALIFIER, CELL, CELL))
            .expect("reference token regex must compile")
    })
}

/// Parse a cell reference such as `A1`, `$B$4`, `Sheet2!C3` or `'My Sheet'!D5`.
///
/// `$` markers are accepted and ignored. Rows are 1-based in the text and
/// 0-based in the result; row 0 is invalid.
pub fn parse_cell_ref(text: &str) -> Option<Reference> {
    let caps = cell_ref_re().captures(text.trim())?;
    let sheet = caps
        .name("quoted")
        .map(|m| m.as_str().replace("''", "'"))
        .or_else(|| caps.name("bare").map(|m| m.as_str().to_string()));
    let col = column_to_index(&caps["letters"])?;
    let row = caps["numbers"].parse::<usize>().ok()?.checked_sub(1)?;
    Some(Reference {
        sheet,
        cell: CellRef::new(row, col),
    })
}

/// Parse a cell range like `A1:B5` or `Data!B9:C20`.
///
/// A qualifier on the first corner applies to the whole range. A qualifier on
/// the second corner is accepted only when it names the same sheet.
pub fn parse_range_ref(text: &str) -> Option<RangeRef> {
    let (first, second) = split_range(text.trim())?;
    let start = parse_cell_ref(first)?;
    let end = parse_cell_ref(second)?;
    let sheet = match (start.sheet, end.sheet) {
        (Some(a), Some(b)) if a != b => return None,
        (a, b) => a.or(b),
    };
    Some(RangeRef {
        sheet,
        start: start.cell,
        end: end.cell,
    })
}

/// Cells of a range in row-major order; malformed input yields an empty list.
pub fn range_cells(text: &str) -> Vec<CellRef> {
    parse_range_ref(text)
        .map(|range| range.cells().collect())
        .unwrap_or_default()
}

/// Split on the `:` that is not inside a quoted sheet name.
fn split_range(text: &str) -> Option<(&str, &str)> {
    let mut in_quote = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            ':' if !in_quote => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_round_trip() {
        for i in 0..=20_000 {
            assert_eq!(column_to_index(&index_to_column(i)), Some(i), "index {}", i);
        }
    }

    #[test]
    fn column_boundaries() {
        assert_eq!(index_to_column(0), "A");
        assert_eq!(index_to_column(25), "Z");
        assert_eq!(index_to_column(26), "AA");
        assert_eq!(index_to_column(701), "ZZ");
        assert_eq!(index_to_column(702), "AAA");
        assert_eq!(column_to_index("xfd"), Some(16_383));
    }

    #[test]
    fn column_rejects_garbage() {
        assert_eq!(column_to_index(""), None);
        assert_eq!(column_to_index("A1"), None);
        assert_eq!(column_to_index("ZZZZZZZZZZZZZZZZZZZZ"), None);
    }

    #[test]
    fn absolute_markers_are_ignored() {
        let plain = parse_cell_ref("B4").unwrap();
        assert_eq!(parse_cell_ref("$B$4").unwrap(), plain);
        assert_eq!(parse_cell_ref("B$4").unwrap(), plain);
        assert_eq!(parse_cell_ref("$B4").unwrap(), plain);
    }

    #[test]
    fn sheet_qualifiers() {
        let bare = parse_cell_ref("Sheet2!A1").unwrap();
        assert_eq!(bare.sheet.as_deref(), Some("Sheet2"));
        assert_eq!(bare.cell, CellRef::new(0, 0));

        let quoted = parse_cell_ref("'It''s here'!B2").unwrap();
        assert_eq!(quoted.sheet.as_deref(), Some("It's here"));
        assert_eq!(quoted.to_string(), "'It''s here'!B2");
    }

    #[test]
    fn invalid_cell_refs() {
        assert!(parse_cell_ref("A0").is_none());
        assert!(parse_cell_ref("1A").is_none());
        assert!(parse_cell_ref("A 1").is_none());
        assert!(parse_cell_ref("Sheet 2!A1").is_none());
        assert!(CellRef::from_str("Sheet2!A1").is_none());
    }

    #[test]
    fn ranges_normalize_corners() {
        let range = parse_range_ref("C20:B9").unwrap();
        assert_eq!(range.bounds(), (8, 1, 19, 2));
        assert_eq!(range.len(), 24);
        let cells: Vec<_> = range.cells().take(3).collect();
        assert_eq!(
            cells,
            vec![CellRef::new(8, 1), CellRef::new(8, 2), CellRef::new(9, 1)]
        );
    }

    #[test]
    fn qualified_ranges() {
        let range = parse_range_ref("'Rates 2024'!A1:A3").unwrap();
        assert_eq!(range.sheet.as_deref(), Some("Rates 2024"));
        assert_eq!(range.to_string(), "'Rates 2024'!A1:A3");
        assert!(parse_range_ref("S1!A1:S2!A3").is_none());
    }

    #[test]
    fn malformed_ranges_are_empty() {
        assert!(range_cells("A1").is_empty());
        assert!(range_cells("A1:").is_empty());
        assert!(range_cells("nonsense").is_empty());
        assert_eq!(range_cells("A1:B2").len(), 4);
    }

    #[test]
    fn cells_within_clamps_to_the_grid() {
        let column = parse_range_ref("A1:A1048576").unwrap();
        assert_eq!(column.cells_within(3, 2).count(), 3);

        let sheet = parse_range_ref("XFD1048576:A1").unwrap();
        let cells: Vec<_> = sheet.cells_within(2, 2).collect();
        assert_eq!(
            cells,
            vec![CellRef::new(0, 0), CellRef::new(0, 1), CellRef::new(1, 0), CellRef::new(1, 1)]
        );

        let outside = parse_range_ref("C5:D9").unwrap();
        assert_eq!(outside.cells_within(2, 2).count(), 0);
    }
}
