//! CSV import/export functionality

use sheetwise_engine::engine::{Cell, Sheet, SheetResult, coerce_str};
use std::path::Path;

use crate::error::{Result, SheetwiseError};

/// Parse a CSV file into a sheet named after the file stem.
pub fn parse_csv(path: &Path) -> Result<Sheet> {
    let content = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Sheet1".to_string());
    parse_csv_content(&name, &content)
}

/// Parse CSV text into a sheet, one row per line. Trailing blank lines are dropped.
pub fn parse_csv_content(name: &str, content: &str) -> Result<Sheet> {
    let mut rows: Vec<Vec<Cell>> = content
        .lines()
        .map(|line| parse_csv_line(line).iter().map(|f| parse_csv_field(f)).collect())
        .collect();
    while rows
        .last()
        .is_some_and(|row| row.iter().all(Cell::is_empty))
    {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(SheetwiseError::EmptyCsv);
    }
    Ok(Sheet {
        name: name.to_string(),
        rows,
    })
}

/// Parse a single CSV line, handling quoted fields
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                field_was_quoted = true;
            }
            ',' => {
                fields.push(finish_field(&mut current, field_was_quoted));
                field_was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    fields.push(finish_field(&mut current, field_was_quoted));
    fields
}

fn finish_field(current: &mut String, quoted: bool) -> String {
    let field = std::mem::take(current);
    if quoted { field } else { field.trim().to_string() }
}

/// Parse a CSV field into a cell:
/// - Empty -> Empty
/// - `=...` -> Formula
/// - Valid number -> Number (unless it has leading zeros like "007")
/// - Otherwise -> Text, including display strings like `$1,000` or `5%`
///   which the evaluator still reads as numbers
pub(crate) fn parse_csv_field(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::new_empty();
    }

    // Quoted fields with surrounding whitespace stay text exactly.
    let trimmed = field.trim();
    if field != trimmed {
        return Cell::new_text(field);
    }

    if let Some(formula) = trimmed.strip_prefix('=') {
        return Cell::new_formula(formula);
    }

    if trimmed.starts_with('0')
        && trimmed.len() > 1
        && !trimmed.starts_with("0.")
        && trimmed.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        return Cell::new_text(trimmed);
    }

    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return Cell::new_number(n);
        }
    }

    Cell::new_text(trimmed)
}

/// Render a sheet's display strings as CSV. Short rows are padded to the widest row.
pub fn write_display_csv(result: &SheetResult) -> String {
    let width = result.display.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::new();
    for row in &result.display {
        let fields: Vec<String> = (0..width)
            .map(|col| escape_csv_field(row.get(col).map(String::as_str).unwrap_or("")))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Guard against formula injection; numbers such as "-5" or "-$1.00" are left alone.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '+' | '-' | '@'))
        && coerce_str(field).is_none()
    {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetwise_engine::engine::{CellType, Evaluator};

    #[test]
    fn test_parse_csv_line_simple() {
        assert_eq!(parse_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_csv_line("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn test_parse_csv_line_quoted() {
        assert_eq!(
            parse_csv_line(r#"a,"hello, world",c"#),
            vec!["a", "hello, world", "c"]
        );
        assert_eq!(
            parse_csv_line(r#""=SUM(A1,B1)",x"#),
            vec!["=SUM(A1,B1)", "x"]
        );
    }

    #[test]
    fn test_parse_csv_line_escaped_quotes() {
        assert_eq!(
            parse_csv_line(r#"a,"say ""hello""",c"#),
            vec!["a", r#"say "hello""#, "c"]
        );
    }

    #[test]
    fn test_parse_csv_field_kinds() {
        assert_eq!(parse_csv_field("42").contents, CellType::Number(42.0));
        assert_eq!(parse_csv_field("007").contents, CellType::Text("007".into()));
        assert_eq!(parse_csv_field("=A1*2").contents, CellType::Formula("A1*2".into()));
        assert_eq!(parse_csv_field("$1,000").contents, CellType::Text("$1,000".into()));
        assert_eq!(parse_csv_field("inf").contents, CellType::Text("inf".into()));
        assert_eq!(
            parse_csv_field("  keep me  ").contents,
            CellType::Text("  keep me  ".into())
        );
    }

    #[test]
    fn test_parse_csv_content_builds_rows() {
        let csv = "Item,Cost\nRent,\"$1,200\"\nFood,300\nTotal,=SUM(B2:B3)\n\n";
        let sheet = parse_csv_content("Data", csv).unwrap();
        assert_eq!(sheet.name, "Data");
        assert_eq!(sheet.dimensions(), (4, 2));

        let result = Evaluator::new(crate::functions::builtin_registry()).evaluate_sheet(&sheet);
        assert_eq!(result.display_at("B4"), "1500");
    }

    #[test]
    fn test_parse_csv_content_empty() {
        assert!(matches!(parse_csv_content("x", ""), Err(SheetwiseError::EmptyCsv)));
        assert!(matches!(parse_csv_content("x", "\n,,\n"), Err(SheetwiseError::EmptyCsv)));
    }

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("simple"), "simple");
        assert_eq!(escape_csv_field("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv_field("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv_field("-$1,000.00"), "\"-$1,000.00\"");
        assert_eq!(escape_csv_field("-5"), "-5");
    }

    #[test]
    fn test_escape_csv_field_formula_injection() {
        assert_eq!(escape_csv_field("=FOO(1)"), "'=FOO(1)");
        assert_eq!(escape_csv_field(" =1+1"), "' =1+1");
        assert_eq!(escape_csv_field(" \t@cmd"), "' \t@cmd");
    }

    #[test]
    fn test_write_display_csv_pads_rows() {
        let sheet = parse_csv_content("S", "a,b,c\n1\n").unwrap();
        let result = Evaluator::default().evaluate_sheet(&sheet);
        assert_eq!(write_display_csv(&result), "a,b,c\n1,,\n");
    }
}
