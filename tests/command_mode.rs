//! Integration tests for the sheetwise binary (file mode and -c/--command)

use std::path::PathBuf;
use std::process::Command;

fn run(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_sheetwise"))
        // Tests must be deterministic and not depend on a user's config directory.
        .arg("--no-default-functions")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute sheetwise");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn temp_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("sheetwise_cli_{}_{}", std::process::id(), name));
    std::fs::write(&path, content).expect("write temp file");
    path
}

const ANNUITY: &str = r#"[
  { "name": "Annuity", "rows": [
    ["Discounted annuity"],
    ["Payment", { "value": 1000, "format": "$#,##0.00" }],
    ["Annual rate", { "value": 0.05, "format": "0.00%" }],
    ["Monthly rate", "=B3/12"],
    ["Present value", { "value": "=SUM(C9:C20)", "format": "$#,##0.00" }],
    [],
    [],
    ["Period", "Payment", "Discounted"],
    [1, "=$B$2", "=B9/(1+$B$4)^A9"],
    [2, "=$B$2", "=B10/(1+$B$4)^A10"],
    [3, "=$B$2", "=B11/(1+$B$4)^A11"],
    [4, "=$B$2", "=B12/(1+$B$4)^A12"],
    [5, "=$B$2", "=B13/(1+$B$4)^A13"],
    [6, "=$B$2", "=B14/(1+$B$4)^A14"],
    [7, "=$B$2", "=B15/(1+$B$4)^A15"],
    [8, "=$B$2", "=B16/(1+$B$4)^A16"],
    [9, "=$B$2", "=B17/(1+$B$4)^A17"],
    [10, "=$B$2", "=B18/(1+$B$4)^A18"],
    [11, "=$B$2", "=B19/(1+$B$4)^A19"],
    [12, "=$B$2", "=B20/(1+$B$4)^A20"]
  ] },
  { "name": "Loan", "rows": [
    ["=-PMT(0.005, 360, 250000)", "=Annuity!B5"]
  ] }
]"#;

fn expected_present_value() -> f64 {
    let rate = 0.05 / 12.0;
    (1..=12).map(|k| 1000.0 / (1.0f64 + rate).powi(k)).sum()
}

fn money(n: f64) -> String {
    let cents = format!("{:.2}", n);
    let (whole, frac) = cents.split_once('.').unwrap();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${}.{}", grouped, frac)
}

#[test]
fn test_basic_arithmetic() {
    let (stdout, _, code) = run(&["-c", "5 + 3"]);
    assert_eq!(stdout.trim(), "8");
    assert_eq!(code, 0);
}

#[test]
fn test_builtin_functions() {
    let (stdout, _, code) = run(&["-c", "=SUM(1, 2, MAX(3, 4)) * 2"]);
    assert_eq!(stdout.trim(), "14");
    assert_eq!(code, 0);
}

#[test]
fn test_negated_payment() {
    let (stdout, _, code) = run(&["-c", "=-PMT(0.005,360,250000)"]);
    let value: f64 = stdout.trim().parse().expect("numeric output");
    assert!((value + 1498.876).abs() < 0.001, "{value}");
    assert_eq!(code, 0);
}

#[test]
fn test_unknown_function_exits_nonzero() {
    let (stdout, stderr, code) = run(&["-c", "=1+NOPE(2)"]);
    assert_eq!(stdout.trim(), "=1+NOPE(2)");
    assert!(stderr.contains("Unknown function"), "{stderr}");
    assert_eq!(code, 1);
}

#[test]
fn test_error_marker_exits_nonzero() {
    let (stdout, _, code) = run(&["-c", "=SQRT(-1)"]);
    assert_eq!(stdout.trim(), "#NUM!");
    assert_eq!(code, 1);
}

#[test]
fn test_file_mode_prints_display_grids() {
    let path = temp_file("annuity.json", ANNUITY);
    let (stdout, stderr, code) = run(&[path.to_str().unwrap()]);
    assert_eq!(code, 0, "{stderr}");

    let expected = money(expected_present_value());
    assert!(stdout.contains("== Annuity =="));
    assert!(stdout.contains("== Loan =="));
    assert!(stdout.contains(&format!("Present value\t{}", expected)), "{stdout}");
    assert!(stdout.contains("Annual rate\t5.00%"));
    assert!(stdout.contains("1\t1000\t995.85"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_sheet_filter_and_cross_sheet_reference() {
    let path = temp_file("sheet.json", ANNUITY);
    let (stdout, _, code) = run(&["--sheet", "Loan", path.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("=="));
    let fields: Vec<&str> = stdout.trim().split('\t').collect();
    let payment: f64 = fields[0].parse().unwrap();
    let present: f64 = fields[1].parse().unwrap();
    assert!((payment + 1498.876).abs() < 0.001);
    assert!((present - expected_present_value()).abs() < 1e-6);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_unknown_sheet_is_an_error() {
    let path = temp_file("nosheet.json", ANNUITY);
    let (_, stderr, code) = run(&["-s", "Missing", path.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Missing"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_json_output() {
    let path = temp_file("out.json", ANNUITY);
    let (stdout, _, code) = run(&["--json", "-s", "Annuity", path.to_str().unwrap()]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["name"], "Annuity");
    let total = json[0]["values"][4][1].as_f64().unwrap();
    assert!((total - expected_present_value()).abs() < 1e-6);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_csv_round_trip() {
    let input = temp_file("in.csv", "Item,Cost\nRent,\"$1,200\"\nFood,300\nTotal,=SUM(B2:B3)\n");
    let output = std::env::temp_dir().join(format!("sheetwise_cli_{}_out.csv", std::process::id()));
    let (stdout, _, code) = run(&["-o", output.to_str().unwrap(), input.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Exported to"));
    let written = std::fs::read_to_string(&output).unwrap();
    // Typed "$1,200" keeps its spelling but still sums as 1200.
    assert_eq!(written, "Item,Cost\nRent,\"$1,200\"\nFood,300\nTotal,1500\n");
    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}

#[test]
fn test_output_needs_one_sheet() {
    let path = temp_file("multi.json", ANNUITY);
    let out = std::env::temp_dir().join(format!("sheetwise_cli_{}_multi.csv", std::process::id()));
    let (_, stderr, code) = run(&["-o", out.to_str().unwrap(), path.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--sheet"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_custom_functions_file() {
    let functions = temp_file("fns.rhai", "fn DOUBLE(x) { x * 2.0 }");
    let (stdout, _, code) = run(&["-f", functions.to_str().unwrap(), "-c", "=DOUBLE(21)"]);
    assert_eq!(stdout.trim(), "42");
    assert_eq!(code, 0);
    let _ = std::fs::remove_file(&functions);
}

#[test]
fn test_broken_functions_file_fails() {
    let functions = temp_file("broken.rhai", "fn BROKEN( {");
    let (_, stderr, code) = run(&["-f", functions.to_str().unwrap(), "-c", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("compile"), "{stderr}");
    let _ = std::fs::remove_file(&functions);
}

#[test]
fn test_help_and_bad_flags() {
    let (_, stderr, code) = run(&["--help"]);
    assert_eq!(code, 0);
    assert!(stderr.contains("Usage: sheetwise"));

    let (_, stderr, code) = run(&["--bogus"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown option"));

    let (_, stderr, code) = run(&[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no input file"));
}
