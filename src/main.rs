//! Sheetwise - evaluate spreadsheet workbooks from the command line

use anyhow::{Context, bail};
use sheetwise_core::storage::{results_to_json, write_display_csv};
use sheetwise_core::{Document, Settings, Value, WorkbookResult};
use sheetwise_engine::engine::{SheetResult, format_value};
use std::env;
use std::path::PathBuf;

fn print_usage() {
    eprintln!("Usage: sheetwise [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Workbook to evaluate (.json, or .csv for one sheet)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --sheet <NAME>        Only output this sheet");
    eprintln!("  -o, --output <FILE>       Write display values as CSV (one sheet)");
    eprintln!("  --json                    Print raw values and display strings as JSON");
    eprintln!("  -c, --command <FORMULA>   Evaluate one formula and print the result");
    eprintln!("  -f, --functions <FILE>    Load custom Rhai functions (can be repeated)");
    eprintln!("  --no-default-functions    Skip default.rhai and the config's functions");
    eprintln!("  --config <FILE>           Read settings from this TOML file");
    eprintln!("  -h, --help                Print help");
    eprintln!();
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=sheetwise_engine=debug) for diagnostics.");
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    file: Option<PathBuf>,
    sheet: Option<String>,
    output: Option<PathBuf>,
    json: bool,
    command: Option<String>,
    functions: Vec<PathBuf>,
    no_default_functions: bool,
    config: Option<PathBuf>,
    help: bool,
}

/// The argument after `args[*i]`, advancing `i` past it.
fn take_value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} requires a value", name))
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => opts.help = true,
            "-s" | "--sheet" => opts.sheet = Some(take_value(args, &mut i, "--sheet")?),
            "-o" | "--output" => {
                opts.output = Some(PathBuf::from(take_value(args, &mut i, "--output")?));
            }
            "--json" => opts.json = true,
            "-c" | "--command" => opts.command = Some(take_value(args, &mut i, "--command")?),
            "-f" | "--functions" => {
                opts.functions.push(PathBuf::from(take_value(args, &mut i, "--functions")?));
            }
            "--no-default-functions" => opts.no_default_functions = true,
            "--config" => opts.config = Some(PathBuf::from(take_value(args, &mut i, "--config")?)),
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if opts.file.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                opts.file = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }
    Ok(opts)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sheetwise=warn,sheetwise_core=warn,sheetwise_engine=warn".into()
            }),
        )
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            std::process::exit(1);
        }
    };
    if opts.help {
        print_usage();
        return;
    }

    init_tracing();

    match run(opts) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns Ok(false) when a command produced an error value.
fn run(opts: Options) -> anyhow::Result<bool> {
    let mut doc = match &opts.file {
        Some(path) => Document::open(path).with_context(|| format!("opening {}", path.display()))?,
        None if opts.command.is_some() => Document::new(),
        None => bail!("no input file (see --help)"),
    };
    load_functions(&mut doc, &opts)?;

    if let Some(formula) = &opts.command {
        let value = doc.evaluate_formula(opts.sheet.as_deref(), formula)?;
        println!("{}", format_value(&value, None));
        return Ok(!is_failure(&value));
    }

    let results = doc.evaluate();
    let selected: Vec<&SheetResult> = match &opts.sheet {
        Some(name) => {
            doc.sheet(name)?;
            results.sheet(name).into_iter().collect()
        }
        None => results.sheets.iter().collect(),
    };

    if let Some(output) = &opts.output {
        let [sheet] = selected.as_slice() else {
            bail!("--output writes one sheet; choose it with --sheet");
        };
        std::fs::write(output, write_display_csv(sheet))
            .with_context(|| format!("writing {}", output.display()))?;
        println!("Exported to {}", output.display());
        return Ok(true);
    }

    if opts.json {
        let subset = WorkbookResult {
            sheets: selected.into_iter().cloned().collect(),
        };
        println!("{}", results_to_json(&subset)?);
        return Ok(true);
    }

    let headers = selected.len() > 1;
    for (idx, sheet) in selected.iter().enumerate() {
        if headers {
            if idx > 0 {
                println!();
            }
            println!("== {} ==", sheet.name);
        }
        for row in &sheet.display {
            println!("{}", row.join("\t"));
        }
    }
    Ok(true)
}

fn load_functions(doc: &mut Document, opts: &Options) -> anyhow::Result<()> {
    if !opts.no_default_functions {
        let settings = Settings::load(opts.config.as_deref())?;
        for path in settings.function_files() {
            // Configured files only warn on failure.
            if let Err(e) = doc.load_functions(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to load functions file");
            }
        }
    }
    for path in &opts.functions {
        doc.load_functions(path)
            .with_context(|| format!("loading functions from {}", path.display()))?;
    }
    Ok(())
}

/// Error markers and formulas left unresolved.
fn is_failure(value: &Value) -> bool {
    match value {
        Value::Error(_) => true,
        Value::Text(s) => s.starts_with('='),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("sheetwise")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_flags_and_file() {
        let opts = parse_args(&args(&[
            "-s", "Loan", "--json", "-f", "a.rhai", "-f", "b.rhai", "book.json",
        ]))
        .unwrap();
        assert_eq!(opts.sheet.as_deref(), Some("Loan"));
        assert!(opts.json);
        assert_eq!(opts.functions, vec![PathBuf::from("a.rhai"), PathBuf::from("b.rhai")]);
        assert_eq!(opts.file, Some(PathBuf::from("book.json")));
    }

    #[test]
    fn missing_values_and_unknown_flags_are_errors() {
        assert!(parse_args(&args(&["-c"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert!(parse_args(&args(&["a.json", "b.json"])).is_err());
    }

    #[test]
    fn command_values_may_start_with_a_dash() {
        let opts = parse_args(&args(&["-c", "-PMT(0.005,360,250000)"])).unwrap();
        assert_eq!(opts.command.as_deref(), Some("-PMT(0.005,360,250000)"));
    }

    #[test]
    fn failures_are_markers_and_formula_text() {
        assert!(is_failure(&Value::Error(sheetwise_engine::engine::CellError::Cycle)));
        assert!(is_failure(&Value::from("=FOO(1)")));
        assert!(!is_failure(&Value::from("text")));
        assert!(!is_failure(&Value::Number(1.0)));
    }
}
