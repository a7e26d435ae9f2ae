//! Error types for Sheetwise core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, saving and configuring documents.
///
/// Formula failures never surface here; they stay local to their cell.
#[derive(Error, Debug)]
pub enum SheetwiseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Rhai compile error: {0}")]
    RhaiCompile(String),

    #[error("No sheet named {0:?}")]
    NoSuchSheet(String),

    #[error("No file path set")]
    NoFilePath,

    #[error("CSV file is empty")]
    EmptyCsv,

    #[error("Refusing to read {path}: file too large ({size} bytes, max {max})")]
    TooLarge { path: PathBuf, size: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, SheetwiseError>;
