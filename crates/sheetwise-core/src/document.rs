//! Document state (UI-agnostic): a workbook plus the functions it is evaluated with.

use sheetwise_engine::engine::{
    Evaluator, FunctionRegistry, Sheet, Value, Workbook, WorkbookResult,
};
use std::path::{Path, PathBuf};

use crate::error::{Result, SheetwiseError};
use crate::functions::builtin_registry;
use crate::script::ScriptFunctions;
use crate::settings::read_limited;
use crate::storage::{parse_csv, parse_workbook, write_workbook};

pub struct Document {
    pub workbook: Workbook,
    /// File the workbook was loaded from or last saved to
    pub path: Option<PathBuf>,
    /// Loaded Rhai functions files, in load order
    pub functions_files: Vec<PathBuf>,
    /// Concatenated source of all functions files
    custom_functions: Option<String>,
    evaluator: Evaluator,
}

impl Document {
    /// An empty document with the built-in functions.
    ///
    /// This constructor is side-effect free: it does not touch the filesystem.
    pub fn new() -> Self {
        Document {
            workbook: Workbook::new(),
            path: None,
            functions_files: Vec::new(),
            custom_functions: None,
            evaluator: Evaluator::new(builtin_registry()),
        }
    }

    /// A document holding an existing workbook.
    pub fn with_workbook(workbook: Workbook) -> Self {
        Document {
            workbook,
            ..Self::new()
        }
    }

    /// Open a `.csv` (one sheet) or JSON workbook file.
    pub fn open(path: &Path) -> Result<Self> {
        let mut doc = Self::new();
        doc.load_file(path)?;
        Ok(doc)
    }

    /// Replace the workbook with a file's contents. Functions stay loaded.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        self.workbook = if is_csv {
            Workbook::with_sheet(parse_csv(path)?)
        } else {
            parse_workbook(path)?
        };
        self.path = Some(path.to_path_buf());
        tracing::debug!(
            path = %path.display(),
            sheets = self.workbook.sheets.len(),
            "loaded workbook"
        );
        Ok(())
    }

    /// Save as JSON to `path`, or to the current path when None.
    /// Returns the path saved to.
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => self.path.clone().ok_or(SheetwiseError::NoFilePath)?,
        };
        write_workbook(&target, &self.workbook)?;
        self.path = Some(target.clone());
        Ok(target)
    }

    /// Load custom Rhai functions from a file (appends to existing functions).
    /// Returns the canonical path loaded.
    pub fn load_functions(&mut self, path: &Path) -> Result<PathBuf> {
        let path_buf = std::fs::canonicalize(path)?;
        let content = read_limited(&path_buf)?;

        if self.functions_files.contains(&path_buf) {
            // Already loaded: keep current compiled state unchanged.
            return Ok(path_buf);
        }

        let merged = match &self.custom_functions {
            Some(existing) => format!("{}\n\n{}", existing, content),
            None => content,
        };

        // Compile before touching any state so failures leave the document as it was.
        let registry = registry_with(&merged)?;

        self.functions_files.push(path_buf.clone());
        self.custom_functions = Some(merged);
        self.evaluator = Evaluator::new(registry);
        tracing::debug!(path = %path_buf.display(), "loaded functions");
        Ok(path_buf)
    }

    /// Re-read every loaded functions file. Returns the number of files reloaded.
    pub fn reload_functions(&mut self) -> Result<usize> {
        let mut merged = String::new();
        for (idx, path) in self.functions_files.iter().enumerate() {
            if idx > 0 {
                merged.push_str("\n\n");
            }
            merged.push_str(&read_limited(path)?);
        }

        let registry = registry_with(&merged)?;
        self.custom_functions = (!self.functions_files.is_empty()).then_some(merged);
        self.evaluator = Evaluator::new(registry);
        Ok(self.functions_files.len())
    }

    pub fn registry(&self) -> &FunctionRegistry {
        self.evaluator.registry()
    }

    /// Evaluate the whole workbook. Every call is an independent pass.
    pub fn evaluate(&self) -> WorkbookResult {
        self.evaluator.evaluate_workbook(&self.workbook)
    }

    /// Evaluate a formula against the workbook. Unqualified references
    /// resolve on `sheet` (the first sheet when None).
    pub fn evaluate_formula(&self, sheet: Option<&str>, formula: &str) -> Result<Value> {
        let index = match sheet {
            Some(name) => self
                .workbook
                .sheet_index(name)
                .ok_or_else(|| SheetwiseError::NoSuchSheet(name.to_string()))?,
            None => 0,
        };
        Ok(self
            .evaluator
            .evaluate_formula(&self.workbook, index, formula))
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.workbook
            .sheet(name)
            .ok_or_else(|| SheetwiseError::NoSuchSheet(name.to_string()))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-ins plus the functions defined in `source`.
fn registry_with(source: &str) -> Result<FunctionRegistry> {
    let mut registry = builtin_registry();
    if !source.trim().is_empty() {
        ScriptFunctions::compile(source)?.register(&mut registry);
    }
    Ok(registry)
}
