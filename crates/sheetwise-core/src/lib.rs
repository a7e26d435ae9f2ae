//! sheetwise-core - Document model, function library, settings and storage.

pub mod document;
pub mod error;
pub mod functions;
pub mod script;
pub mod settings;
pub mod storage;

pub use document::Document;
pub use error::{Result, SheetwiseError};
pub use functions::{builtin_names, builtin_registry, register_builtins};
pub use settings::Settings;

pub use sheetwise_engine::engine::{
    CellRef, Evaluator, FunctionRegistry, Value, Workbook, WorkbookResult,
};
