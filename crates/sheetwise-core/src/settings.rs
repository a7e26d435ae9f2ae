//! User settings from `config.toml`.
//!
//! ```toml
//! # Rhai files defining extra spreadsheet functions, loaded in order.
//! # Relative paths are resolved against the config file's directory.
//! functions = ["finance.rhai"]
//! # Also load `default.rhai` from the config directory when present.
//! default_functions = true
//! ```

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, SheetwiseError};

/// Largest settings or functions file we will read.
pub const MAX_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub functions: Vec<PathBuf>,
    pub default_functions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            functions: Vec::new(),
            default_functions: true,
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "sheetwise")?;
    Some(proj.config_dir().to_path_buf())
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

pub fn default_functions_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("default.rhai"))
}

/// Read a text file, refusing anything over [`MAX_FILE_BYTES`].
pub fn read_limited(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > MAX_FILE_BYTES {
        return Err(SheetwiseError::TooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            max: MAX_FILE_BYTES,
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Settings> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings.
    ///
    /// An explicit path must exist. Without one, the user config file is
    /// used when present and defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Settings> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.is_file() => path,
                _ => {
                    tracing::debug!("no config file, using default settings");
                    return Ok(Settings::default());
                }
            },
        };

        let mut settings = Settings::from_toml(&read_limited(&path)?)?;
        if let Some(base) = path.parent() {
            settings.resolve_relative_to(base);
        }
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for file in &mut self.functions {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    /// Functions files to load, in order: `default.rhai` (when enabled and
    /// present) followed by the configured list.
    pub fn function_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if self.default_functions {
            if let Some(path) = default_functions_path().filter(|p| p.is_file()) {
                files.push(path);
            }
        }
        files.extend(self.functions.iter().cloned());
        files
    }
}
