use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Options for one compilation.
///
/// Options are part of the determinism contract: the same tree compiled with
/// the same options always yields the same arena and the same text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Indentation unit of emitted text.
    pub indent: String,

    /// Track the literal kind of simple bindings when choosing between
    /// addition and concatenation (and when offsetting numeric indexes).
    /// When off, only the operands' own syntax is considered.
    pub infer_local_types: bool,

    /// Optional comment line emitted at the top of the output.
    pub header: Option<String>,

    /// Append the task-drain call to units that define async functions.
    pub drain_tasks: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            infer_local_types: true,
            header: None,
            drain_tasks: true,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indentation unit.
    #[must_use]
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Enable or disable binding-level type hints.
    #[must_use]
    pub fn with_infer_local_types(mut self, infer: bool) -> Self {
        self.infer_local_types = infer;
        self
    }

    /// Set the header comment.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_drain_tasks(mut self, drain: bool) -> Self {
        self.drain_tasks = drain;
        self
    }

    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors loading an options file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read options at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse options at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
