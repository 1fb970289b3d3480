//! Evaluation settings, fixed for the duration of an evaluation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Which values a formula may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceScope {
    /// Only values of the formula's own section. Sections evaluate independently.
    #[default]
    Section,
    /// Any value of the document, by bare or `Section.Name` qualified name.
    /// The whole document becomes one unit of work.
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    pub scope: ReferenceScope,
    /// Evaluate independent sections on the rayon pool.
    pub parallel: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { scope: ReferenceScope::Section, parallel: true }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_json_str(&text)?;
        debug!(path = %path.display(), ?config, "loaded evaluation config");
        Ok(config)
    }
}
