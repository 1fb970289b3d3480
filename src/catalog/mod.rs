//! The template catalog: an explicit, passed-in, read-only set of templates.
//!
//! The engine never mutates a catalog. Callers that need to share one across
//! threads wrap it in an `Arc`; `reload` swaps contents only after the new
//! file parsed cleanly.

pub mod template;

pub use template::{Template, TemplateSection};

use crate::compute::error::EvalError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog '{}': {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Invalid catalog: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<Template>) -> Self {
        let catalog = Self { templates };
        catalog.warn_on_shadowed_sections();
        catalog
    }

    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(text)?;
        catalog.warn_on_shadowed_sections();
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;
        let catalog = Self::from_json_str(&text)?;
        info!(path = %path.display(), templates = catalog.templates.len(), "template catalog loaded");
        Ok(catalog)
    }

    /// Replaces the catalog with the contents of `path`. On error the current
    /// contents are kept.
    pub fn reload(&mut self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        *self = Self::load(path)?;
        Ok(())
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Finds a section schema by name. The first template declaring it wins.
    pub fn lookup(&self, section_name: &str) -> Result<&TemplateSection, EvalError> {
        self.templates
            .iter()
            .flat_map(|t| t.contents.iter())
            .find(|s| s.name == section_name)
            .ok_or_else(|| EvalError::TemplateNotFound { section: section_name.to_string() })
    }

    fn warn_on_shadowed_sections(&self) {
        let mut seen = HashSet::new();
        for template in &self.templates {
            for section in &template.contents {
                if !seen.insert(section.name.as_str()) {
                    warn!(template = %template.name, section = %section.name, "section schema shadowed by an earlier template");
                }
            }
        }
    }
}
