//! Read-only template schemas as supplied by the template catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The schema of one section kind: its render type and the defaults a new
/// section starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    pub name: String,
    pub render_type: String,
    #[serde(default)]
    pub default_params: BTreeMap<String, String>,
    #[serde(default)]
    pub default_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub contents: Vec<TemplateSection>,
}
