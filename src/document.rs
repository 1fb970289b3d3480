//! Document-side instance data: documents own sections, sections own their
//! value declarations. There are no back-references; a value finds its
//! neighbours by name through the evaluation environment.

use crate::catalog::{TemplateCatalog, TemplateSection};
use crate::compute::error::EvalError;
use crate::store::{RawRule, RawScalar, RawValue, ResolvedValue, ValueKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of a `defaultParams` key that fixes the kind of a default value.
const KIND_PARAM_PREFIX: &str = "kind.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Name of the template section this was created from. Stored documents
    /// keep only the name; the catalog owns the schema. See [`Section::validate`].
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub values: Vec<RawValue>,
}

impl Section {
    /// Instantiates a section from its schema. A default starting with `=` is
    /// a rule whose formula is the text; anything else is a literal.
    pub fn from_template(schema: &TemplateSection, description: &str) -> Self {
        let values = schema
            .default_values
            .iter()
            .map(|(name, text)| default_declaration(schema, name, text))
            .collect();

        Self { name: schema.name.clone(), description: description.to_string(), content: String::new(), values }
    }

    /// Looks the schema up in `catalog` and instantiates it.
    pub fn instantiate(catalog: &TemplateCatalog, section_name: &str, description: &str) -> Result<Self, EvalError> {
        Ok(Self::from_template(catalog.lookup(section_name)?, description))
    }

    /// Checks that the section still names a schema in `catalog`.
    pub fn validate(&self, catalog: &TemplateCatalog) -> Result<(), EvalError> {
        catalog.lookup(&self.name).map(|_| ())
    }

    pub fn value(&self, name: &str) -> Option<&RawValue> {
        self.values.iter().find(|v| v.name == name)
    }

    /// Inserts the declaration, replacing any existing one of the same name in
    /// place so declaration order is preserved.
    pub fn declare(&mut self, value: RawValue) {
        match self.values.iter_mut().find(|v| v.name == value.name) {
            Some(slot) => *slot = value,
            None => self.values.push(value),
        }
    }

    /// Makes `name` a literal, dropping any rule it had.
    pub fn set_literal(&mut self, name: &str, kind: ValueKind, raw: &str) {
        self.declare(RawValue::literal(name, kind, raw));
    }

    /// Attaches (or replaces) the rule of `name`. A new value is declared
    /// Numeric with an empty fallback.
    pub fn set_rule(&mut self, name: &str, formula: &str) {
        match self.values.iter_mut().find(|v| v.name == name) {
            Some(slot) => {
                slot.rule = Some(RawRule { target_value: name.to_string(), formula: formula.to_string() })
            }
            None => self.values.push(RawValue::with_rule(name, ValueKind::Numeric, "", formula)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        let idx = self.values.iter().position(|v| v.name == name)?;
        Some(self.values.remove(idx))
    }
}

fn default_declaration(schema: &TemplateSection, name: &str, text: &str) -> RawValue {
    let declared = schema
        .default_params
        .get(&format!("{}{}", KIND_PARAM_PREFIX, name))
        .and_then(|k| k.parse::<ValueKind>().ok());

    match text.strip_prefix('=') {
        Some(formula) => RawValue {
            name: name.to_string(),
            kind: declared.unwrap_or(ValueKind::Numeric),
            raw_value: RawScalar::default(),
            rule: Some(RawRule { target_value: name.to_string(), formula: formula.trim().to_string() }),
        },
        None => {
            let inferred = match ResolvedValue::parse(ValueKind::Numeric, text) {
                Some(_) => ValueKind::Numeric,
                None => ValueKind::Text,
            };
            RawValue::literal(name, declared.unwrap_or(inferred), text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Reference to the author record held by the persistence layer.
    pub author: String,
    pub created: DateTime<Utc>,
    #[serde(default, alias = "contents")]
    pub sections: Vec<Section>,
}

impl Document {
    pub fn new(title: &str, author: &str) -> Self {
        Self {
            title: title.to_string(),
            description: String::new(),
            author: author.to_string(),
            created: Utc::now(),
            sections: Vec::new(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Template;
    use std::collections::BTreeMap;

    fn schema() -> TemplateSection {
        TemplateSection {
            name: "Stats".into(),
            render_type: "StatBlock".into(),
            default_params: BTreeMap::from([("kind.Code".to_string(), "Text".to_string())]),
            default_values: BTreeMap::from([
                ("Strength".to_string(), "10".to_string()),
                ("Modifier".to_string(), "= floor((Strength - 10) / 2)".to_string()),
                ("Alignment".to_string(), "Neutral".to_string()),
                ("Code".to_string(), "042".to_string()),
            ]),
        }
    }

    #[test]
    fn test_defaults_become_declarations() {
        let section = Section::from_template(&schema(), "Ability scores");
        assert_eq!(section.name, "Stats");

        let names: Vec<&str> = section.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Alignment", "Code", "Modifier", "Strength"]);

        assert_eq!(section.value("Strength").unwrap().kind, ValueKind::Numeric);
        assert_eq!(section.value("Alignment").unwrap().kind, ValueKind::Text);
        assert_eq!(section.value("Code").unwrap().kind, ValueKind::Text);

        let rule = section.value("Modifier").unwrap().rule.as_ref().unwrap();
        assert_eq!(rule.target_value, "Modifier");
        assert_eq!(rule.formula, "floor((Strength - 10) / 2)");
    }

    #[test]
    fn test_edits_keep_declaration_order() {
        let mut section = Section::from_template(&schema(), "");
        section.set_literal("Alignment", ValueKind::Text, "Chaotic");
        section.set_rule("Strength", "8 + 4");
        section.set_rule("Bonus", "Modifier * 2");
        assert!(section.remove("Code").is_some());
        assert!(section.remove("Code").is_none());

        let names: Vec<&str> = section.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Alignment", "Modifier", "Strength", "Bonus"]);
        assert_eq!(section.value("Strength").unwrap().rule.as_ref().unwrap().formula, "8 + 4");
    }

    #[test]
    fn test_instantiate_unknown_section() {
        let err = Section::instantiate(&TemplateCatalog::default(), "Nope", "").unwrap_err();
        assert_eq!(err, EvalError::TemplateNotFound { section: "Nope".into() });
    }

    #[test]
    fn test_validate_against_catalog() {
        let catalog = TemplateCatalog::new(vec![Template { name: "Monster".into(), contents: vec![schema()] }]);
        let mut section = Section::instantiate(&catalog, "Stats", "").unwrap();
        assert_eq!(section.validate(&catalog), Ok(()));

        section.name = "Renamed".into();
        assert_eq!(section.validate(&catalog), Err(EvalError::TemplateNotFound { section: "Renamed".into() }));
    }

    #[test]
    fn test_document_accepts_persistence_field_names() {
        let json = r#"{"title":"TestingDocument","author":"u-1","created":"2024-01-01T00:00:00Z",
            "contents":[{"name":"TestingSection","values":[
                {"name":"TestingInputValue","kind":"NumericValue","value":"10"}]}]}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(doc.section("TestingSection").unwrap().value("TestingInputValue").is_some());
    }
}
