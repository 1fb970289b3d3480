//! types.rs
//! The value model: raw declarations as they arrive from persistence, and the
//! validated `Value` sum type the engine works with.

use crate::compute::error::EvalError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// The declared type of a value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(alias = "NumericValue", alias = "NumericRuleValue")]
    Numeric,
    #[serde(alias = "TextValue", alias = "TextRuleValue")]
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Numeric => f.write_str("Numeric"),
            ValueKind::Text => f.write_str("Text"),
        }
    }
}

impl std::str::FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Numeric" | "NumericValue" | "NumericRuleValue" => Ok(ValueKind::Numeric),
            "Text" | "TextValue" | "TextRuleValue" => Ok(ValueKind::Text),
            other => Err(format!("Unknown value kind: '{}'", other)),
        }
    }
}

/// A computed result. Serializes as `{ "kind": ..., "value": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ResolvedValue {
    Numeric(f64),
    Text(String),
}

impl ResolvedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ResolvedValue::Numeric(_) => ValueKind::Numeric,
            ResolvedValue::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResolvedValue::Numeric(n) => Some(*n),
            ResolvedValue::Text(_) => None,
        }
    }

    /// Parses raw text into the given kind. Numeric parsing trims whitespace;
    /// text is taken verbatim.
    pub fn parse(kind: ValueKind, raw: &str) -> Option<Self> {
        match kind {
            ValueKind::Numeric => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ResolvedValue::Numeric),
            ValueKind::Text => Some(ResolvedValue::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Numeric(n) => write!(f, "{}", n),
            ResolvedValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// `rawValue` arrives either as a string or as a bare JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Number(f64),
    Text(String),
}

impl RawScalar {
    pub fn as_text(&self) -> String {
        match self {
            RawScalar::Number(n) => n.to_string(),
            RawScalar::Text(s) => s.clone(),
        }
    }
}

impl Default for RawScalar {
    fn default() -> Self { RawScalar::Text(String::new()) }
}

impl From<&str> for RawScalar {
    fn from(s: &str) -> Self { RawScalar::Text(s.to_string()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(alias = "target_value")]
    pub target_value: String,
    #[serde(alias = "rule")]
    pub formula: String,
}

/// One value declaration as stored by the persistence/API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValue {
    pub name: String,
    #[serde(alias = "type")]
    pub kind: ValueKind,
    #[serde(default, alias = "value")]
    pub raw_value: RawScalar,
    /// Persisted documents store a `rules` list; a value carries at most one.
    #[serde(default, alias = "rules", deserialize_with = "one_rule", skip_serializing_if = "Option::is_none")]
    pub rule: Option<RawRule>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleField {
    One(RawRule),
    Many(Vec<RawRule>),
}

fn one_rule<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<RawRule>, D::Error> {
    match Option::<RuleField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RuleField::One(rule)) => Ok(Some(rule)),
        Some(RuleField::Many(mut rules)) => match rules.len() {
            0 | 1 => Ok(rules.pop()),
            n => Err(serde::de::Error::custom(format!("a value carries at most one rule, found {}", n))),
        },
    }
}

impl RawValue {
    pub fn literal(name: &str, kind: ValueKind, raw: &str) -> Self {
        Self { name: name.into(), kind, raw_value: raw.into(), rule: None }
    }

    pub fn with_rule(name: &str, kind: ValueKind, raw: &str, formula: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            raw_value: raw.into(),
            rule: Some(RawRule { target_value: name.into(), formula: formula.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub target_value: String,
    pub formula: String,
}

/// A validated value declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Parsed at construction; needs no resolution.
    Literal { name: String, value: ResolvedValue },
    /// Resolved by evaluating `rule`. `raw` is kept as the fallback result.
    RuleDerived { name: String, kind: ValueKind, raw: String, rule: Rule },
}

impl Value {
    /// Validates a raw declaration. Literals are parsed into their kind
    /// immediately; rules must target their owning value.
    pub fn from_raw(raw: &RawValue) -> Result<Self, EvalError> {
        let text = raw.raw_value.as_text();
        match &raw.rule {
            None => {
                let value = ResolvedValue::parse(raw.kind, &text).ok_or_else(|| EvalError::TypeMismatch {
                    value: raw.name.clone(),
                    detail: format!("'{}' is not a valid {} literal", text, raw.kind),
                })?;
                Ok(Value::Literal { name: raw.name.clone(), value })
            }
            Some(rule) => {
                if rule.target_value != raw.name {
                    return Err(EvalError::TypeMismatch {
                        value: raw.name.clone(),
                        detail: format!(
                            "rule targets '{}' but is attached to '{}'",
                            rule.target_value, raw.name
                        ),
                    });
                }
                Ok(Value::RuleDerived {
                    name: raw.name.clone(),
                    kind: raw.kind,
                    raw: text,
                    rule: Rule { target_value: rule.target_value.clone(), formula: rule.formula.clone() },
                })
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Value::Literal { name, .. } | Value::RuleDerived { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Literal { value, .. } => value.kind(),
            Value::RuleDerived { kind, .. } => *kind,
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        match self {
            Value::Literal { .. } => None,
            Value::RuleDerived { rule, .. } => Some(rule),
        }
    }

    /// The raw text of a rule-derived value read as its declared kind, for
    /// display while an evaluation is pending.
    pub fn fallback(&self) -> Option<ResolvedValue> {
        match self {
            Value::Literal { value, .. } => Some(value.clone()),
            Value::RuleDerived { kind, raw, .. } => ResolvedValue::parse(*kind, raw),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub name: String,
    /// Owning section, when the graph spans a whole document.
    pub section: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10", 10.0)]
    #[case(" 2.5 ", 2.5)]
    #[case("-3e2", -300.0)]
    fn test_numeric_literal_parses(#[case] raw: &str, #[case] expected: f64) {
        let v = Value::from_raw(&RawValue::literal("A", ValueKind::Numeric, raw)).unwrap();
        assert_eq!(v, Value::Literal { name: "A".into(), value: ResolvedValue::Numeric(expected) });
    }

    #[rstest]
    #[case("ten")]
    #[case("")]
    #[case("NaN")]
    fn test_bad_numeric_literal_is_type_mismatch(#[case] raw: &str) {
        let err = Value::from_raw(&RawValue::literal("A", ValueKind::Numeric, raw)).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { ref value, .. } if value == "A"));
    }

    #[test]
    fn test_rule_target_mismatch() {
        let mut raw = RawValue::with_rule("Y", ValueKind::Numeric, "0", "1");
        raw.rule.as_mut().unwrap().target_value = "X".into();
        let err = Value::from_raw(&raw).unwrap_err();
        assert!(err.to_string().contains("targets 'X'"), "Msg: {}", err);
    }

    #[test]
    fn test_rule_value_keeps_fallback() {
        let v = Value::from_raw(&RawValue::with_rule("B", ValueKind::Numeric, "7", "A + 2")).unwrap();
        assert_eq!(v.fallback(), Some(ResolvedValue::Numeric(7.0)));
        assert_eq!(v.rule().map(|r| r.formula.as_str()), Some("A + 2"));

        let v = Value::from_raw(&RawValue::with_rule("B", ValueKind::Numeric, "", "A")).unwrap();
        assert_eq!(v.fallback(), None);
    }

    #[test]
    fn test_raw_value_accepts_persistence_spellings() {
        let json = r#"{"name":"TestingValue","kind":"NumericRuleValue","value":"10",
                       "rule":{"targetValue":"TestingValue","rule":"10"}}"#;
        let raw: RawValue = serde_json::from_str(json).unwrap();
        assert_eq!(raw.kind, ValueKind::Numeric);
        assert_eq!(raw.rule.unwrap().formula, "10");

        let raw: RawValue = serde_json::from_str(r#"{"name":"N","kind":"Numeric","rawValue":4}"#).unwrap();
        assert_eq!(raw.raw_value, RawScalar::Number(4.0));
    }

    #[test]
    fn test_raw_value_accepts_stored_document_shape() {
        let json = r#"{"name":"TestingValue","type":"NumericRuleValue",
                       "rules":[{"target_value":"TestingValue","rule":"10"}],"value":"10"}"#;
        let raw: RawValue = serde_json::from_str(json).unwrap();
        assert_eq!(raw.kind, ValueKind::Numeric);
        assert_eq!(raw.rule, Some(RawRule { target_value: "TestingValue".into(), formula: "10".into() }));
        assert!(Value::from_raw(&raw).unwrap().rule().is_some());

        let raw: RawValue = serde_json::from_str(r#"{"name":"T","type":"TextValue","rules":[],"value":"x"}"#).unwrap();
        assert_eq!(raw.rule, None);

        let two = r#"{"name":"A","type":"Numeric","rules":[
                      {"targetValue":"A","rule":"1"},{"targetValue":"A","rule":"2"}]}"#;
        let err = serde_json::from_str::<RawValue>(two).unwrap_err();
        assert!(err.to_string().contains("at most one rule"), "{}", err);
    }

    #[test]
    fn test_resolved_value_wire_shape() {
        let json = serde_json::to_string(&ResolvedValue::Numeric(7.0)).unwrap();
        assert_eq!(json, r#"{"kind":"Numeric","value":7.0}"#);
    }
}
