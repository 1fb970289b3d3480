//! Turns raw value declarations into resolved values.
//!
//! One evaluation walks `Built -> Sorted -> Evaluating -> Resolved`, or stops
//! in `Failed`. Nothing partial escapes a failed evaluation.

use crate::analysis::{deps, topology, ScopedValue};
use crate::compute::error::{ErrorKind, EvalError};
use crate::compute::ledger::{Ledger, Scope};
use crate::config::{EvalConfig, ReferenceScope};
use crate::display::trace;
use crate::document::{Document, Section};
use crate::store::{NodeId, NodeKind, RawValue, Registry, ResolvedValue, Value};
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

pub type ResolvedValues = BTreeMap<String, ResolvedValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Pending,
    Built,
    Sorted,
    Evaluating,
    Resolved,
    Failed(ErrorKind),
}

/// Evaluates one scope: a section, or a whole document.
pub struct SectionEvaluator<'a> {
    values: Vec<ScopedValue<'a>>,
    phase: Phase,
}

impl<'a> SectionEvaluator<'a> {
    pub fn new(values: Vec<ScopedValue<'a>>) -> Self {
        Self { values, phase: Phase::Pending }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn run(&mut self) -> Result<Evaluation, EvalError> {
        let result = self.drive();
        if let Err(e) = &result {
            self.transition(Phase::Failed(e.kind()));
            warn!(error = %e, "evaluation failed");
        }
        result
    }

    fn transition(&mut self, next: Phase) {
        trace!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }

    fn drive(&mut self) -> Result<Evaluation, EvalError> {
        let registry = deps::build(&self.values)?;
        self.transition(Phase::Built);

        let order = topology::sort(&registry)?;
        self.transition(Phase::Sorted);

        self.transition(Phase::Evaluating);
        let mut ledger = Ledger::new();
        ledger.ensure_capacity(registry.count());

        // Literals seed the environment; they take no part in the order.
        for (i, kind) in registry.kinds.iter().enumerate() {
            if let NodeKind::Literal(value) = kind {
                ledger.insert(NodeId::new(i), value.clone());
            }
        }

        for node_id in order {
            let NodeKind::Formula { kind, expr, .. } = &registry.kinds[node_id.index()] else {
                continue;
            };
            let name = registry.name_of(node_id);

            // The sort guarantees every parent is already in the ledger.
            let result = expr
                .eval(&Scope { registry: &registry, ledger: &ledger })
                .map_err(|e| e.at_value(name))?;
            if result.kind() != *kind {
                return Err(EvalError::TypeMismatch {
                    value: name.to_string(),
                    detail: format!("rule produced {} but the value is declared {}", result.kind(), kind),
                });
            }
            trace!(value = name, result = %result, "rule evaluated");
            ledger.insert(node_id, result);
        }

        self.transition(Phase::Resolved);
        debug!(values = ledger.resolved_count(), "scope resolved");
        Ok(Evaluation { registry, ledger })
    }
}

/// A successful evaluation: the graph it ran over and every resolved value.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub registry: Registry,
    pub ledger: Ledger,
}

impl Evaluation {
    pub fn get(&self, name: &str) -> Option<&ResolvedValue> {
        self.ledger.get(self.registry.lookup(name)?)
    }

    /// All resolved values by bare name.
    pub fn values(&self) -> ResolvedValues {
        self.collect(|_| true)
    }

    /// The resolved values declared by `section` in a document-wide scope.
    pub fn section_values(&self, section: &str) -> ResolvedValues {
        self.collect(|id| self.registry.meta[id.index()].section.as_deref() == Some(section))
    }

    pub fn affected_by(&self, changed: &str) -> BTreeSet<String> {
        topology::affected_by(&self.registry, changed)
    }

    /// A dependency tree for one value, or `None` if the name is not in scope.
    pub fn trace(&self, name: &str) -> Option<String> {
        let id = self.registry.lookup(name)?;
        Some(trace::format_trace(&self.registry, &self.ledger, id))
    }

    fn collect(&self, keep: impl Fn(NodeId) -> bool) -> ResolvedValues {
        (0..self.registry.count())
            .map(NodeId::new)
            .filter(|&id| keep(id))
            .filter_map(|id| Some((self.registry.name_of(id).to_string(), self.ledger.get(id)?.clone())))
            .collect()
    }
}

/// The boundary form of an evaluation outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionEvaluationResult {
    Resolved(ResolvedValues),
    Failed(EvalError),
}

impl SectionEvaluationResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SectionEvaluationResult::Resolved(_))
    }

    pub fn values(&self) -> Option<&ResolvedValues> {
        match self {
            SectionEvaluationResult::Resolved(values) => Some(values),
            SectionEvaluationResult::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&EvalError> {
        match self {
            SectionEvaluationResult::Resolved(_) => None,
            SectionEvaluationResult::Failed(e) => Some(e),
        }
    }
}

impl From<Result<ResolvedValues, EvalError>> for SectionEvaluationResult {
    fn from(result: Result<ResolvedValues, EvalError>) -> Self {
        match result {
            Ok(values) => SectionEvaluationResult::Resolved(values),
            Err(e) => SectionEvaluationResult::Failed(e),
        }
    }
}

impl Serialize for SectionEvaluationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SectionEvaluationResult::Resolved(values) => {
                let mut s = serializer.serialize_struct("SectionEvaluationResult", 2)?;
                s.serialize_field("status", "resolved")?;
                s.serialize_field("values", values)?;
                s.end()
            }
            SectionEvaluationResult::Failed(e) => {
                let mut s = serializer.serialize_struct("SectionEvaluationResult", 3)?;
                s.serialize_field("status", "failed")?;
                s.serialize_field("kind", &e.kind())?;
                s.serialize_field("message", &e.to_string())?;
                s.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionReport {
    pub section: String,
    pub result: SectionEvaluationResult,
}

/// Validates raw declarations and evaluates them as one section scope.
pub fn evaluate_values(raws: &[RawValue]) -> Result<Evaluation, EvalError> {
    let values = raws.iter().map(Value::from_raw).collect::<Result<Vec<_>, _>>()?;
    SectionEvaluator::new(values.iter().map(ScopedValue::local).collect()).run()
}

pub struct Engine {
    config: EvalConfig,
}

impl Engine {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn evaluate_section(&self, section: &Section) -> SectionEvaluationResult {
        debug!(section = %section.name, values = section.values.len(), "evaluating section");
        evaluate_values(&section.values).map(|e| e.values()).into()
    }

    /// Evaluates every section, reporting results in document order.
    pub fn evaluate_document(&self, document: &Document) -> Vec<SectionReport> {
        debug!(title = %document.title, sections = document.sections.len(), scope = ?self.config.scope, "evaluating document");
        match self.config.scope {
            ReferenceScope::Section => {
                let report = |s: &Section| SectionReport { section: s.name.clone(), result: self.evaluate_section(s) };
                if self.config.parallel {
                    document.sections.par_iter().map(report).collect()
                } else {
                    document.sections.iter().map(report).collect()
                }
            }
            ReferenceScope::Document => match self.evaluate_document_scope(document) {
                Ok(evaluation) => document
                    .sections
                    .iter()
                    .map(|s| SectionReport {
                        section: s.name.clone(),
                        result: SectionEvaluationResult::Resolved(evaluation.section_values(&s.name)),
                    })
                    .collect(),
                Err(e) => document
                    .sections
                    .iter()
                    .map(|s| SectionReport { section: s.name.clone(), result: SectionEvaluationResult::Failed(e.clone()) })
                    .collect(),
            },
        }
    }

    /// Evaluates the union of all sections as a single scope.
    pub fn evaluate_document_scope(&self, document: &Document) -> Result<Evaluation, EvalError> {
        let mut per_section = Vec::with_capacity(document.sections.len());
        for section in &document.sections {
            let values = section.values.iter().map(Value::from_raw).collect::<Result<Vec<_>, _>>()?;
            per_section.push((section.name.as_str(), values));
        }

        let scoped = per_section
            .iter()
            .flat_map(|(section, values)| values.iter().map(move |value| ScopedValue { section: Some(*section), value }))
            .collect();
        SectionEvaluator::new(scoped).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ValueKind;

    fn lit(name: &str, raw: &str) -> RawValue {
        RawValue::literal(name, ValueKind::Numeric, raw)
    }

    fn rule(name: &str, formula: &str) -> RawValue {
        RawValue::with_rule(name, ValueKind::Numeric, "0", formula)
    }

    fn run(raws: &[RawValue]) -> (Phase, Result<Evaluation, EvalError>) {
        let values: Vec<Value> = raws.iter().map(|r| Value::from_raw(r).unwrap()).collect();
        let mut evaluator = SectionEvaluator::new(values.iter().map(ScopedValue::local).collect());
        let result = evaluator.run();
        (evaluator.phase().clone(), result)
    }

    #[test]
    fn test_phase_reaches_resolved() {
        let (phase, result) = run(&[lit("A", "5"), rule("B", "A + 2")]);
        assert_eq!(phase, Phase::Resolved);
        assert_eq!(result.unwrap().get("B"), Some(&ResolvedValue::Numeric(7.0)));
    }

    #[test]
    fn test_phase_records_failure_kind() {
        let (phase, result) = run(&[rule("A", "B"), rule("B", "A")]);
        assert_eq!(phase, Phase::Failed(ErrorKind::CyclicDependency));
        assert!(result.is_err());

        let (phase, _) = run(&[lit("A", "1"), rule("B", "A / 0")]);
        assert_eq!(phase, Phase::Failed(ErrorKind::Arithmetic));
    }

    #[test]
    fn test_result_kind_must_match_declaration() {
        let raws = [
            RawValue::literal("Name", ValueKind::Text, "Ogre"),
            RawValue::with_rule("Label", ValueKind::Numeric, "0", r#"Name + " Mage""#),
        ];
        let err = evaluate_values(&raws).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("rule produced Text"), "{}", err);
    }

    #[test]
    fn test_late_failure_exposes_nothing() {
        let section = Section {
            name: "S".into(),
            description: String::new(),
            content: String::new(),
            values: vec![lit("A", "1"), rule("B", "A + 1"), rule("C", "B / (A - 1)")],
        };
        let result = Engine::new(EvalConfig::default()).evaluate_section(&section);
        assert!(result.values().is_none());
        assert_eq!(result.error().map(EvalError::kind), Some(ErrorKind::Arithmetic));
    }

    #[test]
    fn test_failed_result_wire_shape() {
        let result = SectionEvaluationResult::Failed(EvalError::UnknownReference {
            value: "B".into(),
            reference: "Z".into(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "UnknownReference");
        assert_eq!(json["message"], "Value 'B' references unknown name 'Z'");
    }
}
