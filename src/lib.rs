//! Value and rule evaluation for template-backed document sections.
//!
//! A section declares named values. Some are literals, others are derived by a
//! rule whose formula references other values in scope. This crate builds the
//! dependency graph of those declarations, rejects unknown references and
//! cycles, and resolves every value in dependency order. It performs no I/O
//! during evaluation and holds no global state; the template catalog and the
//! configuration are passed in explicitly.

pub mod analysis;
pub mod catalog;
pub mod compute;
pub mod config;
pub mod display;
pub mod document;
pub mod formula;
pub mod store;

pub use catalog::{Template, TemplateCatalog, TemplateSection};
pub use compute::{evaluate_values, Engine, ErrorKind, EvalError, Evaluation, SectionEvaluationResult, SectionReport};
pub use config::{EvalConfig, ReferenceScope};
pub use document::{Document, Section};
pub use store::{RawRule, RawScalar, RawValue, ResolvedValue, Value, ValueKind};
