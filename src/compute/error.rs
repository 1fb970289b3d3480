use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a section (or document) failed to resolve. Every variant is terminal
/// for the unit being evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Value '{value}' references unknown name '{reference}'")]
    UnknownReference { value: String, reference: String },
    #[error("Cyclic dependency: {}", cycle_display(.path))]
    CyclicDependency { path: Vec<String> },
    #[error("Type mismatch at '{value}': {detail}")]
    TypeMismatch { value: String, detail: String },
    #[error("Parse error in rule for '{value}' at offset {offset}: {message}")]
    ParseError { value: String, offset: usize, message: String },
    #[error("Arithmetic error at '{value}': {detail}")]
    Arithmetic { value: String, detail: String },
    #[error("Value name '{name}' is declared more than once in scope")]
    DuplicateValue { name: String },
    #[error("No template section named '{section}'")]
    TemplateNotFound { section: String },
}

/// The machine-readable discriminator of an `EvalError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownReference,
    CyclicDependency,
    TypeMismatch,
    ParseError,
    Arithmetic,
    DuplicateValue,
    TemplateNotFound,
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::UnknownReference { .. } => ErrorKind::UnknownReference,
            EvalError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            EvalError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            EvalError::ParseError { .. } => ErrorKind::ParseError,
            EvalError::Arithmetic { .. } => ErrorKind::Arithmetic,
            EvalError::DuplicateValue { .. } => ErrorKind::DuplicateValue,
            EvalError::TemplateNotFound { .. } => ErrorKind::TemplateNotFound,
        }
    }
}

fn cycle_display(path: &[String]) -> String {
    match path.first() {
        Some(first) => format!("{} -> {}", path.join(" -> "), first),
        None => String::new(),
    }
}
