//! Evaluates a scope's dependency graph into resolved values.
pub mod engine;
pub mod error;
pub mod ledger;

pub use engine::{
    evaluate_values, Engine, Evaluation, Phase, ResolvedValues, SectionEvaluationResult, SectionEvaluator,
    SectionReport,
};
pub use error::{ErrorKind, EvalError};
pub use ledger::Ledger;
