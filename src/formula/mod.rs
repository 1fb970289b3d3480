//! The formula language of rules: lexing, parsing and evaluation.
//!
//! Formulas are small arithmetic expressions over numeric literals, string
//! literals, value references and a handful of built-in functions. Evaluation
//! is pure: the same expression over the same environment always yields the
//! same result.

pub use self::ast::{BinaryOp, Builtin, Expr, UnaryOp};
pub use self::error::FormulaError;
pub use self::eval::{evaluate, Environment};
pub use self::parser::parse;

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
