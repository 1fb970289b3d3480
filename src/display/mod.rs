//! Human-readable renderings of an evaluation.
pub mod trace;
