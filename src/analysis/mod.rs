//! Static analysis of an evaluation scope: graph construction and ordering.
pub mod deps;
pub mod topology;

pub use deps::{build, ScopedValue};
