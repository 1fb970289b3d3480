//! The value model and the dependency-graph storage built from it.
pub mod registry;
pub mod types;

pub use registry::{NodeKind, Registry};
pub use types::{NodeId, NodeMetadata, RawRule, RawScalar, RawValue, ResolvedValue, Rule, Value, ValueKind};
