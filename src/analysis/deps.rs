//! Builds the dependency graph of one evaluation scope.
//!
//! Every rule's formula is parsed here, so malformed formulas and references
//! to names outside the scope are rejected before anything is evaluated.

use crate::compute::error::EvalError;
use crate::formula;
use crate::store::{NodeId, NodeKind, NodeMetadata, Registry, Value};
use smallvec::SmallVec;
use tracing::debug;

/// A value together with the section that declares it. The section is only
/// recorded when the scope spans a whole document.
#[derive(Debug, Clone, Copy)]
pub struct ScopedValue<'a> {
    pub section: Option<&'a str>,
    pub value: &'a Value,
}

impl<'a> ScopedValue<'a> {
    pub fn local(value: &'a Value) -> Self { Self { section: None, value } }
}

pub fn build(values: &[ScopedValue<'_>]) -> Result<Registry, EvalError> {
    let mut registry = Registry::new();

    // 1. Reserve every name so references may point forward.
    let metas: Vec<NodeMetadata> = values
        .iter()
        .map(|sv| NodeMetadata { name: sv.value.name().to_string(), section: sv.section.map(Into::into) })
        .collect();
    for meta in &metas {
        registry.reserve(meta)?;
    }

    // 2. Parse rules and resolve their references.
    for (sv, meta) in values.iter().zip(metas) {
        let (kind, parents) = match sv.value {
            Value::Literal { value, .. } => (NodeKind::Literal(value.clone()), SmallVec::new()),
            Value::RuleDerived { name, kind, rule, .. } => {
                let expr = formula::parse(&rule.formula).map_err(|e| e.at_value(name))?;
                let mut parents: SmallVec<[NodeId; 4]> = SmallVec::new();
                for reference in expr.references() {
                    let parent = registry.lookup(reference).ok_or_else(|| EvalError::UnknownReference {
                        value: name.clone(),
                        reference: reference.to_string(),
                    })?;
                    // `Total` and `Costs.Total` may name the same node.
                    if !parents.contains(&parent) {
                        parents.push(parent);
                    }
                }
                (NodeKind::Formula { kind: *kind, source: rule.formula.clone(), expr }, parents)
            }
        };
        registry.add_node(kind, &parents, meta);
    }

    // 3. Downstream lists for invalidation and tracing.
    registry.link_children();

    debug!(nodes = registry.count(), edges = registry.parents_flat.len(), "dependency graph built");
    Ok(registry)
}
