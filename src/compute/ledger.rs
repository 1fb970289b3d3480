//! ledger.rs
//! The evaluation environment: resolved results indexed by node.

use crate::formula::Environment;
use crate::store::{NodeId, Registry, ResolvedValue};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    values: Vec<Option<ResolvedValue>>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn ensure_capacity(&mut self, size: usize) {
        if self.values.len() < size {
            self.values.resize(size, None);
        }
    }

    #[inline(always)]
    pub fn get(&self, node_id: NodeId) -> Option<&ResolvedValue> {
        self.values.get(node_id.index())?.as_ref()
    }

    #[inline(always)]
    pub fn insert(&mut self, node_id: NodeId, value: ResolvedValue) {
        let idx = node_id.index();
        if idx >= self.values.len() {
            self.values.resize(idx + 1, None);
        }
        self.values[idx] = Some(value);
    }

    pub fn resolved_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// A ledger viewed through the registry's name index, so formulas can look up
/// values by bare or qualified name.
pub struct Scope<'a> {
    pub registry: &'a Registry,
    pub ledger: &'a Ledger,
}

impl Environment for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<&ResolvedValue> {
        self.ledger.get(self.registry.lookup(name)?)
    }
}
