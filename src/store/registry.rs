use super::types::*;
use crate::compute::error::EvalError;
use crate::formula::Expr;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Literal(ResolvedValue),
    Formula { kind: ValueKind, source: String, expr: Expr },
}

impl NodeKind {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            NodeKind::Literal(v) => v.kind(),
            NodeKind::Formula { kind, .. } => *kind,
        }
    }
}

/// The dependency graph of one evaluation scope.
///
/// Nodes are reserved by name first so formulas may reference values declared
/// later; `link_children` builds the downstream lists once every node is in.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    // Columnar Arrays
    pub kinds: Vec<NodeKind>,
    pub meta: Vec<NodeMetadata>,

    // Topology (CSR-ish + Adjacency)
    pub parents_flat: Vec<NodeId>,
    pub parents_ranges: Vec<(u32, u32)>, // (start, count)

    // Downstream traversal helpers
    pub first_child: Vec<u32>,
    pub child_targets: Vec<NodeId>,
    pub next_child: Vec<u32>,

    /// Bare and section-qualified names. Qualified keys are `Section.Name`.
    pub names: HashMap<String, NodeId>,
    reserved: usize,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }

    /// Assigns the next id to `meta.name`, failing if the name (or, for a
    /// sectioned value, its qualified name) is already taken. Bare and
    /// qualified names share one namespace, so a dotted value name that
    /// spells another value's qualified name is a duplicate in either order.
    pub fn reserve(&mut self, meta: &NodeMetadata) -> Result<NodeId, EvalError> {
        let id = NodeId::new(self.reserved);
        if self.names.contains_key(&meta.name) {
            return Err(EvalError::DuplicateValue { name: meta.name.clone() });
        }
        let qualified = meta.section.as_ref().map(|section| format!("{}.{}", section, meta.name));
        if let Some(key) = &qualified {
            if self.names.contains_key(key) {
                return Err(EvalError::DuplicateValue { name: key.clone() });
            }
        }

        self.names.insert(meta.name.clone(), id);
        if let Some(key) = qualified {
            self.names.insert(key, id);
        }
        self.reserved += 1;
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Appends a reserved node. Nodes must be added in reservation order.
    pub fn add_node(&mut self, kind: NodeKind, parents: &[NodeId], meta: NodeMetadata) -> NodeId {
        let id = NodeId::new(self.kinds.len());
        debug_assert_eq!(self.names.get(&meta.name), Some(&id));

        // 1. Register Parents
        let start = self.parents_flat.len() as u32;
        let count = parents.len() as u32;
        self.parents_flat.extend_from_slice(parents);
        self.parents_ranges.push((start, count));

        // 2. Metadata
        self.kinds.push(kind);
        self.meta.push(meta);

        id
    }

    /// Builds the child adjacency lists from the parent ranges.
    pub fn link_children(&mut self) {
        self.first_child = vec![u32::MAX; self.count()];
        self.child_targets.clear();
        self.next_child.clear();

        for i in 0..self.count() {
            let id = NodeId::new(i);
            let (start, count) = self.parents_ranges[i];
            for k in start..start + count {
                let p_idx = self.parents_flat[k as usize].index();
                let head = self.first_child[p_idx];
                let new_edge = self.child_targets.len() as u32;
                self.child_targets.push(id);
                self.next_child.push(head);
                self.first_child[p_idx] = new_edge;
            }
        }
    }

    #[inline(always)]
    pub fn get_parents(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.parents_flat[start as usize..(start + count) as usize]
    }

    pub fn name_of(&self, id: NodeId) -> &str {
        &self.meta[id.index()].name
    }
}
