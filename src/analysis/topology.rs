use crate::compute::error::EvalError;
use crate::store::{NodeId, NodeKind, Registry};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Orders the rule-derived nodes so every node follows the nodes it reads.
///
/// Literal nodes are already resolved and are left out of the order. Roots are
/// visited in declaration order, so the result (and any reported cycle) is
/// deterministic for a given declaration sequence.
pub fn sort(registry: &Registry) -> Result<Vec<NodeId>, EvalError> {
    let count = registry.count();
    let mut order = Vec::with_capacity(count);
    let mut state = vec![VisitState::None; count];

    for i in 0..count {
        if state[i] == VisitState::None && is_formula(registry, NodeId::new(i)) {
            visit(NodeId::new(i), registry, &mut state, &mut order)?;
        }
    }

    Ok(order)
}

#[derive(Clone, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

fn is_formula(registry: &Registry, node: NodeId) -> bool {
    matches!(registry.kinds[node.index()], NodeKind::Formula { .. })
}

/// Post-order DFS from `root` with an explicit stack of
/// `(node, next parent index)`, so chain length is not bounded by the thread stack.
fn visit(
    root: NodeId,
    registry: &Registry,
    state: &mut [VisitState],
    order: &mut Vec<NodeId>,
) -> Result<(), EvalError> {
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
    state[root.index()] = VisitState::Visiting;

    while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        let Some(&parent) = registry.get_parents(node).get(frame.1) else {
            stack.pop();
            state[node.index()] = VisitState::Visited;
            order.push(node);
            continue;
        };
        frame.1 += 1;

        if !is_formula(registry, parent) {
            continue;
        }
        match state[parent.index()] {
            VisitState::Visited => {}
            VisitState::Visiting => {
                // The parent is on the stack; everything above it closes the loop.
                let start = stack.iter().position(|&(n, _)| n == parent).unwrap_or(0);
                let path = stack[start..].iter().map(|&(n, _)| registry.name_of(n).to_string()).collect();
                return Err(EvalError::CyclicDependency { path });
            }
            VisitState::None => {
                state[parent.index()] = VisitState::Visiting;
                stack.push((parent, 0));
            }
        }
    }
    Ok(())
}

/// Identifies all nodes downstream from the given start nodes, the start
/// nodes included.
pub fn downstream_from(registry: &Registry, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            let mut edge_idx = registry.first_child[node.index()];
            while edge_idx != u32::MAX {
                let child = registry.child_targets[edge_idx as usize];
                queue.push_back(child);
                edge_idx = registry.next_child[edge_idx as usize];
            }
        }
    }
    visited
}

/// Names of the values whose results may change when `changed` is edited,
/// excluding `changed` itself. Unknown names affect nothing.
pub fn affected_by(registry: &Registry, changed: &str) -> BTreeSet<String> {
    let Some(start) = registry.lookup(changed) else {
        return BTreeSet::new();
    };
    downstream_from(registry, &[start])
        .into_iter()
        .filter(|&id| id != start)
        .map(|id| registry.name_of(id).to_string())
        .collect()
}
