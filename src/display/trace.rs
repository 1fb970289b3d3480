use crate::analysis::topology;
use crate::compute::ledger::Ledger;
use crate::store::{NodeId, NodeKind, Registry};
use std::collections::HashMap;
use std::fmt::Write;

/// Levels printed below the target before the tree is cut short.
const MAX_TRACE_DEPTH: usize = 64;

/// Renders the dependency tree of `target` with every resolved value.
pub fn format_trace(registry: &Registry, ledger: &Ledger, target: NodeId) -> String {
    let mut tracer = Tracer {
        registry,
        ledger,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    if target.index() < registry.count() {
        let name = registry.name_of(target);
        let _ = writeln!(tracer.output, "AUDIT TRACE for value '{}':", name);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(target, 1, "");

        let dependents = topology::affected_by(registry, name);
        if !dependents.is_empty() {
            let names: Vec<&str> = dependents.iter().map(String::as_str).collect();
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            let _ = writeln!(tracer.output, "Feeds into: {}", names.join(", "));
        }
    } else {
        let _ = writeln!(tracer.output, "Error: Invalid Node ID {:?}", target);
    }
    tracer.output
}

struct Tracer<'a> {
    registry: &'a Registry,
    ledger: &'a Ledger,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let name = self.registry.name_of(node_id);
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, name, first_seen);
            return;
        }
        if level > MAX_TRACE_DEPTH {
            let _ = writeln!(self.output, "{}{} -> ...", prefix, self.registry.name_of(node_id));
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let line_header = format!("[L{}] {}{}", level, self.qualified_name(node_id), self.format_value(node_id));

        match &self.registry.kinds[node_id.index()] {
            NodeKind::Literal(value) => {
                let _ = writeln!(self.output, "{}{} -> Literal({})", prefix, line_header, value);
            }
            NodeKind::Formula { source, .. } => {
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, source.trim());
                let parents = self.registry.get_parents(node_id);
                self.recurse_children(prefix, parents, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &[NodeId], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix);
        }
    }

    fn qualified_name(&self, id: NodeId) -> String {
        let meta = &self.registry.meta[id.index()];
        match &meta.section {
            Some(section) => format!("{}.{}", section, meta.name),
            None => meta.name.clone(),
        }
    }

    fn format_value(&self, id: NodeId) -> String {
        match self.ledger.get(id) {
            Some(v) => format!("[{}]", v),
            None => "[?]".to_string(),
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}
