//! Module tree flattening.
//!
//! Walks the dependency graph depth-first from a root ref, dedups modules by
//! ref identity, then folds their bindings into a single key-to-binding table.
//! Dependencies are processed before dependents, so the table reflects a
//! leaves-first reading of the tree. Flattening fails on the first wiring
//! mistake it finds: a key bound twice in one module, the same key bound by
//! two modules, or two distinct declarations sharing a source label.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::binding::Binding;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::module::{Module, ModuleId, ModuleRef};

/// One visited module declaration.
pub(crate) struct GraphNode {
    pub(crate) module_ref: ModuleRef,
    pub(crate) module: Module,
}

/// Deduped view of a module tree.
///
/// `order` lists module ids with dependencies ahead of their dependents
/// wherever the graph is acyclic; members of a dependency cycle appear in
/// discovery order.
pub(crate) struct ModuleGraph {
    pub(crate) root: ModuleId,
    pub(crate) nodes: HashMap<ModuleId, GraphNode>,
    pub(crate) order: Vec<ModuleId>,
}

/// Walk the tree under `root`, materializing each declaration exactly once.
///
/// Ref identity is the dedup key: a module reached over several paths (the
/// diamond case) contributes its bindings once. Cycles between modules are
/// tolerated here; only cycles between producers are an error, and those are
/// caught at resolution time.
pub(crate) fn walk(root: &ModuleRef) -> ModuleGraph {
    let mut graph = ModuleGraph {
        root: root.id(),
        nodes: HashMap::new(),
        order: Vec::new(),
    };
    visit(root, &mut HashSet::new(), &mut graph);
    graph
}

fn visit(module_ref: &ModuleRef, seen: &mut HashSet<ModuleId>, graph: &mut ModuleGraph) {
    let id = module_ref.id();
    if !seen.insert(id) {
        return;
    }
    let module = module_ref.materialize();
    for dependency in module.dependencies() {
        visit(dependency, seen, graph);
    }
    graph.order.push(id);
    graph.nodes.insert(
        id,
        GraphNode {
            module_ref: module_ref.clone(),
            module,
        },
    );
}

/// Flattened binding table plus tree statistics for logging.
#[derive(Debug)]
pub(crate) struct FlatTree {
    pub(crate) bindings: HashMap<Key, Binding>,
    pub(crate) module_count: usize,
}

/// Flatten the tree under `root` into a conflict-checked binding table.
pub(crate) fn flatten(root: &ModuleRef) -> Result<FlatTree> {
    let graph = walk(root);

    let mut sources: HashSet<&str> = HashSet::new();
    for id in &graph.order {
        let node = node(&graph, *id)?;
        if !sources.insert(node.module.source()) {
            return Err(Error::duplicate_module_source(node.module.source()));
        }
    }

    let mut bindings: HashMap<Key, Binding> = HashMap::new();
    for id in &graph.order {
        for binding in node(&graph, *id)?.module.bindings() {
            match bindings.entry(binding.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(binding.clone());
                }
                Entry::Occupied(occupied) => {
                    let existing = occupied.get();
                    return Err(if existing.source() == binding.source() {
                        Error::duplicate_binding(binding.key(), binding.source())
                    } else {
                        Error::conflicting_binding(
                            binding.key(),
                            existing.source(),
                            binding.source(),
                        )
                    });
                }
            }
        }
    }

    debug!(
        root = root.source(),
        modules = graph.order.len(),
        bindings = bindings.len(),
        "module tree flattened"
    );
    Ok(FlatTree {
        module_count: graph.order.len(),
        bindings,
    })
}

/// Graph lookup; ids in `order` always have nodes.
pub(crate) fn node(graph: &ModuleGraph, id: ModuleId) -> Result<&GraphNode> {
    graph
        .nodes
        .get(&id)
        .ok_or_else(|| Error::internal("module graph lost a visited node"))
}
