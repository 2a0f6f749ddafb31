//! Test-time override trees.
//!
//! An [`Overrides`] value mirrors the shape of a module tree: producer
//! replacements for the addressed module's own bindings, plus nested specs for
//! its direct dependencies. [`override_module`] validates the spec against the
//! live tree and returns a new root ref with the replacements applied.
//!
//! Only modules with a replacement somewhere at or below them are rebuilt;
//! every other module keeps its original ref. A module shared between an
//! overridden branch and an untouched branch therefore keeps a single
//! identity, and its singleton stays shared after the override.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modwire::{create_context, override_module, key, Overrides};
//!
//! let root = override_module(
//!     &APP,
//!     Overrides::new().submodule(
//!         &STORAGE,
//!         Overrides::new().replace(key::<Disk>(), |_| Ok(Disk::in_memory())),
//!     ),
//! )?;
//! let context = create_context(&root)?;
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::binding::{erase_arc_producer, erase_value_producer, ErasedProducer};
use crate::context::Resolver;
use crate::error::{Error, Result};
use crate::key::{Key, TypedKey};
use crate::module::{Module, ModuleId, ModuleRef};
use crate::tree;

/// Replacement spec for one module and, recursively, its dependencies.
///
/// Specs are addressed by live [`ModuleRef`]s, so they can only name modules
/// actually reachable in the tree they are applied to. When two branches of a
/// spec address the same module, their replacements merge; on a key collision
/// the later branch wins.
#[derive(Default)]
pub struct Overrides {
    replacements: Vec<(Key, ErasedProducer)>,
    children: Vec<(ModuleRef, Overrides)>,
}

impl Overrides {
    /// Empty spec; chain [`replace`](Self::replace) and
    /// [`submodule`](Self::submodule) onto it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the producer bound at `key` in the addressed module.
    ///
    /// The binding keeps its key and source label; only the producer changes.
    pub fn replace<T, F>(mut self, key: TypedKey<T>, producer: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.replacements
            .push((key.erased(), erase_value_producer(producer)));
        self
    }

    /// [`Arc`]-supplying form of [`replace`](Self::replace), for unsized keys.
    pub fn replace_arc<T, F>(mut self, key: TypedKey<T>, producer: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.replacements
            .push((key.erased(), erase_arc_producer(producer)));
        self
    }

    /// Attach a nested spec for a direct dependency of the addressed module.
    pub fn submodule(mut self, module: &ModuleRef, spec: Overrides) -> Self {
        self.children.push((module.clone(), spec));
        self
    }

    /// True when the spec replaces nothing at any depth.
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.children.iter().all(|(_, spec)| spec.is_empty())
    }
}

/// Apply `spec` to the tree under `root`, returning a new root ref.
///
/// The spec is validated first: every nested spec must address a direct
/// dependency of its parent, and every replacement must address a binding the
/// module declares. Validation failures report [`Error::UnknownOverride`]
/// before any rewriting happens. A spec that addresses submodules without
/// replacing anything anywhere is still validated, then returns the original
/// root ref unchanged.
///
/// Replacements cannot cross a module dependency cycle; such specs are
/// rejected rather than rebuilt inconsistently.
pub fn override_module(root: &ModuleRef, spec: Overrides) -> Result<ModuleRef> {
    if spec.replacements.is_empty() && spec.children.is_empty() {
        return Ok(root.clone());
    }

    let graph = tree::walk(root);
    let mut targeted: HashMap<ModuleId, HashMap<Key, ErasedProducer>> = HashMap::new();
    collect_replacements(&graph, graph.root, spec, &mut targeted)?;
    if targeted.is_empty() {
        return Ok(root.clone());
    }

    // Parents of each module over the deduped graph.
    let mut reverse: HashMap<ModuleId, Vec<ModuleId>> = HashMap::new();
    for id in &graph.order {
        for dependency in tree::node(&graph, *id)?.module.dependencies() {
            reverse.entry(dependency.id()).or_default().push(*id);
        }
    }

    // A module is rebuilt when it holds a replacement or can reach one.
    let mut affected: HashSet<ModuleId> = HashSet::new();
    let mut queue: VecDeque<ModuleId> = targeted.keys().copied().collect();
    while let Some(id) = queue.pop_front() {
        if affected.insert(id) {
            if let Some(parents) = reverse.get(&id) {
                queue.extend(parents.iter().copied());
            }
        }
    }

    let replaced = targeted.values().map(HashMap::len).sum::<usize>();
    let mut rebuilt: HashMap<ModuleId, ModuleRef> = HashMap::new();
    for id in &graph.order {
        if !affected.contains(id) {
            continue;
        }
        let node = tree::node(&graph, *id)?;
        let mut dependencies = Vec::with_capacity(node.module.dependencies().len());
        for dependency in node.module.dependencies() {
            let dep_id = dependency.id();
            if affected.contains(&dep_id) {
                match rebuilt.get(&dep_id) {
                    Some(replacement) => dependencies.push(replacement.clone()),
                    None => {
                        return Err(Error::circular_dependency(format!(
                            "\noverride spans a module dependency cycle at [{}]",
                            node.module.source()
                        )));
                    }
                }
            } else {
                dependencies.push(dependency.clone());
            }
        }
        let replacements = targeted.remove(id);
        let bindings = node
            .module
            .bindings()
            .iter()
            .map(|binding| {
                match replacements
                    .as_ref()
                    .and_then(|map| map.get(&binding.key()))
                {
                    Some(producer) => binding.with_producer(producer.clone()),
                    None => binding.clone(),
                }
            })
            .collect();
        let module = Module::assembled(node.module.source().to_owned(), dependencies, bindings);
        rebuilt.insert(*id, ModuleRef::ready(module));
    }

    debug!(
        root = root.source(),
        replaced,
        rebuilt = rebuilt.len(),
        "overrides applied"
    );
    rebuilt
        .remove(&graph.root)
        .ok_or_else(|| Error::internal("override application lost the root module"))
}

fn collect_replacements(
    graph: &tree::ModuleGraph,
    id: ModuleId,
    spec: Overrides,
    targeted: &mut HashMap<ModuleId, HashMap<Key, ErasedProducer>>,
) -> Result<()> {
    let node = tree::node(graph, id)?;
    for (key, producer) in spec.replacements {
        if !node.module.bindings().iter().any(|b| b.key() == key) {
            return Err(Error::unknown_override(format!(
                "binding [{key}] is not declared in module [{}]",
                node.module.source()
            )));
        }
        targeted.entry(id).or_default().insert(key, producer);
    }
    for (child, child_spec) in spec.children {
        let child_id = child.id();
        if !node
            .module
            .dependencies()
            .iter()
            .any(|dependency| dependency.id() == child_id)
        {
            return Err(Error::unknown_override(format!(
                "module [{}] is not a dependency of [{}]",
                child.source(),
                node.module.source()
            )));
        }
        collect_replacements(graph, child_id, child_spec, targeted)?;
    }
    Ok(())
}
