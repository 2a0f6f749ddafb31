//! Immutable context and lazy singleton resolution.
//!
//! ## Architecture
//!
//! A [`Context`] owns one slot per key: the binding plus a memo cell. Nothing
//! is produced at build time; the first resolve of a key runs its producer and
//! memoizes the `Arc`, and every later resolve returns a clone of the same
//! `Arc`. Producer failures are not memoized, so a resolve after a failure
//! runs the producer again.
//!
//! Producers receive a [`Resolver`]. The keys in flight on each thread are
//! recorded on the shared table and checked before a producer runs, so a
//! producer cycle is reported as [`Error::CircularDependency`] instead of
//! deadlocking on the memo cell it is already initializing. The chain
//! survives hops through fresh resolvers, so re-entry through
//! [`Provider::get`] is caught the same way.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::binding::{Binding, BoxedInstance};
use crate::error::{Error, Result};
use crate::key::{key, Key, TypedKey};
use crate::module::ModuleRef;
use crate::tree;

/// Flatten the tree under `root` and build a context over its binding table.
///
/// Construction validates wiring (duplicates, conflicts, shared source
/// labels) but produces no instances.
pub fn create_context(root: &ModuleRef) -> Result<Context> {
    let flat = tree::flatten(root)?;
    info!(
        root = root.source(),
        modules = flat.module_count,
        bindings = flat.bindings.len(),
        "context created"
    );
    Ok(Context::from_bindings(flat.bindings))
}

struct Slot {
    binding: Binding,
    cell: OnceCell<BoxedInstance>,
}

struct Shared {
    slots: HashMap<Key, Slot>,
    // Keys currently being produced, per thread. Guards the memo cells
    // against same-thread re-entry, which once_cell would deadlock on.
    in_flight: Mutex<HashMap<ThreadId, Vec<Key>>>,
}

/// Immutable resolution context built from a flattened module tree.
///
/// Cloning is cheap; clones share the binding table and the singleton memo.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn from_bindings(bindings: HashMap<Key, Binding>) -> Self {
        let slots = bindings
            .into_iter()
            .map(|(key, binding)| {
                (
                    key,
                    Slot {
                        binding,
                        cell: OnceCell::new(),
                    },
                )
            })
            .collect();
        Self {
            shared: Arc::new(Shared {
                slots,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve the singleton for `T`, producing it on first use.
    pub fn resolve<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Resolver::new(&self.shared).get::<T>()
    }

    /// Resolve by explicit typed key.
    pub fn resolve_key<T>(&self, key: TypedKey<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Resolver::new(&self.shared).get_key(key)
    }

    /// Deferred handle for `T`; resolution happens on [`Provider::get`].
    pub fn provider<T>(&self) -> Provider<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Provider {
            shared: Arc::clone(&self.shared),
            key: Key::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Whether the table binds `T`.
    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.shared.slots.contains_key(&Key::of::<T>())
    }

    /// All bound keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.shared.slots.keys().copied()
    }

    /// Number of bindings in the table.
    pub fn len(&self) -> usize {
        self.shared.slots.len()
    }

    /// True when the table holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.shared.slots.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.shared.slots.len())
            .finish()
    }
}

/// Resolution view handed to producers.
///
/// The key chain used for cycle detection lives on the shared table, per
/// thread, so it spans nested resolvers started while a producer is still
/// running. Producers pull their own dependencies through it.
pub struct Resolver<'a> {
    shared: &'a Arc<Shared>,
}

impl<'a> Resolver<'a> {
    fn new(shared: &'a Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Resolve the singleton for `T`.
    pub fn get<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_key(key::<T>())
    }

    /// Resolve by explicit typed key.
    pub fn get_key<T>(&self, key: TypedKey<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let instance = self.resolve_erased(key.erased())?;
        downcast_instance(instance, key.erased())
    }

    /// Resolve `T` if it is bound; `Ok(None)` when no module binds `T` itself.
    ///
    /// Every other failure passes through unchanged, including a missing
    /// binding hit by a nested resolve while producing a bound `T`.
    pub fn get_optional<T>(&self) -> Result<Option<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.get::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(Error::MissingBinding { key }) if key == Key::of::<T>() => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Deferred handle for `T`, usable after the producing call returns.
    pub fn provider<T>(&self) -> Provider<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Provider {
            shared: Arc::clone(self.shared),
            key: Key::of::<T>(),
            _marker: PhantomData,
        }
    }

    fn resolve_erased(&self, key: Key) -> Result<&'a BoxedInstance> {
        let slot = self
            .shared
            .slots
            .get(&key)
            .ok_or_else(|| Error::missing_binding(key))?;
        if let Some(ready) = slot.cell.get() {
            return Ok(ready);
        }
        let _frame = self.enter(key)?;
        slot.cell.get_or_try_init(|| self.produce(slot, key))
    }

    /// Record `key` on this thread's chain, or fail if it is already in
    /// flight here. The returned frame pops the entry when dropped.
    fn enter(&self, key: Key) -> Result<InFlightFrame<'a>> {
        let mut table = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let thread = thread::current().id();
        let chain = table.entry(thread).or_default();
        if chain.contains(&key) {
            return Err(Error::circular_dependency(self.render_cycle(chain, key)));
        }
        chain.push(key);
        Ok(InFlightFrame {
            shared: self.shared,
            thread,
        })
    }

    fn produce(&self, slot: &Slot, key: Key) -> Result<BoxedInstance> {
        let started = Instant::now();
        match slot.binding.produce(self) {
            Ok(instance) => {
                debug!(
                    key = %key,
                    module = slot.binding.source(),
                    elapsed = ?started.elapsed(),
                    "singleton initialized"
                );
                Ok(instance)
            }
            // Container errors surfaced by nested resolves pass through; any
            // other error is attributed to the producer that returned it.
            Err(error) => Err(match error.downcast::<Error>() {
                Ok(container) => container,
                Err(other) => Error::producer(key, slot.binding.source(), other),
            }),
        }
    }

    /// Render the in-flight chain from the first occurrence of `key` down to
    /// the repeated request, one key per line with increasing indent.
    fn render_cycle(&self, chain: &[Key], key: Key) -> String {
        let start = chain.iter().position(|k| *k == key).unwrap_or(0);
        let mut render = String::new();
        for (depth, k) in chain[start..]
            .iter()
            .chain(std::iter::once(&key))
            .enumerate()
        {
            render.push('\n');
            render.push_str(&"  ".repeat(depth));
            render.push_str(k.name());
            if let Some(slot) = self.shared.slots.get(k) {
                render.push_str(" provided by module [");
                render.push_str(slot.binding.source());
                render.push(']');
            }
        }
        render
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&thread::current().id())
            .map_or(0, Vec::len);
        f.debug_struct("Resolver").field("depth", &depth).finish()
    }
}

/// One entry on a thread's in-flight chain; pops itself on drop so the
/// chain stays balanced on error returns and unwinds.
struct InFlightFrame<'a> {
    shared: &'a Arc<Shared>,
    thread: ThreadId,
}

impl Drop for InFlightFrame<'_> {
    fn drop(&mut self) {
        let mut table = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(chain) = table.get_mut(&self.thread) {
            chain.pop();
            if chain.is_empty() {
                table.remove(&self.thread);
            }
        }
    }
}

/// Deferred handle to a binding.
///
/// Each [`get`](Provider::get) starts a fresh top-level resolve against the
/// shared singleton memo, so a provider held by a producer breaks what would
/// otherwise be a construction-time cycle. Calling `get` while its own key
/// is still being produced on the current thread reports that cycle rather
/// than re-entering the memo cell.
pub struct Provider<T: ?Sized> {
    shared: Arc<Shared>,
    key: Key,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T> Provider<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// Resolve now; the memoized singleton after the first success.
    pub fn get(&self) -> Result<Arc<T>> {
        Resolver::new(&self.shared).get::<T>()
    }

    /// Key this provider resolves.
    pub fn key(&self) -> Key {
        self.key
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            key: self.key,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("key", &self.key).finish()
    }
}

fn downcast_instance<T>(instance: &BoxedInstance, key: Key) -> Result<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| Error::internal(format!("instance stored for [{key}] is not the keyed type")))
}
