//! Binding records: a key, its producer, and the module that declared it.
//!
//! Producers are stored type-erased. The erased closure always yields a boxed
//! `Arc<T>` for the `T` named by the binding key; resolution downcasts back to
//! the typed `Arc` on the way out. Producer errors travel as [`anyhow::Error`]
//! so user producers can fail with any error type while container errors pass
//! through unmodified.

use std::any::Any;
use std::sync::Arc;

use crate::context::Resolver;
use crate::key::{Key, TypedKey};

/// Type-erased singleton instance as stored in a context slot.
///
/// The box always holds an `Arc<T>` where `T` is the keyed value type.
pub(crate) type BoxedInstance = Box<dyn Any + Send + Sync>;

/// Type-erased producer closure shared between bindings and overrides.
pub(crate) type ErasedProducer =
    Arc<dyn Fn(&Resolver<'_>) -> anyhow::Result<BoxedInstance> + Send + Sync>;

/// Erase a producer returning an owned value; the container wraps it in [`Arc`].
pub(crate) fn erase_value_producer<T, F>(producer: F) -> ErasedProducer
where
    T: Send + Sync + 'static,
    F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Arc::new(move |resolver| Ok(Box::new(Arc::new(producer(resolver)?)) as BoxedInstance))
}

/// Erase a producer that supplies the [`Arc`] itself.
///
/// This form admits unsized value types: the producer can coerce `Arc<Impl>`
/// to `Arc<dyn Trait>` before handing it over.
pub(crate) fn erase_arc_producer<T, F>(producer: F) -> ErasedProducer
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(move |resolver| Ok(Box::new(producer(resolver)?) as BoxedInstance))
}

/// A single key-to-producer registration contributed by a module.
///
/// Bindings are cheap to clone; clones share the producer closure.
#[derive(Clone)]
pub struct Binding {
    key: Key,
    source: String,
    producer: ErasedProducer,
}

impl Binding {
    /// Binding whose producer returns an owned value.
    pub fn of<T, F>(key: TypedKey<T>, source: impl Into<String>, producer: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            key: key.erased(),
            source: source.into(),
            producer: erase_value_producer(producer),
        }
    }

    /// Binding whose producer supplies the [`Arc`] itself, for unsized keys.
    pub fn of_arc<T, F>(key: TypedKey<T>, source: impl Into<String>, producer: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            key: key.erased(),
            source: source.into(),
            producer: erase_arc_producer(producer),
        }
    }

    /// Key this binding fills.
    pub fn key(&self) -> Key {
        self.key
    }

    /// Source label of the module that declared this binding.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Same key and source, different producer. Used by override application.
    pub(crate) fn with_producer(&self, producer: ErasedProducer) -> Self {
        Self {
            key: self.key,
            source: self.source.clone(),
            producer,
        }
    }

    /// Run the producer against `resolver`.
    pub(crate) fn produce(&self, resolver: &Resolver<'_>) -> anyhow::Result<BoxedInstance> {
        (self.producer.as_ref())(resolver)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
