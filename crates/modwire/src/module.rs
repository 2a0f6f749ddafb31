//! Module declarations and the binder collection surface.
//!
//! A module is declared as a builder closure over a [`Binder`] and handled
//! through a [`ModuleRef`]. Refs share identity under cloning: the flattener
//! dedups modules by ref identity, which is what makes diamond-shaped graphs
//! materialize each shared module exactly once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modwire::{create_context, module};
//!
//! module! {
//!     static STORAGE = |b| {
//!         b.provide(|_| Ok(Disk::open("/tmp/data")?));
//!     };
//!
//!     static SERVICE = |b| {
//!         b.dependency(&STORAGE);
//!         b.provide(|cx| Ok(Indexer::new(cx.get()?)));
//!     };
//! }
//!
//! let context = create_context(&SERVICE)?;
//! ```

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::binding::Binding;
use crate::context::Resolver;
use crate::key::{key, TypedKey};

/// Identity of a module declaration, derived from its ref allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ModuleId(usize);

type BuildFn = dyn Fn(&mut Binder) + Send + Sync;

enum Body {
    /// User-supplied builder, run on each materialization.
    Builder(Box<BuildFn>),
    /// Pre-assembled module, used by override rewrites and compositions.
    Ready(Module),
}

struct Inner {
    source: String,
    body: Body,
}

/// Shared handle to a module declaration.
///
/// Cloning shares identity; declaring twice (even with identical builders)
/// yields two distinct modules.
#[derive(Clone)]
pub struct ModuleRef {
    inner: Arc<Inner>,
}

impl ModuleRef {
    fn from_body(source: String, body: Body) -> Self {
        Self {
            inner: Arc::new(Inner { source, body }),
        }
    }

    pub(crate) fn ready(module: Module) -> Self {
        let source = module.source.clone();
        Self::from_body(source, Body::Ready(module))
    }

    /// Stable identity of this declaration, shared by clones.
    pub(crate) fn id(&self) -> ModuleId {
        ModuleId(Arc::as_ptr(&self.inner) as usize)
    }

    /// Source label of this declaration.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Run the builder and collect the module's dependencies and bindings.
    pub fn materialize(&self) -> Module {
        match &self.inner.body {
            Body::Builder(build) => {
                let mut binder = Binder::new(self.inner.source.clone());
                build(&mut binder);
                binder.into_module()
            }
            Body::Ready(module) => module.clone(),
        }
    }
}

impl PartialEq for ModuleRef {
    /// Identity equality: true only for clones of one declaration.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ModuleRef {}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRef")
            .field("source", &self.inner.source)
            .finish_non_exhaustive()
    }
}

/// Materialized module: source label plus collected dependencies and bindings.
#[derive(Clone)]
pub struct Module {
    source: String,
    dependencies: Vec<ModuleRef>,
    bindings: Vec<Binding>,
}

impl Module {
    pub(crate) fn assembled(
        source: String,
        dependencies: Vec<ModuleRef>,
        bindings: Vec<Binding>,
    ) -> Self {
        Self {
            source,
            dependencies,
            bindings,
        }
    }

    /// Source label of the declaring module.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Modules this one depends on, in declaration order.
    pub fn dependencies(&self) -> &[ModuleRef] {
        &self.dependencies
    }

    /// Bindings contributed by this module, in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("source", &self.source)
            .field("dependencies", &self.dependencies.len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Collection surface handed to module builders.
///
/// Builders declare dependencies on other modules and contribute bindings;
/// nothing is validated here. Duplicate and conflict checks happen when the
/// tree is flattened into a context.
pub struct Binder {
    source: String,
    dependencies: Vec<ModuleRef>,
    bindings: Vec<Binding>,
}

impl Binder {
    fn new(source: String) -> Self {
        Self {
            source,
            dependencies: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Source label of the module being built.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Declare a dependency on another module.
    pub fn dependency(&mut self, module: &ModuleRef) {
        self.dependencies.push(module.clone());
    }

    /// Bind `T` with a producer returning an owned value.
    ///
    /// The value type is inferred from the producer's return type; annotate
    /// with `provide::<T, _>` when inference needs help.
    pub fn provide<T, F>(&mut self, producer: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind(key::<T>(), producer);
    }

    /// Bind `T` with a producer that supplies the [`Arc`] itself.
    ///
    /// Use this form for trait-object keys: the producer coerces `Arc<Impl>`
    /// to `Arc<dyn Trait>` before handing it over.
    pub fn provide_arc<T, F>(&mut self, producer: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.bind_arc(key::<T>(), producer);
    }

    /// Bind an explicit typed key with a producer returning an owned value.
    pub fn bind<T, F>(&mut self, key: TypedKey<T>, producer: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::of(key, self.source.clone(), producer);
        self.contribute(binding);
    }

    /// Bind an explicit typed key with an [`Arc`]-supplying producer.
    pub fn bind_arc<T, F>(&mut self, key: TypedKey<T>, producer: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let binding = Binding::of_arc(key, self.source.clone(), producer);
        self.contribute(binding);
    }

    /// Contribute an already-assembled binding.
    pub fn contribute(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    fn into_module(self) -> Module {
        Module {
            source: self.source,
            dependencies: self.dependencies,
            bindings: self.bindings,
        }
    }
}

/// Declare an anonymous module; the source label derives from the caller
/// location.
///
/// Two calls on the same line produce refs sharing one label, which a tree
/// containing both will reject. Use [`named_module`] when the call site cannot
/// serve as a unique label.
#[track_caller]
pub fn module<F>(build: F) -> ModuleRef
where
    F: Fn(&mut Binder) + Send + Sync + 'static,
{
    let location = Location::caller();
    named_module(format!("{}:{}", location.file(), location.line()), build)
}

/// Declare a module with an explicit source label.
///
/// Labels identify modules in diagnostics and must be unique across a tree;
/// flattening rejects two distinct declarations sharing one label.
pub fn named_module<F>(source: impl Into<String>, build: F) -> ModuleRef
where
    F: Fn(&mut Binder) + Send + Sync + 'static,
{
    ModuleRef::from_body(source.into(), Body::Builder(Box::new(build)))
}

/// Declare modules as lazily-initialized statics.
///
/// Each declaration becomes a `static NAME: Lazy<ModuleRef>` whose source
/// label is `module_path!()::NAME`, stable across runs and unique as long as
/// static names are. Several modules can be declared in one block:
///
/// ```rust,ignore
/// modwire::module! {
///     static STORAGE = |b| {
///         b.provide(|_| Ok(Disk::open("/tmp/data")?));
///     };
///
///     pub static SERVICE = |b| {
///         b.dependency(&STORAGE);
///         b.provide(|cx| Ok(Indexer::new(cx.get()?)));
///     };
/// }
/// ```
#[macro_export]
macro_rules! module {
    ($(#[$meta:meta])* $vis:vis static $name:ident = $builder:expr; $($rest:tt)*) => {
        $(#[$meta])*
        $vis static $name: $crate::macro_support::Lazy<$crate::ModuleRef> =
            $crate::macro_support::Lazy::new(|| {
                $crate::named_module(
                    concat!(module_path!(), "::", stringify!($name)),
                    $builder,
                )
            });
        $crate::module! { $($rest)* }
    };
    () => {};
}
