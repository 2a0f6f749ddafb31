//! Entry-point composition.
//!
//! An [`EntryPoint`] is an ordinary bound value with a `run` method. Composing
//! a tree builds the context, resolves the entry binding like any other
//! singleton, and awaits `run`. The [`Composition`] builder covers program
//! assembly: extra modules, ad-hoc bindings, and process inputs captured as
//! [`RuntimeArgs`] and [`RuntimeEnv`] bindings.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use modwire::{compose, Composition};
//!
//! // Plain tree with the entry bound inside it:
//! let output = compose::<Server>(&APP).await?;
//!
//! // Or assembled ad hoc, with process inputs captured:
//! let output = Composition::new()
//!     .dependency(&APP)
//!     .args(std::env::args())
//!     .env(std::env::vars())
//!     .launch::<Server>()
//!     .await?;
//! ```

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::binding::Binding;
use crate::context::{create_context, Context, Resolver};
use crate::error::{Error, Result};
use crate::key::{key, Key, TypedKey};
use crate::module::{Module, ModuleRef};
use crate::overrides::{override_module, Overrides};

/// Asynchronous program root, resolved out of a composed context.
///
/// Implementors are bound like any other value; the composition functions
/// resolve the implementing type and await [`run`](EntryPoint::run).
#[async_trait]
pub trait EntryPoint: Send + Sync + 'static {
    /// Value produced by running the program.
    type Output: Send;

    /// Execute the program.
    async fn run(&self) -> Self::Output;
}

/// Build a context from `root` and run the bound entry point `E`.
///
/// A tree that does not bind `E` fails with [`Error::MissingEntryPoint`].
pub async fn compose<E>(root: &ModuleRef) -> Result<E::Output>
where
    E: EntryPoint,
{
    run_entry::<E>(create_context(root)?).await
}

/// Like [`compose`], with `overrides` applied to the tree first.
pub async fn compose_with<E>(root: &ModuleRef, overrides: Overrides) -> Result<E::Output>
where
    E: EntryPoint,
{
    let root = override_module(root, overrides)?;
    run_entry::<E>(create_context(&root)?).await
}

async fn run_entry<E>(context: Context) -> Result<E::Output>
where
    E: EntryPoint,
{
    let entry = context.resolve::<E>().map_err(|error| match error {
        Error::MissingBinding { key } if key == Key::of::<E>() => Error::missing_entry_point(key),
        other => other,
    })?;
    info!(entry = %Key::of::<E>(), "entry point resolved, running");
    Ok(entry.run().await)
}

/// Process arguments captured at composition time.
#[derive(Clone, Debug, Default)]
pub struct RuntimeArgs {
    /// Arguments in the order they were given.
    pub args: Vec<String>,
}

/// Process environment captured at composition time.
#[derive(Clone, Debug, Default)]
pub struct RuntimeEnv {
    /// Variables by name.
    pub vars: HashMap<String, String>,
}

impl RuntimeEnv {
    /// Look up one variable.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Builder for program assembly.
///
/// Collects module dependencies, ad-hoc bindings, and process inputs, then
/// launches an entry point against the assembled tree. [`RuntimeArgs`] and
/// [`RuntimeEnv`] are always bound, empty unless captured.
pub struct Composition {
    source: String,
    dependencies: Vec<ModuleRef>,
    bindings: Vec<Binding>,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl Composition {
    /// Start an empty composition; the source label derives from the caller
    /// location.
    #[track_caller]
    pub fn new() -> Self {
        let location = Location::caller();
        Self::labeled(format!("{}:{}", location.file(), location.line()))
    }

    /// Start an empty composition with an explicit source label.
    pub fn labeled(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dependencies: Vec::new(),
            bindings: Vec::new(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Add a module dependency.
    pub fn dependency(mut self, module: &ModuleRef) -> Self {
        self.dependencies.push(module.clone());
        self
    }

    /// Bind `T` directly on the composition root.
    pub fn provide<T, F>(mut self, producer: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::of(key::<T>(), self.source.clone(), producer);
        self.bindings.push(binding);
        self
    }

    /// Bind an unsized `T` directly on the composition root.
    pub fn provide_arc<T, F>(mut self, producer: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let binding = Binding::of_arc(key::<T>(), self.source.clone(), producer);
        self.bindings.push(binding);
        self
    }

    /// Bind an explicit typed key directly on the composition root.
    pub fn bind<T, F>(mut self, key: TypedKey<T>, producer: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::of(key, self.source.clone(), producer);
        self.bindings.push(binding);
        self
    }

    /// Capture process arguments, bound as [`RuntimeArgs`].
    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Capture environment variables, bound as [`RuntimeEnv`].
    pub fn env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = vars.into_iter().collect();
        self
    }

    /// Assemble the composition root module without running anything.
    pub fn into_module(self) -> ModuleRef {
        self.assemble()
    }

    /// Build the context and run the bound entry point `E`.
    pub async fn launch<E>(self) -> Result<E::Output>
    where
        E: EntryPoint,
    {
        let root = self.assemble();
        run_entry::<E>(create_context(&root)?).await
    }

    /// Like [`launch`](Self::launch), with `overrides` applied first.
    pub async fn launch_with<E>(self, overrides: Overrides) -> Result<E::Output>
    where
        E: EntryPoint,
    {
        let root = override_module(&self.assemble(), overrides)?;
        run_entry::<E>(create_context(&root)?).await
    }

    fn assemble(self) -> ModuleRef {
        let runtime_source = format!("{}::runtime", self.source);
        let args = RuntimeArgs { args: self.args };
        let env = RuntimeEnv { vars: self.env };
        let runtime = Module::assembled(
            runtime_source.clone(),
            Vec::new(),
            vec![
                Binding::of(key::<RuntimeArgs>(), runtime_source.clone(), move |_| {
                    Ok(args.clone())
                }),
                Binding::of(key::<RuntimeEnv>(), runtime_source, move |_| Ok(env.clone())),
            ],
        );
        let mut dependencies = self.dependencies;
        dependencies.push(ModuleRef::ready(runtime));
        ModuleRef::ready(Module::assembled(self.source, dependencies, self.bindings))
    }
}
