//! # Modwire
//!
//! Module-based dependency injection with lazy singletons and test-time
//! overrides.
//!
//! Programs are wired as a tree of modules. Each module declares the modules
//! it depends on and contributes bindings: a typed key plus a producer
//! closure. Flattening the tree dedups modules by declaration identity,
//! rejects duplicate and conflicting bindings, and yields an immutable
//! [`Context`]. Values are produced lazily, memoized per key, and shared as
//! [`Arc`](std::sync::Arc)s; a module reached over several paths still
//! contributes exactly one instance per key.
//!
//! ## Module Categories
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`module`] | Module declarations and the binder surface |
//! | [`key`] | Typed binding identity |
//! | [`binding`] | Key-to-producer records |
//! | [`context`] | Context construction and lazy resolution |
//! | [`overrides`] | Test-time producer replacement |
//! | [`compose`] | Entry points and program assembly |
//! | [`error`] | Container error types |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use modwire::{create_context, module};
//!
//! #[derive(Debug)]
//! struct Port(u16);
//!
//! #[derive(Debug)]
//! struct Listener {
//!     port: Arc<Port>,
//! }
//!
//! module! {
//!     static CONFIG = |b| {
//!         b.provide(|_| Ok(Port(8080)));
//!     };
//!
//!     static APP = |b| {
//!         b.dependency(&CONFIG);
//!         b.provide(|cx| Ok(Listener { port: cx.get()? }));
//!     };
//! }
//!
//! fn main() -> modwire::Result<()> {
//!     let context = create_context(&APP)?;
//!     let listener: Arc<Listener> = context.resolve()?;
//!     assert_eq!(listener.port.0, 8080);
//!     Ok(())
//! }
//! ```
//!
//! For tests, [`override_module`] swaps producers on a live tree without
//! touching production wiring, and [`compose_with`] runs an entry point
//! against the adjusted tree.

// Core container modules
pub mod binding;
pub mod compose;
pub mod context;
pub mod error;
pub mod key;
pub mod module;
pub mod overrides;

mod tree;

// Re-export commonly used types
pub use binding::Binding;
pub use compose::{compose, compose_with, Composition, EntryPoint, RuntimeArgs, RuntimeEnv};
pub use context::{create_context, Context, Provider, Resolver};
pub use error::{Error, Result};
pub use key::{key, Key, TypedKey};
pub use module::{module, named_module, Binder, Module, ModuleRef};
pub use overrides::{override_module, Overrides};

// Support items referenced from macro expansions; not part of the public API.
#[doc(hidden)]
pub mod macro_support {
    pub use once_cell::sync::Lazy;
}
