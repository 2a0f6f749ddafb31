//! Container error types.
//!
//! Every fallible operation in the crate returns [`Result`]. Wiring mistakes
//! (duplicate or conflicting bindings, unknown override targets) surface when
//! the module tree is flattened; resolution mistakes (missing bindings,
//! dependency cycles, failed producers) surface on first use of the affected
//! key and carry enough context to locate the module at fault.

use thiserror::Error;

use crate::key::Key;

/// Convenient result alias for container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while wiring module trees and resolving instances.
#[derive(Error, Debug)]
pub enum Error {
    /// One module bound the same key twice.
    #[error("binding [{key}] duplicated in module [{module}]")]
    DuplicateBinding {
        /// Key bound more than once.
        key: Key,
        /// Source label of the offending module.
        module: String,
    },

    /// Two distinct modules bound the same key.
    #[error("binding [{key}] already present in module [{existing}]; current module: [{current}]")]
    ConflictingBinding {
        /// Key bound by both modules.
        key: Key,
        /// Source label of the module seen first.
        existing: String,
        /// Source label of the module seen second.
        current: String,
    },

    /// Two distinct module declarations share one source label.
    #[error("module source [{module}] is used by more than one module declaration")]
    DuplicateModuleSource {
        /// The shared source label.
        module: String,
    },

    /// A resolve asked for a key that no module in the tree binds.
    #[error("required [{key}] not found in context")]
    MissingBinding {
        /// The unbound key.
        key: Key,
    },

    /// A composition was launched against a tree that does not bind its entry point.
    #[error("entry point [{key}] is not bound by the composed modules")]
    MissingEntryPoint {
        /// Key of the requested entry point.
        key: Key,
    },

    /// Producers formed a cycle while resolving a key.
    #[error("circular dependency found:{render}")]
    CircularDependency {
        /// Indented rendering of the dependency chain, one key per line.
        render: String,
    },

    /// An override addressed a module or binding absent from the live tree.
    #[error("invalid override: {message}")]
    UnknownOverride {
        /// What was addressed and where it was expected.
        message: String,
    },

    /// A producer returned an error that is not itself a container error.
    #[error("producer for [{key}] in module [{module}] failed: {source}")]
    Producer {
        /// Key whose producer failed.
        key: Key,
        /// Source label of the module that bound the producer.
        module: String,
        /// The producer's own error.
        #[source]
        source: anyhow::Error,
    },

    /// Invariant breach inside the container itself.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the broken invariant.
        message: String,
    },
}

impl Error {
    /// Create a duplicate binding error.
    pub fn duplicate_binding(key: Key, module: impl Into<String>) -> Self {
        Self::DuplicateBinding {
            key,
            module: module.into(),
        }
    }

    /// Create a conflicting binding error.
    pub fn conflicting_binding(
        key: Key,
        existing: impl Into<String>,
        current: impl Into<String>,
    ) -> Self {
        Self::ConflictingBinding {
            key,
            existing: existing.into(),
            current: current.into(),
        }
    }

    /// Create a duplicate module source error.
    pub fn duplicate_module_source(module: impl Into<String>) -> Self {
        Self::DuplicateModuleSource {
            module: module.into(),
        }
    }

    /// Create a missing binding error.
    pub fn missing_binding(key: Key) -> Self {
        Self::MissingBinding { key }
    }

    /// Create a missing entry point error.
    pub fn missing_entry_point(key: Key) -> Self {
        Self::MissingEntryPoint { key }
    }

    /// Create a circular dependency error from a rendered chain.
    pub fn circular_dependency(render: impl Into<String>) -> Self {
        Self::CircularDependency {
            render: render.into(),
        }
    }

    /// Create an unknown override error.
    pub fn unknown_override(message: impl Into<String>) -> Self {
        Self::UnknownOverride {
            message: message.into(),
        }
    }

    /// Create a producer failure error.
    pub fn producer(key: Key, module: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Producer {
            key,
            module: module.into(),
            source,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
