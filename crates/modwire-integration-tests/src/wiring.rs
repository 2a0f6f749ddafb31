//! Module tree for the search service.
//!
//! [`APP`] is the launchable root. [`Server`] and [`Indexer`] both resolve
//! the [`SearchIndex`] binding, so they share one index instance per context.
//! Settings come from [`RuntimeArgs`](modwire::RuntimeArgs), which a
//! composition binds at launch.

use std::sync::Arc;

use modwire::{module, RuntimeArgs};

use crate::services::{InMemoryIndex, Indexer, SearchIndex, Server, Settings};

module! {
    /// Settings read from captured process arguments.
    pub static SETTINGS = |b| {
        b.provide(|cx| {
            let args: Arc<RuntimeArgs> = cx.get()?;
            Ok(Settings::from_args(&args))
        });
    };

    /// The index, bound behind its trait.
    pub static INDEX = |b| {
        b.provide_arc::<dyn SearchIndex, _>(|_| {
            let index: Arc<dyn SearchIndex> = Arc::new(InMemoryIndex::new());
            Ok(index)
        });
    };

    /// Seeding over the shared index.
    pub static INDEXER = |b| {
        b.dependency(&INDEX);
        b.dependency(&SETTINGS);
        b.provide(|cx| {
            Ok(Indexer {
                index: cx.get()?,
                settings: cx.get()?,
            })
        });
    };

    /// Launchable root binding the server entry point.
    pub static APP = |b| {
        b.dependency(&INDEXER);
        b.provide(|cx| {
            Ok(Server {
                indexer: cx.get()?,
                index: cx.get()?,
                settings: cx.get()?,
            })
        });
    };
}
