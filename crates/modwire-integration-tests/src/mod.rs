//! End-to-end exercise of modwire as an application would use it.
//!
//! A small search service is wired as a module tree: settings read from
//! captured process arguments, an index behind a trait object, an indexer
//! seeding it, and a server entry point reporting on a full pass. The tests
//! launch the tree through compositions and replace pieces of it with
//! overrides.

pub mod services;
pub mod wiring;
