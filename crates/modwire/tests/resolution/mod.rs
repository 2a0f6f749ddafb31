//! Lazy resolution, singleton lifecycle, and failure behavior.

mod failure_test;
mod singleton_test;
