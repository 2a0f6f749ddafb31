//! Singleton lifecycle tests
//!
//! Values are produced on first use, memoized per key, and shared by every
//! consumer in the tree, including consumers reached over different paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use modwire::{create_context, named_module};

#[derive(Debug)]
struct Shared;

#[derive(Debug)]
struct LeftService {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct RightService {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct CenterService {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct RootService {
    left: Arc<LeftService>,
    right: Arc<RightService>,
    center: Arc<CenterService>,
}

fn diamond() -> modwire::ModuleRef {
    let shared = named_module("singleton::shared", |b| {
        b.provide(|_| Ok(Shared));
    });
    let left = named_module("singleton::left", {
        let shared = shared.clone();
        move |b| {
            b.dependency(&shared);
            b.provide(|cx| Ok(LeftService { shared: cx.get()? }));
        }
    });
    let right = named_module("singleton::right", {
        let shared = shared.clone();
        move |b| {
            b.dependency(&shared);
            b.provide(|cx| Ok(RightService { shared: cx.get()? }));
        }
    });
    let center = named_module("singleton::center", {
        let shared = shared.clone();
        move |b| {
            b.dependency(&shared);
            b.provide(|cx| Ok(CenterService { shared: cx.get()? }));
        }
    });
    named_module("singleton::root", {
        let (left, right, center) = (left.clone(), right.clone(), center.clone());
        move |b| {
            b.dependency(&left);
            b.dependency(&right);
            b.dependency(&center);
            b.provide(|cx| {
                Ok(RootService {
                    left: cx.get()?,
                    right: cx.get()?,
                    center: cx.get()?,
                })
            });
        }
    })
}

/// Test that nothing is produced before the first resolve
#[test]
fn test_production_is_lazy() {
    let produced = Arc::new(AtomicUsize::new(0));
    let declared = named_module("singleton::lazy", {
        let produced = Arc::clone(&produced);
        move |b| {
            let produced = Arc::clone(&produced);
            b.provide(move |_| {
                produced.fetch_add(1, Ordering::SeqCst);
                Ok(Shared)
            });
        }
    });

    let context = create_context(&declared).unwrap();
    assert_eq!(produced.load(Ordering::SeqCst), 0);

    context.resolve::<Shared>().unwrap();
    assert_eq!(produced.load(Ordering::SeqCst), 1);
}

/// Test that repeated resolves return the same instance
#[test]
fn test_resolution_is_idempotent() {
    let context = create_context(&diamond()).unwrap();
    let first: Arc<Shared> = context.resolve().unwrap();
    let second: Arc<Shared> = context.resolve().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

/// Test that all three diamond arms see one shared instance
#[test]
fn test_diamond_shares_one_singleton() {
    let context = create_context(&diamond()).unwrap();
    let root: Arc<RootService> = context.resolve().unwrap();

    assert!(Arc::ptr_eq(&root.left.shared, &root.right.shared));
    assert!(Arc::ptr_eq(&root.left.shared, &root.center.shared));

    let direct: Arc<Shared> = context.resolve().unwrap();
    assert!(Arc::ptr_eq(&direct, &root.left.shared));
}

/// Test that separate contexts do not share singletons
#[test]
fn test_contexts_are_isolated() {
    let tree = diamond();
    let first = create_context(&tree).unwrap();
    let second = create_context(&tree).unwrap();

    let a: Arc<Shared> = first.resolve().unwrap();
    let b: Arc<Shared> = second.resolve().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

/// Test that context clones share the memo
#[test]
fn test_context_clones_share_the_memo() {
    let context = create_context(&diamond()).unwrap();
    let clone = context.clone();

    let a: Arc<Shared> = context.resolve().unwrap();
    let b: Arc<Shared> = clone.resolve().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
