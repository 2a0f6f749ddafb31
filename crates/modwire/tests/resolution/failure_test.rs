//! Producer failure handling
//!
//! Producer errors are attributed to the binding that failed, container
//! errors raised by nested resolves pass through unmodified, and a failure is
//! never memoized: the next resolve runs the producer again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use modwire::{create_context, named_module, Error, Key};

#[derive(Debug)]
struct Flaky(u32);

#[derive(Debug)]
struct Wrapper(#[allow(dead_code)] Arc<Flaky>);

/// Test that a failing producer is reported with its key and module
#[test]
fn test_producer_error_carries_key_and_module() {
    let declared = named_module("failure::boom", |b| {
        b.provide::<Flaky, _>(|_| Err(anyhow::anyhow!("backend offline")));
    });

    let context = create_context(&declared).unwrap();
    let error = context.resolve::<Flaky>().unwrap_err();
    assert!(
        matches!(error, Error::Producer { key, .. } if key == Key::of::<Flaky>()),
        "got: {error}"
    );
    let rendered = error.to_string();
    assert!(rendered.contains("failure::boom"), "got: {rendered}");
    assert!(rendered.contains("backend offline"), "got: {rendered}");
}

/// Test that a dependency failure surfaces as the dependency's error
#[test]
fn test_nested_failure_is_not_rewrapped() {
    let declared = named_module("failure::nested", |b| {
        b.provide::<Flaky, _>(|_| Err(anyhow::anyhow!("backend offline")));
        b.provide(|cx| Ok(Wrapper(cx.get()?)));
    });

    let context = create_context(&declared).unwrap();
    let error = context.resolve::<Wrapper>().unwrap_err();
    // The failure belongs to Flaky's producer, not Wrapper's.
    assert!(
        matches!(error, Error::Producer { key, .. } if key == Key::of::<Flaky>()),
        "got: {error}"
    );
}

/// Test that a missing dependency surfaces as a missing binding
#[test]
fn test_missing_dependency_passes_through() {
    let declared = named_module("failure::missing", |b| {
        b.provide(|cx| Ok(Wrapper(cx.get()?)));
    });

    let context = create_context(&declared).unwrap();
    let error = context.resolve::<Wrapper>().unwrap_err();
    assert!(
        matches!(error, Error::MissingBinding { key } if key == Key::of::<Flaky>()),
        "got: {error}"
    );
    assert!(
        error.to_string().contains("not found in context"),
        "got: {error}"
    );
}

/// Test that an optional resolve keeps a dependency's missing binding
#[test]
fn test_optional_does_not_absorb_nested_missing_bindings() {
    #[derive(Debug)]
    struct Backend;
    #[derive(Debug)]
    struct Gateway(#[allow(dead_code)] Arc<Backend>);
    #[derive(Debug)]
    struct Edge(#[allow(dead_code)] Option<Arc<Gateway>>);

    let declared = named_module("failure::optional", |b| {
        b.provide(|cx| Ok(Gateway(cx.get()?)));
        b.provide(|cx| Ok(Edge(cx.get_optional()?)));
    });

    let context = create_context(&declared).unwrap();
    let error = context.resolve::<Edge>().unwrap_err();
    // Gateway is bound; the missing key is Backend, and only an absent
    // Gateway may read as None.
    assert!(
        matches!(error, Error::MissingBinding { key } if key == Key::of::<Backend>()),
        "got: {error}"
    );
}

/// Test that failures are not memoized and the producer runs again
#[test]
fn test_resolve_retries_after_failure() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let declared = named_module("failure::retry", {
        let attempts = Arc::clone(&attempts);
        move |b| {
            let attempts = Arc::clone(&attempts);
            b.provide(move |_| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow::anyhow!("cold start"))
                } else {
                    Ok(Flaky(11))
                }
            });
        }
    });

    let context = create_context(&declared).unwrap();
    assert!(context.resolve::<Flaky>().is_err());

    let recovered: Arc<Flaky> = context.resolve().unwrap();
    assert_eq!(recovered.0, 11);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    // Success is memoized; no third run.
    let again: Arc<Flaky> = context.resolve().unwrap();
    assert!(Arc::ptr_eq(&recovered, &again));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
