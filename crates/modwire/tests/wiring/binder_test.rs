//! Binder and module declaration tests
//!
//! Covers the three declaration forms (macro statics, named modules, and
//! caller-located anonymous modules) and the binder collection surface.

use std::sync::Arc;

use modwire::{create_context, key, module, named_module, Binding};

#[derive(Debug, PartialEq)]
struct Token(u32);

#[derive(Debug)]
struct Holder<T>(T);

modwire::module! {
    static MACRO_DECLARED = |b| {
        b.provide(|_| Ok(Token(1)));
    };
}

/// Test that macro statics derive their source from the declaring path
#[test]
fn test_macro_static_source_is_module_path() {
    assert_eq!(
        MACRO_DECLARED.source(),
        "integration::wiring::binder_test::MACRO_DECLARED"
    );
}

/// Test that anonymous modules label themselves with the caller location
#[test]
fn test_anonymous_module_source_is_caller_location() {
    let anonymous = module(|_| {});
    assert!(
        anonymous.source().contains("binder_test.rs"),
        "got: {}",
        anonymous.source()
    );
}

/// Test that materializing runs the builder and keeps declaration order
#[test]
fn test_materialize_keeps_declaration_order() {
    let lower = named_module("binder::lower", |_| {});
    let declared = named_module("binder::upper", {
        let lower = lower.clone();
        move |b| {
            b.dependency(&lower);
            b.provide(|_| Ok(Token(7)));
            b.provide(|_| Ok(String::from("second")));
        }
    });

    let module = declared.materialize();
    assert_eq!(module.source(), "binder::upper");
    assert_eq!(module.dependencies().len(), 1);
    assert_eq!(module.dependencies()[0].source(), "binder::lower");
    assert_eq!(module.bindings().len(), 2);
    assert_eq!(module.bindings()[0].key(), key::<Token>().erased());
    assert_eq!(module.bindings()[1].key(), key::<String>().erased());
    assert_eq!(module.bindings()[0].source(), "binder::upper");
}

/// Test that explicit keys and contributed bindings resolve like sugar forms
#[test]
fn test_bind_and_contribute_forms_are_equivalent() {
    let declared = named_module("binder::forms", |b| {
        b.bind(key::<Token>(), |_| Ok(Token(3)));
        b.contribute(Binding::of(key::<String>(), b.source().to_owned(), |_| {
            Ok(String::from("contributed"))
        }));
    });

    let context = create_context(&declared).unwrap();
    assert_eq!(*context.resolve::<Token>().unwrap(), Token(3));
    assert_eq!(*context.resolve::<String>().unwrap(), "contributed");
}

/// Test that generic instantiations occupy distinct slots
#[test]
fn test_generic_instantiations_are_distinct_keys() {
    let declared = named_module("binder::generics", |b| {
        b.provide(|_| Ok(Holder(42_u32)));
        b.provide(|_| Ok(Holder(String::from("s"))));
    });

    let context = create_context(&declared).unwrap();
    let number: Arc<Holder<u32>> = context.resolve().unwrap();
    let text: Arc<Holder<String>> = context.resolve().unwrap();
    assert_eq!(number.0, 42);
    assert_eq!(text.0, "s");
}
