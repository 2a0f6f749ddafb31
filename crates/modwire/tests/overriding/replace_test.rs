//! Override precedence tests
//!
//! Replaced producers win over the originals at any depth of the tree, the
//! un-replaced remainder keeps its production wiring, and the original tree
//! is never touched.

use std::sync::Arc;

use modwire::{create_context, key, named_module, override_module, Error, Overrides};

use crate::support::text_stack::{LowerSuffix, UpperService, UpperSuffix, LOWER, UPPER};

fn map_output(tree: &modwire::ModuleRef) -> String {
    let context = create_context(tree).unwrap();
    let service: Arc<UpperService> = context.resolve().unwrap();
    service.map("Output: ")
}

/// Test that the unmodified stack maps both suffixes in order
#[test]
fn test_baseline_output() {
    crate::support::init_logging();
    assert_eq!(map_output(&UPPER), "Output: AB");
}

/// Test that replacing the root module's own binding changes the output
#[test]
fn test_replace_on_the_addressed_module() {
    let adjusted = override_module(
        &UPPER,
        Overrides::new().replace(key::<UpperSuffix>(), |_| Ok(UpperSuffix("A1".to_owned()))),
    )
    .unwrap();

    assert_eq!(map_output(&adjusted), "Output: A1B");
}

/// Test that nested specs reach bindings deeper in the tree
#[test]
fn test_replace_through_a_submodule_path() {
    let adjusted = override_module(
        &UPPER,
        Overrides::new().submodule(
            &LOWER,
            Overrides::new().replace(key::<LowerSuffix>(), |_| Ok(LowerSuffix("B1".to_owned()))),
        ),
    )
    .unwrap();

    assert_eq!(map_output(&adjusted), "Output: AB1");
}

/// Test that replacements at several depths combine
#[test]
fn test_replace_at_several_depths() {
    let adjusted = override_module(
        &UPPER,
        Overrides::new()
            .replace(key::<UpperSuffix>(), |_| Ok(UpperSuffix("A1".to_owned())))
            .submodule(
                &LOWER,
                Overrides::new()
                    .replace(key::<LowerSuffix>(), |_| Ok(LowerSuffix("B1".to_owned()))),
            ),
    )
    .unwrap();

    assert_eq!(map_output(&adjusted), "Output: A1B1");
}

/// Test that applying an override leaves the original tree unchanged
#[test]
fn test_original_tree_is_unaffected() {
    let adjusted = override_module(
        &UPPER,
        Overrides::new().replace(key::<UpperSuffix>(), |_| Ok(UpperSuffix("X".to_owned()))),
    )
    .unwrap();

    assert_eq!(map_output(&adjusted), "Output: XB");
    assert_eq!(map_output(&UPPER), "Output: AB");
}

/// Test that a replacement for a binding the module lacks is rejected
#[test]
fn test_replacement_must_address_a_declared_binding() {
    // LowerSuffix lives in LOWER, not in the root module.
    let error = override_module(
        &UPPER,
        Overrides::new().replace(key::<LowerSuffix>(), |_| Ok(LowerSuffix(String::new()))),
    )
    .unwrap_err();

    assert!(matches!(error, Error::UnknownOverride { .. }), "got: {error}");
    assert!(
        error.to_string().contains("is not declared in module"),
        "got: {error}"
    );
}

/// Test that a nested spec must address a direct dependency
#[test]
fn test_submodule_must_be_a_direct_dependency() {
    let stranger = named_module("overriding::stranger", |b| {
        b.provide(|_| Ok(LowerSuffix(String::new())));
    });
    let error = override_module(
        &UPPER,
        Overrides::new().submodule(
            &stranger,
            Overrides::new().replace(key::<LowerSuffix>(), |_| Ok(LowerSuffix(String::new()))),
        ),
    )
    .unwrap_err();

    assert!(matches!(error, Error::UnknownOverride { .. }), "got: {error}");
    assert!(
        error.to_string().contains("is not a dependency of"),
        "got: {error}"
    );
}

/// Test that validation rejects bad specs even when another branch is valid
#[test]
fn test_validation_is_fail_fast() {
    let error = override_module(
        &UPPER,
        Overrides::new()
            .replace(key::<UpperSuffix>(), |_| Ok(UpperSuffix("ok".to_owned())))
            .replace(key::<u128>(), |_| Ok(0_u128)),
    )
    .unwrap_err();

    assert!(matches!(error, Error::UnknownOverride { .. }), "got: {error}");
    // Nothing was rewritten on the way out.
    assert_eq!(map_output(&UPPER), "Output: AB");
}
