// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use weave_core::{ComponentIdx, Core, CoreError, StateValue};
use weave_dry_tests::{grading_core, probe_registry, TreeBuilder, READ_ONLY_FLAG};

use common::{committed, update_value};

#[test]
fn circular_dependencies_report_the_full_chain() {
    let mut builder = TreeBuilder::new();
    let looped = builder.root("loop");
    let mut core = Core::new(probe_registry(), builder.build());

    let err = core.value(looped, "a").unwrap_err();
    let CoreError::CircularDependency { chain } = err else {
        panic!("expected a circular dependency, got: {err}");
    };
    assert!(chain.len() >= 3);
    assert_eq!(chain.first(), chain.last());
    // The failure aborts the slot, not the tree: an unrelated variable on
    // another component still evaluates.
}

#[test]
fn missing_required_targets_are_fatal_and_named() {
    // An award with no answer ancestor cannot bind its response dependency.
    let mut builder = TreeBuilder::new();
    let award = builder.root("award");
    let mut core = Core::new(probe_registry(), builder.build());

    let err = core.value(award, "fulfilled").unwrap_err();
    let CoreError::Resolution { dependency, .. } = err else {
        panic!("expected a resolution error, got: {err}");
    };
    assert_eq!(dependency, "response");
    // The award's other variable is unaffected.
    assert_eq!(
        core.value(award, "credit").unwrap(),
        StateValue::Number(1.0)
    );
}

#[test]
fn unknown_variables_are_fatal() {
    let (mut core, doc) = grading_core("x", &[]);
    let err = core.value(doc.answer, "nope").unwrap_err();
    assert!(matches!(err, CoreError::UnknownVariable { .. }));
}

#[test]
fn dependency_shape_follows_determining_values() {
    // selector > (textInput, award): the descendant query it runs depends on
    // its own `mode` variable.
    let mut builder = TreeBuilder::new();
    let selector = builder.root("selector");
    let input = builder.child(selector, "textInput");
    let _award = builder.child_with(selector, "award", |record| {
        record.with_attribute("credit", StateValue::Number(0.25))
    });
    let mut core = Core::new(probe_registry(), builder.build());

    committed(update_value(
        &mut core,
        input,
        "value",
        StateValue::from("typed"),
    ));
    assert_eq!(
        core.value(selector, "collected").unwrap(),
        StateValue::List(vec![StateValue::from("typed")])
    );

    let before = core.stats();
    committed(update_value(
        &mut core,
        selector,
        "mode",
        StateValue::from("awards"),
    ));
    assert_eq!(
        core.value(selector, "collected").unwrap(),
        StateValue::List(vec![StateValue::Number(0.25)])
    );
    let after = core.stats();
    assert!(
        after.edges_rebuilt > before.edges_rebuilt,
        "a determining-value change must rebuild the edge set"
    );
}

#[test]
fn flags_resolve_through_the_dependency_graph() {
    let (mut core, doc) = grading_core("x", &[]);
    assert_eq!(
        core.value(doc.input, "disabled").unwrap(),
        StateValue::Bool(false)
    );
    core.set_flag(READ_ONLY_FLAG, StateValue::Bool(true));
    assert_eq!(
        core.value(doc.input, "disabled").unwrap(),
        StateValue::Bool(true)
    );
    core.set_flag(READ_ONLY_FLAG, StateValue::Bool(false));
    assert_eq!(
        core.value(doc.input, "disabled").unwrap(),
        StateValue::Bool(false)
    );
}

#[test]
fn structural_removal_discards_slots_and_rebinds_dependents() {
    let (mut core, doc) = grading_core("x", &[]);
    committed(update_value(
        &mut core,
        doc.input,
        "value",
        StateValue::from("x"),
    ));
    assert_eq!(
        core.value(doc.award, "fulfilled").unwrap(),
        StateValue::Bool(true)
    );
    assert_eq!(core.array_len(doc.answer, "currentResponses").unwrap(), 1);

    core.remove_component(doc.input);
    assert_eq!(core.array_len(doc.answer, "currentResponses").unwrap(), 0);
    assert_eq!(
        core.value(doc.award, "fulfilled").unwrap(),
        StateValue::Bool(false),
        "the award now sees no response at all"
    );
}

#[test]
fn definition_warnings_reach_the_sink_without_halting() {
    let (mut core, doc) = grading_core("", &[]);
    let fulfilled = core.value(doc.award, "fulfilled").unwrap();
    assert_eq!(fulfilled, StateValue::Bool(false));
    let warnings = core.drain_warnings();
    assert!(warnings
        .iter()
        .any(|w| w.message.contains("empty match text")));
}

#[test]
fn source_composite_bindings_are_optional() {
    let mut builder = TreeBuilder::new();
    let input = builder.root("textInput");
    let linked = builder.child_with(input, "mirror", |record| record.with_source_composite(input));
    let unlinked = builder.child(input, "mirror");
    let mut core = Core::new(probe_registry(), builder.build());

    committed(update_value(
        &mut core,
        input,
        "value",
        StateValue::from("shared"),
    ));
    assert_eq!(
        core.value(linked, "reflected").unwrap(),
        StateValue::from("shared")
    );
    assert_eq!(
        core.value(unlinked, "reflected").unwrap(),
        StateValue::from("unlinked"),
        "a missing optional composite is omitted, not fatal"
    );
}

#[test]
fn inserted_components_join_existing_selections() {
    let (mut core, doc) = grading_core("x", &[]);
    assert_eq!(core.array_len(doc.answer, "currentResponses").unwrap(), 1);

    let extra = ComponentIdx(100);
    core.insert_component(
        extra,
        weave_core::ComponentRecord::new("textInput").with_parent(doc.answer),
    )
    .unwrap();
    assert_eq!(core.array_len(doc.answer, "currentResponses").unwrap(), 2);
    assert_eq!(
        core.value(doc.answer, "currentResponse2").unwrap(),
        StateValue::from("")
    );
}
