// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use weave_core::{ChangeSignal, StateValue};
use weave_dry_tests::grading_core;

use common::{committed, update_value};

#[test]
fn essential_writes_reach_transitive_dependents() {
    let (mut core, doc) = grading_core("x", &[]);
    // document.creditAchieved <- answer.creditAchieved <- essential cell.
    assert_eq!(
        core.value(doc.document, "creditAchieved").unwrap(),
        StateValue::Number(0.0)
    );
    committed(update_value(
        &mut core,
        doc.answer,
        "creditAchieved",
        StateValue::Number(0.6),
    ));
    assert_eq!(
        core.value(doc.document, "creditAchieved").unwrap(),
        StateValue::Number(0.6)
    );
}

#[test]
fn unchanged_recomputes_short_circuit_downstream() {
    let (mut core, doc) = grading_core("x", &[]);
    committed(update_value(
        &mut core,
        doc.input,
        "value",
        StateValue::from("x"),
    ));
    let fulfilled = core.value(doc.award, "fulfilled").unwrap();
    assert_eq!(fulfilled, StateValue::Bool(true));

    // Rewrite the same value: the whole chain is marked stale, but the
    // award's inputs compare equal, so its definition is skipped.
    let before = core.stats();
    committed(update_value(
        &mut core,
        doc.input,
        "value",
        StateValue::from("x"),
    ));
    let fulfilled = core.value(doc.award, "fulfilled").unwrap();
    let after = core.stats();
    assert_eq!(fulfilled, StateValue::Bool(true));
    assert!(
        after.early_cutoffs > before.early_cutoffs,
        "an unchanged input value must short-circuit the award recompute"
    );
}

#[test]
fn was_touched_variables_defeat_the_short_circuit() {
    let (mut core, doc) = grading_core("x", &[]);
    committed(update_value(
        &mut core,
        doc.answer,
        "justSubmitted",
        StateValue::Bool(true),
    ));
    assert_eq!(
        core.value(doc.answer, "submitLabel").unwrap(),
        StateValue::from("submitted")
    );
    let before = core.stats();

    // Same value again: justSubmitted carries was-touched semantics, so the
    // label recomputes even though nothing changed.
    committed(update_value(
        &mut core,
        doc.answer,
        "justSubmitted",
        StateValue::Bool(true),
    ));
    assert_eq!(
        core.value(doc.answer, "submitLabel").unwrap(),
        StateValue::from("submitted")
    );
    let after = core.stats();
    assert!(
        after.definitions_run >= before.definitions_run + 2,
        "the touch signal must rerun both the source and its dependent"
    );
}

#[test]
fn renderer_variables_produce_change_notices() {
    let (mut core, doc) = grading_core("x", &[]);
    let _ = core.value(doc.input, "value").unwrap();
    let _ = core.drain_changes();

    committed(update_value(
        &mut core,
        doc.input,
        "value",
        StateValue::from("x"),
    ));
    let changes = core.drain_changes();
    assert!(changes
        .iter()
        .any(|c| c.component == doc.input
            && c.variable == "value"
            && c.signal == ChangeSignal::ValueChanged));
}

#[test]
fn recreated_components_signal_component_fresh() {
    let (mut core, doc) = grading_core("x", &[]);
    let _ = core.value(doc.input, "value").unwrap();
    let _ = core.drain_changes();

    core.component_created(doc.input);
    let changes = core.drain_changes();
    assert!(changes
        .iter()
        .any(|c| c.component == doc.input
            && c.variable == "value"
            && c.signal == ChangeSignal::ComponentFresh));
}
