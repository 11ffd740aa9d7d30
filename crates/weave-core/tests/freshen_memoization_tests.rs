// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use weave_core::StateValue;
use weave_dry_tests::grading_core;

use common::{committed, update_value};

#[test]
fn freshening_a_fresh_slot_never_reinvokes_definitions() {
    let (mut core, doc) = grading_core("x", &[]);
    let first = core.value(doc.answer, "creditAchievedIfSubmit").unwrap();
    let after_first = core.stats();

    let second = core.value(doc.answer, "creditAchievedIfSubmit").unwrap();
    let after_second = core.stats();

    assert_eq!(first, second);
    assert_eq!(
        after_first.definitions_run, after_second.definitions_run,
        "a fresh slot must be answered from cache"
    );
    assert!(after_second.cache_hits > after_first.cache_hits);
}

#[test]
fn identical_dependency_values_yield_identical_results() {
    let (mut core_a, doc_a) = grading_core("x", &[]);
    let (mut core_b, doc_b) = grading_core("x", &[]);
    committed(update_value(
        &mut core_a,
        doc_a.input,
        "value",
        StateValue::from("x"),
    ));
    committed(update_value(
        &mut core_b,
        doc_b.input,
        "value",
        StateValue::from("x"),
    ));
    assert_eq!(
        core_a.value(doc_a.answer, "creditAchievedIfSubmit").unwrap(),
        core_b.value(doc_b.answer, "creditAchievedIfSubmit").unwrap(),
    );
    assert_eq!(
        core_a.value(doc_a.document, "creditAchieved").unwrap(),
        core_b.value(doc_b.document, "creditAchieved").unwrap(),
    );
}

#[test]
fn reads_do_not_mutate_observable_state() {
    let (mut core, doc) = grading_core("x", &[]);
    let credit = core.value(doc.answer, "creditAchieved").unwrap();
    assert_eq!(credit, StateValue::Number(0.0));
    // Reading initialized the essential cell lazily, but it still reports
    // the declared default.
    let again = core.value(doc.answer, "creditAchieved").unwrap();
    assert_eq!(again, StateValue::Number(0.0));
}
