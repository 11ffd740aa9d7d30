// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use weave_core::{StateValue, TransactionOutcome, WriteRejection};
use weave_dry_tests::grading_core;

use common::{committed, update_value};

#[test]
fn inverse_then_freshen_round_trips() {
    let (mut core, doc) = grading_core("x", &[]);
    committed(update_value(
        &mut core,
        doc.input,
        "value",
        StateValue::from("hello"),
    ));
    assert_eq!(
        core.value(doc.input, "value").unwrap(),
        StateValue::from("hello")
    );
}

#[test]
fn declared_clamping_applies_on_the_way_in() {
    let (mut core, doc) = grading_core("x", &[]);
    committed(update_value(
        &mut core,
        doc.answer,
        "creditAchieved",
        StateValue::Number(1.5),
    ));
    assert_eq!(
        core.value(doc.answer, "creditAchieved").unwrap(),
        StateValue::Number(1.0)
    );
}

#[test]
fn writes_to_read_only_variables_are_rejected_not_fatal() {
    let (mut core, doc) = grading_core("x", &[]);
    let outcome = update_value(
        &mut core,
        doc.answer,
        "creditAchievedIfSubmit",
        StateValue::Number(1.0),
    );
    let TransactionOutcome::Rejected { rejection, .. } = outcome else {
        panic!("write against a variable with no inverse must be rejected");
    };
    assert!(matches!(rejection, WriteRejection::ReadOnly { .. }));
    // Silent no-op for the interactive surface, warning for the author.
    assert!(!core.drain_warnings().is_empty());
    assert_eq!(
        core.value(doc.answer, "creditAchievedIfSubmit").unwrap(),
        StateValue::Number(0.0)
    );
}

#[test]
fn inverse_failures_mutate_nothing() {
    let (mut core, doc) = grading_core("x", &[]);
    let outcome = update_value(&mut core, doc.input, "value", StateValue::Integer(7));
    let TransactionOutcome::Rejected { rejection, .. } = outcome else {
        panic!("a text input cannot absorb an integer");
    };
    assert!(matches!(rejection, WriteRejection::InverseFailed { .. }));
    assert_eq!(
        core.value(doc.input, "value").unwrap(),
        StateValue::from("")
    );
}
