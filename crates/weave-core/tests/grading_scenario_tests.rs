// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use weave_core::{ComponentIdx, Core, StateValue};
use weave_dry_tests::{dispatch_submit, document_registry, grading_core, TreeBuilder};

use common::{committed, update_value};

fn set_input(core: &mut Core, input: ComponentIdx, text: &str) {
    committed(update_value(core, input, "value", StateValue::from(text)));
}

#[test]
fn correct_submission_then_unchanged_resubmission() {
    let (mut core, doc) = grading_core("x", &[("maxNumAttempts", StateValue::Integer(2))]);
    set_input(&mut core, doc.input, "x");
    committed(dispatch_submit(&mut core, doc.answer).unwrap());

    assert_eq!(
        core.value(doc.answer, "creditAchieved").unwrap(),
        StateValue::Number(1.0)
    );
    assert_eq!(
        core.value(doc.answer, "numSubmissions").unwrap(),
        StateValue::Integer(1)
    );
    assert_eq!(
        core.value(doc.answer, "numAttemptsLeft").unwrap(),
        StateValue::Integer(1)
    );
    assert_eq!(
        core.value(doc.answer, "justSubmitted").unwrap(),
        StateValue::Bool(true)
    );

    // Resubmit without editing: still submitted, still no incorrect count.
    committed(dispatch_submit(&mut core, doc.answer).unwrap());
    assert_eq!(
        core.value(doc.answer, "justSubmitted").unwrap(),
        StateValue::Bool(true)
    );
    assert_eq!(
        core.value(doc.answer, "numIncorrectSubmissions").unwrap(),
        StateValue::Integer(0)
    );
    assert_eq!(
        core.value(doc.answer, "numAttemptsLeft").unwrap(),
        StateValue::Integer(0)
    );
}

#[test]
fn attempt_decay_applies_at_submit_time_only() {
    let factors = StateValue::List(vec![
        StateValue::Number(1.0),
        StateValue::Number(0.7),
        StateValue::Number(0.5),
    ]);
    let (mut core, doc) = grading_core("x", &[("creditByAttempt", factors)]);

    set_input(&mut core, doc.input, "y");
    committed(dispatch_submit(&mut core, doc.answer).unwrap());
    assert_eq!(
        core.value(doc.answer, "creditAchieved").unwrap(),
        StateValue::Number(0.0)
    );
    assert_eq!(
        core.value(doc.answer, "numIncorrectSubmissions").unwrap(),
        StateValue::Integer(1)
    );

    set_input(&mut core, doc.input, "x");
    committed(dispatch_submit(&mut core, doc.answer).unwrap());
    let credit = core
        .value(doc.answer, "creditAchieved")
        .unwrap()
        .as_number()
        .unwrap();
    assert!(
        (credit - 0.7).abs() < 1e-12,
        "second attempt earns 1 x 0.7, got {credit}"
    );

    // The stored credit is a submit-time fact: nothing recomputes it later.
    assert_eq!(
        core.value(doc.answer, "numSubmissions").unwrap(),
        StateValue::Integer(2)
    );
}

#[test]
fn submitted_responses_record_the_submitted_text() {
    let (mut core, doc) = grading_core("x", &[]);
    set_input(&mut core, doc.input, "x");
    committed(dispatch_submit(&mut core, doc.answer).unwrap());
    assert_eq!(
        core.value(doc.answer, "submittedResponse1").unwrap(),
        StateValue::from("x")
    );
    // Editing after submission changes the current response, not the
    // submitted one.
    set_input(&mut core, doc.input, "xy");
    assert_eq!(
        core.value(doc.answer, "currentResponse1").unwrap(),
        StateValue::from("xy")
    );
    assert_eq!(
        core.value(doc.answer, "submittedResponse1").unwrap(),
        StateValue::from("x")
    );
}

#[test]
fn credited_award_cap_keeps_the_best_discovered_ranking() {
    // Three awards, credits 0.5 / 0.7 / 0.5, all fulfilled by "x".
    let mut builder = TreeBuilder::new();
    let document = builder.root("document");
    let answer = builder.child_with(document, "answer", |record| {
        record.with_attribute("nAwardsCredited", StateValue::Integer(1))
    });
    for credit in [0.5, 0.7, 0.5] {
        let _ = builder.child_with(answer, "award", |record| {
            record
                .with_attribute("matchText", StateValue::from("x"))
                .with_attribute("credit", StateValue::Number(credit))
        });
    }
    let input = builder.child(answer, "textInput");
    let mut core = Core::new(document_registry(), builder.build());

    set_input(&mut core, input, "x");
    assert_eq!(
        core.value(answer, "creditAchievedIfSubmit").unwrap(),
        StateValue::Number(0.7),
        "the cap keeps the highest-ranked award"
    );
}
