// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use weave_core::{
    ActionEvent, ActionRequest, ActionSource, Instruction, StateValue, TransactionOutcome,
};
use weave_dry_tests::{dispatch_submit, grading_core};

use common::{committed, update_value};

#[test]
fn one_rejected_instruction_voids_the_whole_batch() {
    let (mut core, doc) = grading_core("x", &[]);
    let request = ActionRequest {
        source: ActionSource {
            component: doc.answer,
            action: "mixed",
        },
        instructions: vec![
            Instruction::UpdateValue {
                component: doc.input,
                state_variable: "value".to_owned(),
                array_key: None,
                value: StateValue::from("x"),
            },
            // Read-only target: the batch must not apply at all.
            Instruction::UpdateValue {
                component: doc.answer,
                state_variable: "creditAchievedIfSubmit".to_owned(),
                array_key: None,
                value: StateValue::Number(1.0),
            },
            Instruction::RecordEvent {
                event: ActionEvent::new("submitted", doc.answer.to_string()),
            },
        ],
    };
    let outcome = core.dispatch(&request).unwrap();
    assert!(matches!(outcome, TransactionOutcome::Rejected { .. }));
    assert_eq!(
        core.value(doc.input, "value").unwrap(),
        StateValue::from(""),
        "no essential value in a rejected batch may be mutated"
    );
    assert!(
        core.drain_events().is_empty(),
        "a rejected batch emits none of its events"
    );
}

#[test]
fn committed_batches_report_their_receipt_and_events() {
    let (mut core, doc) = grading_core("x", &[]);
    committed(update_value(
        &mut core,
        doc.input,
        "value",
        StateValue::from("x"),
    ));
    let receipt = committed(dispatch_submit(&mut core, doc.answer).unwrap());
    assert!(receipt.essential_writes >= 4);
    assert_eq!(receipt.events_recorded, 1);
    assert!(receipt.slots_marked_stale > 0);

    let events = core.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].verb, "submitted");
    assert_eq!(
        events[0].result.get("creditAchieved"),
        Some(&StateValue::Number(1.0))
    );
}

#[test]
fn superseded_actions_apply_only_the_latest() {
    let (mut core, doc) = grading_core("x", &[]);
    let typing = |text: &str| ActionRequest {
        source: ActionSource {
            component: doc.input,
            action: "typeText",
        },
        instructions: vec![Instruction::UpdateValue {
            component: doc.input,
            state_variable: "value".to_owned(),
            array_key: None,
            value: StateValue::from(text),
        }],
    };
    core.enqueue_action(typing("a"));
    core.enqueue_action(typing("ab"));
    let outcomes = core.flush_actions().unwrap();
    assert_eq!(outcomes.len(), 1, "same-source actions must supersede");
    assert_eq!(
        core.value(doc.input, "value").unwrap(),
        StateValue::from("ab")
    );
}

#[test]
fn distinct_sources_stay_serialized_in_order() {
    let (mut core, doc) = grading_core("x", &[]);
    core.enqueue_action(ActionRequest {
        source: ActionSource {
            component: doc.input,
            action: "typeText",
        },
        instructions: vec![Instruction::UpdateValue {
            component: doc.input,
            state_variable: "value".to_owned(),
            array_key: None,
            value: StateValue::from("x"),
        }],
    });
    core.enqueue_action(ActionRequest {
        source: ActionSource {
            component: doc.answer,
            action: "touch",
        },
        instructions: vec![Instruction::UpdateValue {
            component: doc.answer,
            state_variable: "justSubmitted".to_owned(),
            array_key: None,
            value: StateValue::Bool(true),
        }],
    });
    let outcomes = core.flush_actions().unwrap();
    assert_eq!(outcomes.len(), 2);
    let first = committed(outcomes[0].clone());
    let second = committed(outcomes[1].clone());
    assert!(first.tx < second.tx, "transaction ids are issued in order");
}

#[test]
fn direct_essential_writes_bypass_inverse_planning() {
    let (mut core, doc) = grading_core("x", &[]);
    let request = ActionRequest {
        source: ActionSource {
            component: doc.answer,
            action: "restore",
        },
        instructions: vec![Instruction::SetEssentialValue {
            component: doc.answer,
            state_variable: "numSubmissions".to_owned(),
            array_key: None,
            value: StateValue::Integer(4),
        }],
    };
    committed(core.dispatch(&request).unwrap());
    assert_eq!(
        core.value(doc.answer, "numSubmissions").unwrap(),
        StateValue::Integer(4)
    );
}
