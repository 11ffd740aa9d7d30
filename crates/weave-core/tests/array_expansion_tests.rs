// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
mod common;

use proptest::prelude::*;
use weave_core::{
    ActionRequest, ActionSource, ComponentIdx, Core, Instruction, StateValue,
};
use weave_dry_tests::{document_registry, probe_registry, TreeBuilder};

use common::{committed, update_value};

/// `document > answer > textInput x3`.
fn three_input_answer() -> (Core, ComponentIdx) {
    let mut builder = TreeBuilder::new();
    let document = builder.root("document");
    let answer = builder.child(document, "answer");
    for _ in 0..3 {
        let _ = builder.child(answer, "textInput");
    }
    (Core::new(document_registry(), builder.build()), answer)
}

fn sequence_core() -> (Core, ComponentIdx) {
    let mut builder = TreeBuilder::new();
    let sequence = builder.root("sequence");
    (Core::new(probe_registry(), builder.build()), sequence)
}

#[test]
fn unsupplied_keys_take_the_declared_placeholder() {
    let (mut core, answer) = three_input_answer();
    let request = ActionRequest {
        source: ActionSource {
            component: answer,
            action: "seed",
        },
        instructions: vec![
            Instruction::UpdateValue {
                component: answer,
                state_variable: "submittedResponse1".to_owned(),
                array_key: None,
                value: StateValue::from("a"),
            },
            Instruction::UpdateValue {
                component: answer,
                state_variable: "submittedResponse2".to_owned(),
                array_key: None,
                value: StateValue::from("b"),
            },
        ],
    };
    committed(core.dispatch(&request).unwrap());

    assert_eq!(core.array_len(answer, "submittedResponses").unwrap(), 3);
    assert_eq!(
        core.value(answer, "submittedResponse3").unwrap(),
        StateValue::Null,
        "a key with no essential value reads the declared placeholder"
    );
    assert_eq!(
        core.value(answer, "submittedResponses").unwrap(),
        StateValue::List(vec![
            StateValue::from("a"),
            StateValue::from("b"),
            StateValue::Null
        ])
    );
}

#[test]
fn aliased_entry_reads_match_whole_array_reads() {
    let (mut core, answer) = three_input_answer();
    committed(update_value(
        &mut core,
        answer,
        "submittedResponse2",
        StateValue::from("b"),
    ));
    let whole = core.value(answer, "submittedResponses").unwrap();
    let entry = core.value(answer, "submittedResponse2").unwrap();
    assert_eq!(whole.as_list().unwrap()[1], entry);
}

#[test]
fn array_definitions_declare_their_element_type() {
    let (mut core, answer) = three_input_answer();
    let _ = core.value(answer, "submittedResponses").unwrap();
    assert_eq!(
        core.array_element_type(answer, "submittedResponses"),
        Some("text")
    );
}

#[test]
fn extra_key_writes_grow_the_declared_size() {
    let (mut core, answer) = three_input_answer();
    committed(update_value(
        &mut core,
        answer,
        "submittedResponse5",
        StateValue::from("e"),
    ));
    assert_eq!(core.array_len(answer, "submittedResponses").unwrap(), 5);
    assert_eq!(
        core.value(answer, "submittedResponse5").unwrap(),
        StateValue::from("e")
    );
    assert_eq!(
        core.value(answer, "submittedResponse4").unwrap(),
        StateValue::Null
    );
}

#[test]
fn growth_preserves_existing_keys_without_reresolution() {
    let (mut core, sequence) = sequence_core();
    assert_eq!(
        core.value(sequence, "items").unwrap(),
        StateValue::List(vec![
            StateValue::Integer(1),
            StateValue::Integer(4),
            StateValue::Integer(9)
        ])
    );
    let before = core.stats();
    committed(update_value(
        &mut core,
        sequence,
        "length",
        StateValue::Integer(5),
    ));
    assert_eq!(
        core.value(sequence, "items").unwrap(),
        StateValue::List(vec![
            StateValue::Integer(1),
            StateValue::Integer(4),
            StateValue::Integer(9),
            StateValue::Integer(16),
            StateValue::Integer(25)
        ])
    );
    let after = core.stats();
    assert_eq!(
        after.edges_rebuilt - before.edges_rebuilt,
        2,
        "only the two new keys may resolve edges"
    );
}

#[test]
fn shrinking_keeps_the_prefix_and_unreaches_the_tail() {
    let (mut core, sequence) = sequence_core();
    let _ = core.value(sequence, "items").unwrap();
    let before = core.stats();
    committed(update_value(
        &mut core,
        sequence,
        "length",
        StateValue::Integer(2),
    ));
    assert_eq!(
        core.value(sequence, "items").unwrap(),
        StateValue::List(vec![StateValue::Integer(1), StateValue::Integer(4)])
    );
    let after = core.stats();
    assert_eq!(
        after.edges_rebuilt, before.edges_rebuilt,
        "shrinking must not re-resolve surviving keys"
    );
    // Keys past the new size are unreachable.
    assert_eq!(core.value(sequence, "item3").unwrap(), StateValue::Null);
}

proptest! {
    #[test]
    fn resizing_always_yields_the_computed_prefix(
        first in 0_i64..12,
        second in 0_i64..12,
    ) {
        let (mut core, sequence) = sequence_core();
        for length in [first, second] {
            committed(update_value(
                &mut core,
                sequence,
                "length",
                StateValue::Integer(length),
            ));
            let items = core.value(sequence, "items").unwrap();
            let expected: Vec<StateValue> = (0..length)
                .map(|k| StateValue::Integer((k + 1) * (k + 1)))
                .collect();
            prop_assert_eq!(items, StateValue::List(expected));
        }
    }
}
