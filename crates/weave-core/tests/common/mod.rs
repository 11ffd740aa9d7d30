// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Helpers shared across the integration suite.
use weave_core::{
    ActionRequest, ActionSource, ComponentIdx, Core, Instruction, StateValue, TransactionOutcome,
};

/// Dispatches a single `updateValue` as its own action.
pub fn update_value(
    core: &mut Core,
    component: ComponentIdx,
    state_variable: &str,
    value: StateValue,
) -> TransactionOutcome {
    let request = ActionRequest {
        source: ActionSource {
            component,
            action: "updateValue",
        },
        instructions: vec![Instruction::UpdateValue {
            component,
            state_variable: state_variable.to_owned(),
            array_key: None,
            value,
        }],
    };
    core.dispatch(&request).unwrap()
}

/// Asserts the outcome committed and returns its receipt.
pub fn committed(outcome: TransactionOutcome) -> weave_core::TransactionReceipt {
    match outcome {
        TransactionOutcome::Committed(receipt) => receipt,
        TransactionOutcome::Rejected { rejection, .. } => {
            panic!("expected commit, got rejection: {rejection}")
        }
    }
}
