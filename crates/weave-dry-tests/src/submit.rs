// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The submit-answer action: the representative real transaction.
//!
//! The action reads several state variables first (credit that would be
//! achieved, the attempt-decay factors, the current responses), builds one
//! instruction batch, and hands it to the coordinator in a single call.
use weave_core::{
    ActionEvent, ActionRequest, ActionSource, ComponentIdx, Core, CoreError, Instruction,
    StateValue,
};

/// Name used as the action's source identity.
pub const SUBMIT_ACTION: &str = "submitAnswer";

/// Builds the submit-answer instruction batch for `answer`.
///
/// The attempt-decay factor for submission *n* (1-based) is
/// `creditByAttempt[min(n, len) - 1]`, applied at submit time only; an empty
/// factor list means no decay.
///
/// # Errors
/// Propagates fatal read errors from the engine.
pub fn submit_answer(core: &mut Core, answer: ComponentIdx) -> Result<ActionRequest, CoreError> {
    let raw_credit = core
        .value(answer, "creditAchievedIfSubmit")?
        .as_number()
        .unwrap_or(0.0);
    let factors = core.value(answer, "creditByAttempt")?;
    let submissions = core
        .value(answer, "numSubmissions")?
        .as_integer()
        .unwrap_or(0);
    let incorrect = core
        .value(answer, "numIncorrectSubmissions")?
        .as_integer()
        .unwrap_or(0);
    let responses = core.value(answer, "currentResponses")?;

    let attempt = submissions + 1;
    let factor = attempt_factor(&factors, attempt);
    let credit = raw_credit * factor;

    let mut instructions = Vec::new();
    let mut event = ActionEvent::new("submitted", answer.to_string())
        .with_result("creditAchieved", StateValue::Number(credit));
    if let Some(items) = responses.as_list() {
        for (k, response) in items.iter().enumerate() {
            instructions.push(Instruction::UpdateValue {
                component: answer,
                state_variable: format!("submittedResponse{}", k + 1),
                array_key: None,
                value: response.clone(),
            });
            event = event.with_result(format!("response{}", k + 1), response.clone());
        }
    }
    instructions.push(Instruction::UpdateValue {
        component: answer,
        state_variable: "numSubmissions".to_owned(),
        array_key: None,
        value: StateValue::Integer(submissions + 1),
    });
    if raw_credit < 1.0 {
        instructions.push(Instruction::UpdateValue {
            component: answer,
            state_variable: "numIncorrectSubmissions".to_owned(),
            array_key: None,
            value: StateValue::Integer(incorrect + 1),
        });
    }
    instructions.push(Instruction::UpdateValue {
        component: answer,
        state_variable: "creditAchieved".to_owned(),
        array_key: None,
        value: StateValue::Number(credit),
    });
    instructions.push(Instruction::UpdateValue {
        component: answer,
        state_variable: "justSubmitted".to_owned(),
        array_key: None,
        value: StateValue::Bool(true),
    });
    instructions.push(Instruction::RecordEvent { event });

    Ok(ActionRequest {
        source: ActionSource {
            component: answer,
            action: SUBMIT_ACTION,
        },
        instructions,
    })
}

/// Reads, builds, and dispatches the submit action in one call.
///
/// # Errors
/// Propagates fatal engine errors.
pub fn dispatch_submit(
    core: &mut Core,
    answer: ComponentIdx,
) -> Result<weave_core::TransactionOutcome, CoreError> {
    let request = submit_answer(core, answer)?;
    core.dispatch(&request)
}

fn attempt_factor(factors: &StateValue, attempt: i64) -> f64 {
    let Some(list) = factors.as_list() else {
        return 1.0;
    };
    if list.is_empty() {
        return 1.0;
    }
    let len = i64::try_from(list.len()).unwrap_or(i64::MAX);
    let index = usize::try_from(attempt.min(len).max(1) - 1).unwrap_or(0);
    list.get(index)
        .and_then(StateValue::as_number)
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_factor_saturates_at_the_last_entry() {
        let factors = StateValue::List(vec![
            StateValue::Number(1.0),
            StateValue::Number(0.7),
            StateValue::Number(0.5),
        ]);
        assert!((attempt_factor(&factors, 1) - 1.0).abs() < f64::EPSILON);
        assert!((attempt_factor(&factors, 2) - 0.7).abs() < f64::EPSILON);
        assert!((attempt_factor(&factors, 9) - 0.5).abs() < f64::EPSILON);
        assert!((attempt_factor(&StateValue::Null, 2) - 1.0).abs() < f64::EPSILON);
    }
}
