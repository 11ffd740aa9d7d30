// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The demo document component-type set: document, textInput, answer, award.
//!
//! This is the shape a real consumer registers: flat descriptors assembled by
//! explicit composition. Shared variable bundles are plain functions returning
//! definition lists, merged into a descriptor before registration — there is
//! no inheritance chain to walk at runtime.
use std::collections::BTreeMap;

use weave_core::{
    ArrayKeyDependencies, ArraySpec, ChangeSignal, ComponentRegistry, ComponentTypeDescriptor,
    ComputedValue, DefinitionContext, DefinitionResult, DependencySpec, InverseContext,
    InverseInstruction, InverseResult, StateValue, StateVariableDefinition, VariableCaps,
    VariableKind, WarnLevel,
};

/// Host flag consulted by `textInput.disabled`.
pub const READ_ONLY_FLAG: &str = "readOnly";

/// Builds the registry for the demo document types.
///
/// # Panics
/// Panics when the descriptor tables are internally inconsistent; that is a
/// bug in the fixtures, not in the caller.
#[must_use]
pub fn document_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    for descriptor in [
        document_type(),
        text_input_type(),
        answer_type(),
        award_type(),
    ] {
        if let Err(err) = registry.register(descriptor) {
            unreachable!("demo registry is internally inconsistent: {err}");
        }
    }
    registry
}

// ── document ───────────────────────────────────────────────────────

fn document_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "document",
        groups: &[],
        variables: vec![StateVariableDefinition {
            return_dependencies: |_| {
                BTreeMap::from([(
                    "answers",
                    DependencySpec::Descendant {
                        groups: vec!["answer"],
                        variables: vec!["creditAchieved"],
                        variables_optional: false,
                        index: None,
                    },
                )])
            },
            ..StateVariableDefinition::scalar("creditAchieved", document_credit_definition)
        }],
    }
}

/// Mean credit over every answer in the document (0 when there are none).
fn document_credit_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let answers = ctx.values.components("answers");
    if answers.is_empty() {
        return DefinitionResult::set_value(0.0);
    }
    let total: f64 = answers
        .iter()
        .filter_map(|a| a.values.get("creditAchieved"))
        .filter_map(StateValue::as_number)
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total / answers.len() as f64;
    DefinitionResult::set_value(mean)
}

// ── textInput ──────────────────────────────────────────────────────

fn text_input_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "textInput",
        groups: &["input"],
        variables: vec![
            StateVariableDefinition {
                inverse: Some(text_value_inverse),
                mark_stale: Some(|ctx| {
                    Some(if ctx.component_just_created {
                        ChangeSignal::ComponentFresh
                    } else {
                        ChangeSignal::ValueChanged
                    })
                }),
                caps: VariableCaps {
                    has_essential: true,
                    for_renderer: true,
                    ..VariableCaps::default()
                },
                default: Some(|| StateValue::Text(String::new())),
                ..StateVariableDefinition::scalar("value", |_| DefinitionResult::essential())
            },
            StateVariableDefinition {
                return_dependencies: |_| {
                    BTreeMap::from([("readOnly", DependencySpec::Flag { name: READ_ONLY_FLAG })])
                },
                ..StateVariableDefinition::scalar("disabled", |ctx| {
                    DefinitionResult::set_value(ctx.values.boolean("readOnly").unwrap_or(false))
                })
            },
        ],
    }
}

/// Text inputs absorb only text; anything else fails the whole write.
fn text_value_inverse(ctx: &InverseContext<'_>) -> InverseResult {
    match ctx.desired {
        StateValue::Text(_) => InverseResult::Instructions(vec![InverseInstruction::SetEssential {
            value: ctx.desired.clone(),
        }]),
        _ => InverseResult::Failure,
    }
}

// ── award ──────────────────────────────────────────────────────────

fn award_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "award",
        groups: &[],
        variables: vec![
            StateVariableDefinition {
                return_dependencies: |_| {
                    BTreeMap::from([(
                        "credit",
                        DependencySpec::Attribute {
                            name: "credit",
                            default: StateValue::Number(1.0),
                        },
                    )])
                },
                ..StateVariableDefinition::scalar("credit", |ctx| {
                    DefinitionResult::set_value(ctx.values.number("credit").unwrap_or(1.0))
                })
            },
            StateVariableDefinition {
                return_dependencies: |_| {
                    BTreeMap::from([
                        (
                            "response",
                            DependencySpec::Ancestor {
                                component_type: "answer",
                                variables: vec!["currentResponse1"],
                                optional: false,
                            },
                        ),
                        (
                            "target",
                            DependencySpec::Attribute {
                                name: "matchText",
                                default: StateValue::Text(String::new()),
                            },
                        ),
                    ])
                },
                ..StateVariableDefinition::scalar("fulfilled", award_fulfilled_definition)
            },
        ],
    }
}

fn award_fulfilled_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let target = ctx.values.text("target").unwrap_or_default();
    let response = ctx.values.text("response").unwrap_or_default();
    let fulfilled = !target.is_empty() && response == target;
    let result = DefinitionResult::set_value(fulfilled);
    if target.is_empty() {
        return result.with_warning("award has empty match text", WarnLevel::Warning);
    }
    result
}

// ── answer ─────────────────────────────────────────────────────────

fn answer_type() -> ComponentTypeDescriptor {
    let mut variables = vec![
        current_responses_variable(),
        submitted_responses_variable(),
        credit_achieved_variable(),
        credit_if_submit_variable(),
        attempts_left_variable(),
        credit_by_attempt_variable(),
        submit_label_variable(),
    ];
    // Shared bundle, merged by composition.
    variables.extend(submission_tracking_variables());
    ComponentTypeDescriptor {
        name: "answer",
        groups: &["answer"],
        variables,
    }
}

/// The standard submission-tracking bundle: counters plus the just-submitted
/// touch signal. A pure function so several answer-like types can merge it.
#[must_use]
pub fn submission_tracking_variables() -> Vec<StateVariableDefinition> {
    vec![
        StateVariableDefinition {
            inverse: Some(integer_inverse),
            caps: VariableCaps {
                has_essential: true,
                ..VariableCaps::default()
            },
            default: Some(|| StateValue::Integer(0)),
            ..StateVariableDefinition::scalar("numSubmissions", |_| DefinitionResult::essential())
        },
        StateVariableDefinition {
            inverse: Some(integer_inverse),
            caps: VariableCaps {
                has_essential: true,
                ..VariableCaps::default()
            },
            default: Some(|| StateValue::Integer(0)),
            ..StateVariableDefinition::scalar("numIncorrectSubmissions", |_| {
                DefinitionResult::essential()
            })
        },
        StateVariableDefinition {
            inverse: Some(boolean_inverse),
            caps: VariableCaps {
                has_essential: true,
                // "Was touched" semantics: resubmitting leaves the value
                // `true` but must still signal downstream.
                check_for_actual_change: true,
                ..VariableCaps::default()
            },
            default: Some(|| StateValue::Bool(false)),
            ..StateVariableDefinition::scalar("justSubmitted", |_| DefinitionResult::essential())
        },
    ]
}

fn input_children_dependency() -> BTreeMap<&'static str, DependencySpec> {
    BTreeMap::from([(
        "inputs",
        DependencySpec::Child {
            groups: vec!["input"],
            variables: vec!["value"],
            variables_optional: false,
            index: None,
        },
    )])
}

fn current_responses_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        kind: VariableKind::Array(ArraySpec {
            entry_prefix: Some("currentResponse"),
            return_size: |values| values.components("inputs").len(),
            key_dependencies: ArrayKeyDependencies::Global,
            default_by_key: |_| StateValue::Null,
            allow_extra_keys_in_inverse: false,
        }),
        return_dependencies: |_| input_children_dependency(),
        ..StateVariableDefinition::scalar("currentResponses", current_responses_definition)
    }
}

fn current_responses_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let mut by_key = BTreeMap::new();
    for (k, input) in ctx.values.components("inputs").iter().enumerate() {
        let value = input.values.get("value").cloned().unwrap_or(StateValue::Null);
        by_key.insert(k, ComputedValue::SetValue(value));
    }
    DefinitionResult::array(by_key)
}

fn submitted_responses_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        kind: VariableKind::Array(ArraySpec {
            entry_prefix: Some("submittedResponse"),
            return_size: |values| values.components("inputs").len(),
            key_dependencies: ArrayKeyDependencies::Global,
            default_by_key: |_| StateValue::Null,
            allow_extra_keys_in_inverse: true,
        }),
        return_dependencies: |_| input_children_dependency(),
        inverse: Some(submitted_responses_inverse),
        caps: VariableCaps {
            has_essential: true,
            ..VariableCaps::default()
        },
        ..StateVariableDefinition::scalar("submittedResponses", submitted_responses_definition)
    }
}

fn submitted_responses_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let keys = ctx.array.as_ref().map_or(&[][..], |a| a.keys);
    DefinitionResult::array_essential(keys).with_element_type("text")
}

fn submitted_responses_inverse(ctx: &InverseContext<'_>) -> InverseResult {
    match ctx.desired_by_key {
        Some(by_key) => InverseResult::Instructions(vec![InverseInstruction::SetEssentialByKey {
            by_key: by_key.clone(),
        }]),
        None => InverseResult::Failure,
    }
}

fn credit_achieved_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        inverse: Some(credit_achieved_inverse),
        caps: VariableCaps {
            has_essential: true,
            for_renderer: true,
            ..VariableCaps::default()
        },
        default: Some(|| StateValue::Number(0.0)),
        ..StateVariableDefinition::scalar("creditAchieved", |_| DefinitionResult::essential())
    }
}

/// Credit clamps to `[0, 1]` on the way in.
fn credit_achieved_inverse(ctx: &InverseContext<'_>) -> InverseResult {
    match ctx.desired.as_number() {
        Some(n) => InverseResult::Instructions(vec![InverseInstruction::SetEssential {
            value: StateValue::Number(n.clamp(0.0, 1.0)),
        }]),
        None => InverseResult::Failure,
    }
}

fn credit_if_submit_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        return_dependencies: |_| {
            BTreeMap::from([
                (
                    "awards",
                    DependencySpec::Child {
                        groups: vec!["award"],
                        variables: vec!["fulfilled", "credit"],
                        variables_optional: false,
                        index: None,
                    },
                ),
                (
                    "maxCredited",
                    DependencySpec::Attribute {
                        name: "nAwardsCredited",
                        default: StateValue::Integer(1),
                    },
                ),
            ])
        },
        ..StateVariableDefinition::scalar("creditAchievedIfSubmit", credit_if_submit_definition)
    }
}

/// Ranks fulfilled awards by repeated linear insertion: an incoming credit is
/// placed before the first strictly smaller entry, so an equal credit
/// discovered earlier keeps its position. The ranked list is truncated to the
/// credited-awards cap, then summed.
fn credit_if_submit_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let mut ranked: Vec<f64> = Vec::new();
    for award in ctx.values.components("awards") {
        let fulfilled = award
            .values
            .get("fulfilled")
            .and_then(StateValue::as_bool)
            .unwrap_or(false);
        if !fulfilled {
            continue;
        }
        let credit = award
            .values
            .get("credit")
            .and_then(StateValue::as_number)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let pos = ranked
            .iter()
            .position(|existing| *existing < credit)
            .unwrap_or(ranked.len());
        ranked.insert(pos, credit);
    }
    let cap = ctx.values.integer("maxCredited").unwrap_or(1).max(0);
    ranked.truncate(usize::try_from(cap).unwrap_or(0));
    let total: f64 = ranked.iter().sum();
    DefinitionResult::set_value(total.clamp(0.0, 1.0))
}

fn attempts_left_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        return_dependencies: |_| {
            BTreeMap::from([
                (
                    "max",
                    DependencySpec::Attribute {
                        name: "maxNumAttempts",
                        default: StateValue::Integer(0),
                    },
                ),
                (
                    "submissions",
                    DependencySpec::StateVariable {
                        component: None,
                        variable: "numSubmissions",
                        optional: false,
                    },
                ),
            ])
        },
        ..StateVariableDefinition::scalar("numAttemptsLeft", |ctx| {
            let max = ctx.values.integer("max").unwrap_or(0);
            if max <= 0 {
                // Unlimited attempts.
                return DefinitionResult::set_value(StateValue::Integer(-1));
            }
            let submissions = ctx.values.integer("submissions").unwrap_or(0);
            DefinitionResult::set_value(StateValue::Integer((max - submissions).max(0)))
        })
    }
}

fn credit_by_attempt_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        return_dependencies: |_| {
            BTreeMap::from([(
                "factors",
                DependencySpec::Attribute {
                    name: "creditByAttempt",
                    default: StateValue::List(Vec::new()),
                },
            )])
        },
        ..StateVariableDefinition::scalar("creditByAttempt", |ctx| {
            DefinitionResult::set_value(
                ctx.values
                    .value("factors")
                    .cloned()
                    .unwrap_or(StateValue::List(Vec::new())),
            )
        })
    }
}

fn submit_label_variable() -> StateVariableDefinition {
    StateVariableDefinition {
        return_dependencies: |_| {
            BTreeMap::from([(
                "justSubmitted",
                DependencySpec::StateVariable {
                    component: None,
                    variable: "justSubmitted",
                    optional: false,
                },
            )])
        },
        ..StateVariableDefinition::scalar("submitLabel", |ctx| {
            let submitted = ctx.values.boolean("justSubmitted").unwrap_or(false);
            DefinitionResult::set_value(if submitted { "submitted" } else { "pending" })
        })
    }
}

fn integer_inverse(ctx: &InverseContext<'_>) -> InverseResult {
    match ctx.desired {
        StateValue::Integer(_) => {
            InverseResult::Instructions(vec![InverseInstruction::SetEssential {
                value: ctx.desired.clone(),
            }])
        }
        _ => InverseResult::Failure,
    }
}

fn boolean_inverse(ctx: &InverseContext<'_>) -> InverseResult {
    match ctx.desired {
        StateValue::Bool(_) => InverseResult::Instructions(vec![InverseInstruction::SetEssential {
            value: ctx.desired.clone(),
        }]),
        _ => InverseResult::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_builds_and_knows_the_taxonomy() {
        let registry = document_registry();
        assert!(registry.matches_filter("textInput", "input"));
        assert!(registry.has_variable("answer", "creditAchievedIfSubmit"));
        assert!(registry
            .resolve_variable("answer", "submittedResponse2")
            .is_ok());
    }
}
