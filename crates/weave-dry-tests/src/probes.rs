// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Synthetic component types for behavioural tests.
//!
//! - `selector`: its dependency *shape* switches on another variable's value
//!   (value-dependent topology).
//! - `sequence`: a per-key array whose size and element seed are editable.
//! - `loop`: two variables that read each other (circular dependency).
//! - `mirror`: reads its source composite's value, with an inline-constant
//!   fallback.
use std::collections::BTreeMap;

use weave_core::{
    ArrayKeyDependencies, ArraySpec, ComponentRegistry, ComponentTypeDescriptor, ComputedValue,
    DefinitionContext, DefinitionResult, DependencySpec, InverseContext, InverseInstruction,
    InverseResult, StateValue, StateVariableDefinition, VariableCaps, VariableKind,
};

/// Registers the probe types (plus the document set they are embedded in).
///
/// # Panics
/// Panics when the fixture descriptors are internally inconsistent.
#[must_use]
pub fn probe_registry() -> ComponentRegistry {
    let mut registry = crate::doc_types::document_registry();
    for descriptor in [
        selector_type(),
        sequence_type(),
        loop_type(),
        mirror_type(),
    ] {
        if let Err(err) = registry.register(descriptor) {
            unreachable!("probe registry is internally inconsistent: {err}");
        }
    }
    registry
}

// ── selector ───────────────────────────────────────────────────────

fn selector_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "selector",
        groups: &[],
        variables: vec![
            StateVariableDefinition {
                inverse: Some(text_inverse),
                caps: VariableCaps {
                    has_essential: true,
                    ..VariableCaps::default()
                },
                default: Some(|| StateValue::from("inputs")),
                ..StateVariableDefinition::scalar("mode", |_| DefinitionResult::essential())
            },
            StateVariableDefinition {
                determining: &["mode"],
                return_dependencies: selector_dependencies,
                ..StateVariableDefinition::scalar("collected", selector_definition)
            },
        ],
    }
}

/// The descendant query's shape follows `mode`.
fn selector_dependencies(
    determining: &weave_core::DeterminingValues,
) -> BTreeMap<&'static str, DependencySpec> {
    let spec = if determining.text("mode") == Some("awards") {
        DependencySpec::Descendant {
            groups: vec!["award"],
            variables: vec!["credit"],
            variables_optional: false,
            index: None,
        }
    } else {
        DependencySpec::Descendant {
            groups: vec!["input"],
            variables: vec!["value"],
            variables_optional: false,
            index: None,
        }
    };
    BTreeMap::from([("items", spec)])
}

fn selector_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let items: Vec<StateValue> = ctx
        .values
        .components("items")
        .iter()
        .map(|component| {
            component
                .values
                .values()
                .next()
                .cloned()
                .unwrap_or(StateValue::Null)
        })
        .collect();
    DefinitionResult::set_value(items)
}

// ── sequence ───────────────────────────────────────────────────────

fn sequence_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "sequence",
        groups: &[],
        variables: vec![
            StateVariableDefinition {
                inverse: Some(integer_inverse),
                caps: VariableCaps {
                    has_essential: true,
                    ..VariableCaps::default()
                },
                default: Some(|| StateValue::Integer(3)),
                ..StateVariableDefinition::scalar("length", |_| DefinitionResult::essential())
            },
            StateVariableDefinition {
                inverse: Some(integer_inverse),
                caps: VariableCaps {
                    has_essential: true,
                    ..VariableCaps::default()
                },
                default: Some(|| StateValue::Integer(1)),
                ..StateVariableDefinition::scalar("seed", |_| DefinitionResult::essential())
            },
            StateVariableDefinition {
                kind: VariableKind::Array(ArraySpec {
                    entry_prefix: Some("item"),
                    return_size: |values| {
                        values
                            .integer("length")
                            .and_then(|n| usize::try_from(n).ok())
                            .unwrap_or(0)
                    },
                    key_dependencies: ArrayKeyDependencies::PerKey(sequence_key_dependencies),
                    default_by_key: |_| StateValue::Null,
                    allow_extra_keys_in_inverse: false,
                }),
                return_dependencies: |_| {
                    BTreeMap::from([(
                        "length",
                        DependencySpec::StateVariable {
                            component: None,
                            variable: "length",
                            optional: false,
                        },
                    )])
                },
                ..StateVariableDefinition::scalar("items", sequence_items_definition)
            },
        ],
    }
}

fn sequence_key_dependencies(
    _key: usize,
    _determining: &weave_core::DeterminingValues,
) -> BTreeMap<&'static str, DependencySpec> {
    BTreeMap::from([(
        "seed",
        DependencySpec::StateVariable {
            component: None,
            variable: "seed",
            optional: false,
        },
    )])
}

/// `items[k] = seed * (k + 1)^2`.
fn sequence_items_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    let seed = ctx.values.integer("seed").unwrap_or(1);
    let keys = ctx.array.as_ref().map_or(&[][..], |a| a.keys);
    let mut by_key = BTreeMap::new();
    for k in keys {
        let ordinal = i64::try_from(*k + 1).unwrap_or(i64::MAX);
        by_key.insert(
            *k,
            ComputedValue::SetValue(StateValue::Integer(seed * ordinal * ordinal)),
        );
    }
    DefinitionResult::array(by_key)
}

// ── loop ───────────────────────────────────────────────────────────

fn loop_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "loop",
        groups: &[],
        variables: vec![
            StateVariableDefinition {
                return_dependencies: |_| {
                    BTreeMap::from([(
                        "other",
                        DependencySpec::StateVariable {
                            component: None,
                            variable: "b",
                            optional: false,
                        },
                    )])
                },
                ..StateVariableDefinition::scalar("a", passthrough_definition)
            },
            StateVariableDefinition {
                return_dependencies: |_| {
                    BTreeMap::from([(
                        "other",
                        DependencySpec::StateVariable {
                            component: None,
                            variable: "a",
                            optional: false,
                        },
                    )])
                },
                ..StateVariableDefinition::scalar("b", passthrough_definition)
            },
        ],
    }
}

fn passthrough_definition(ctx: &DefinitionContext<'_>) -> DefinitionResult {
    DefinitionResult::set_value(
        ctx.values
            .value("other")
            .cloned()
            .unwrap_or(StateValue::Null),
    )
}

// ── mirror ─────────────────────────────────────────────────────────

fn mirror_type() -> ComponentTypeDescriptor {
    ComponentTypeDescriptor {
        name: "mirror",
        groups: &[],
        variables: vec![StateVariableDefinition {
            return_dependencies: |_| {
                BTreeMap::from([
                    (
                        "origin",
                        DependencySpec::SourceCompositeStateVariable {
                            variable: "value",
                            optional: true,
                        },
                    ),
                    (
                        "fallback",
                        DependencySpec::Value {
                            value: StateValue::from("unlinked"),
                        },
                    ),
                ])
            },
            ..StateVariableDefinition::scalar("reflected", |ctx| {
                let value = ctx
                    .values
                    .value("origin")
                    .or_else(|| ctx.values.value("fallback"))
                    .cloned()
                    .unwrap_or(StateValue::Null);
                DefinitionResult::set_value(value)
            })
        }],
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

fn text_inverse(ctx: &InverseContext<'_>) -> InverseResult {
    match ctx.desired {
        StateValue::Text(_) => InverseResult::Instructions(vec![InverseInstruction::SetEssential {
            value: ctx.desired.clone(),
        }]),
        _ => InverseResult::Failure,
    }
}
