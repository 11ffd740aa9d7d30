// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The inverse planner.
//!
//! Planning walks inverse definitions recursively until every branch bottoms
//! out in an essential write, accumulating the whole write set before
//! anything is applied. Any failure abandons the whole request: no partial
//! essential-value mutation can occur, because planning never mutates.
//!
//! A variable with no inverse definition is read-only; writes against it are
//! rejected, not thrown.
use std::collections::BTreeMap;

use crate::definition::{
    ArrayKeyDependencies, InverseContext, InverseInstruction, InverseResult,
    StateVariableDefinition, VariableKind,
};
use crate::dependency::DependencyValues;
use crate::error::{CoreError, PlanFailure, WriteRejection};
use crate::ident::{ComponentIdx, SlotKey};
use crate::slot::{DependencyEdge, EdgeBinding};
use crate::value::StateValue;
use crate::Core;

/// One planned essential-cell write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EssentialWrite {
    /// Target cell.
    pub key: SlotKey,
    /// Value to store.
    pub value: StateValue,
}

impl Core {
    /// Plans an `updateValue` instruction into essential writes.
    ///
    /// `requested` may be an exact variable name or an entry alias;
    /// `explicit_key` is the instruction's own array key, used when the name
    /// is not an alias.
    pub(crate) fn plan_update(
        &mut self,
        component: ComponentIdx,
        requested: &str,
        explicit_key: Option<usize>,
        desired: StateValue,
        initial_change: bool,
        out: &mut Vec<EssentialWrite>,
        chain: &mut Vec<SlotKey>,
    ) -> Result<(), PlanFailure> {
        let ty = self
            .tree
            .type_of(component)
            .ok_or(CoreError::UnknownComponent(component))?;
        let resolved = self.registry.resolve_variable(ty, requested)?;
        let target = SlotKey {
            component,
            variable: resolved.definition.name,
            array_key: resolved.array_key.or(explicit_key),
        };
        self.plan_write_slot(target, desired, initial_change, out, chain)
    }

    /// Plans a write against a resolved slot.
    fn plan_write_slot(
        &mut self,
        target: SlotKey,
        desired: StateValue,
        initial_change: bool,
        out: &mut Vec<EssentialWrite>,
        chain: &mut Vec<SlotKey>,
    ) -> Result<(), PlanFailure> {
        if chain.contains(&target) {
            return Err(WriteRejection::PlanningCycle(target).into());
        }
        chain.push(target);
        let result = self.plan_write_slot_inner(target, desired, initial_change, out, chain);
        chain.pop();
        result
    }

    fn plan_write_slot_inner(
        &mut self,
        target: SlotKey,
        desired: StateValue,
        initial_change: bool,
        out: &mut Vec<EssentialWrite>,
        chain: &mut Vec<SlotKey>,
    ) -> Result<(), PlanFailure> {
        let def = self.definition_for(target)?;
        let Some(inverse) = def.inverse else {
            return Err(WriteRejection::ReadOnly {
                component: target.component,
                variable: target.variable.to_owned(),
            }
            .into());
        };

        let (values, edges) = self.inverse_inputs(target, &def)?;
        let desired_by_key: Option<BTreeMap<usize, StateValue>> = match (&def.kind, target.array_key)
        {
            (VariableKind::Array(_), Some(k)) => Some(BTreeMap::from([(k, desired.clone())])),
            (VariableKind::Array(_), None) => {
                let Some(items) = desired.as_list() else {
                    return Err(WriteRejection::InverseFailed {
                        component: target.component,
                        variable: target.variable.to_owned(),
                    }
                    .into());
                };
                Some(items.iter().cloned().enumerate().collect())
            }
            (VariableKind::Scalar, _) => None,
        };

        let ctx = InverseContext {
            desired: &desired,
            desired_by_key: desired_by_key.as_ref(),
            values: &values,
            initial_change,
        };
        let instructions = match inverse(&ctx) {
            InverseResult::Failure => {
                return Err(WriteRejection::InverseFailed {
                    component: target.component,
                    variable: target.variable.to_owned(),
                }
                .into())
            }
            InverseResult::Instructions(instructions) => instructions,
        };

        for instruction in instructions {
            match instruction {
                InverseInstruction::SetEssential { value } => {
                    self.plan_set_essential(target, &def, value, out)?;
                }
                InverseInstruction::SetEssentialByKey { by_key } => {
                    self.plan_set_essential_by_key(target, &def, by_key, out)?;
                }
                InverseInstruction::SetDependency {
                    dependency,
                    desired,
                } => {
                    let Some(next) = single_slot_binding(&edges, dependency) else {
                        return Err(WriteRejection::NotInvertible {
                            component: target.component,
                            variable: target.variable.to_owned(),
                            dependency: dependency.to_owned(),
                        }
                        .into());
                    };
                    self.plan_write_slot(next, desired, false, out, chain)?;
                }
                InverseInstruction::SetDependencyComponent {
                    dependency,
                    index,
                    variable,
                    desired,
                } => {
                    let Some(next) = component_slot_binding(&edges, dependency, index, variable)
                    else {
                        return Err(WriteRejection::NotInvertible {
                            component: target.component,
                            variable: target.variable.to_owned(),
                            dependency: dependency.to_owned(),
                        }
                        .into());
                    };
                    self.plan_write_slot(next, desired, false, out, chain)?;
                }
            }
        }
        Ok(())
    }

    /// Plans a `SetEssential` instruction, splitting whole-array writes into
    /// per-key cells.
    fn plan_set_essential(
        &mut self,
        target: SlotKey,
        def: &StateVariableDefinition,
        value: StateValue,
        out: &mut Vec<EssentialWrite>,
    ) -> Result<(), PlanFailure> {
        if !def.caps.has_essential {
            return Err(WriteRejection::MissingEssential {
                component: target.component,
                variable: target.variable.to_owned(),
            }
            .into());
        }
        if def.is_array() && target.array_key.is_none() {
            let Some(items) = value.as_list() else {
                return Err(WriteRejection::InverseFailed {
                    component: target.component,
                    variable: target.variable.to_owned(),
                }
                .into());
            };
            let by_key: BTreeMap<usize, StateValue> =
                items.iter().cloned().enumerate().collect();
            return self.plan_set_essential_by_key(target, def, by_key, out);
        }
        out.push(EssentialWrite {
            key: target,
            value,
        });
        Ok(())
    }

    fn plan_set_essential_by_key(
        &mut self,
        target: SlotKey,
        def: &StateVariableDefinition,
        by_key: BTreeMap<usize, StateValue>,
        out: &mut Vec<EssentialWrite>,
    ) -> Result<(), PlanFailure> {
        if !def.caps.has_essential {
            return Err(WriteRejection::MissingEssential {
                component: target.component,
                variable: target.variable.to_owned(),
            }
            .into());
        }
        let VariableKind::Array(spec) = &def.kind else {
            return Err(WriteRejection::InverseFailed {
                component: target.component,
                variable: target.variable.to_owned(),
            }
            .into());
        };
        if !spec.allow_extra_keys_in_inverse {
            let size = self.array_size_resolved(target.component, def, spec)?;
            for key in by_key.keys() {
                if *key >= size {
                    return Err(WriteRejection::KeyOutOfRange {
                        component: target.component,
                        variable: target.variable.to_owned(),
                        key: *key,
                    }
                    .into());
                }
            }
        }
        for (key, value) in by_key {
            out.push(EssentialWrite {
                key: SlotKey::entry(target.component, target.variable, key),
                value,
            });
        }
        Ok(())
    }

    /// Freshens the target and returns the dependency values and edges its
    /// inverse definition sees.
    fn inverse_inputs(
        &mut self,
        target: SlotKey,
        def: &StateVariableDefinition,
    ) -> Result<(DependencyValues, Vec<DependencyEdge>), CoreError> {
        let _ = self.freshen_with(target, def)?;
        let source = match (&def.kind, target.array_key) {
            // Global-mode entries share the umbrella's dependency set.
            (VariableKind::Array(spec), Some(_))
                if matches!(spec.key_dependencies, ArrayKeyDependencies::Global) =>
            {
                SlotKey::scalar(target.component, target.variable)
            }
            _ => target,
        };
        let edges = self
            .slots
            .get(&source)
            .map(|slot| slot.edges.clone())
            .unwrap_or_default();
        let (values, _marks) = self.gather_inputs(&edges)?;
        Ok((values, edges))
    }
}

/// The single slot a scalar-bound dependency edge points at.
fn single_slot_binding(edges: &[DependencyEdge], dependency: &str) -> Option<SlotKey> {
    let edge = edges.iter().find(|e| e.name == dependency)?;
    match &edge.binding {
        EdgeBinding::Slot { key, .. } => Some(*key),
        EdgeBinding::Components(bindings) => {
            let [binding] = bindings.as_slice() else {
                return None;
            };
            let [(_, key)] = binding.slots.as_slice() else {
                return None;
            };
            Some(*key)
        }
        EdgeBinding::Constant(_) | EdgeBinding::Flag(_) => None,
    }
}

/// One `(component index, variable)` slot of a multi-component dependency.
fn component_slot_binding(
    edges: &[DependencyEdge],
    dependency: &str,
    index: usize,
    variable: &str,
) -> Option<SlotKey> {
    let edge = edges.iter().find(|e| e.name == dependency)?;
    let EdgeBinding::Components(bindings) = &edge.binding else {
        return None;
    };
    let binding = bindings.get(index)?;
    binding
        .slots
        .iter()
        .find(|(requested, _)| *requested == variable)
        .map(|(_, key)| *key)
}
