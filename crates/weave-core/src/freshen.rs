// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The demand-driven evaluator.
//!
//! `freshen` guarantees a slot's cached value matches its current
//! dependencies, recursing into dependencies as needed. A fresh slot is
//! answered from cache without re-invoking `definition`. A stale slot whose
//! dependency values all compare equal to the last run is re-marked fresh
//! without recomputation — unless one of those dependencies declares "check
//! for actual change" (was-touched) semantics, which defeats the
//! short-circuit.
//!
//! Staleness flows the other way: the transaction coordinator seeds
//! [`Core::mark_stale_closure`], which walks reverse edges and converts the
//! signal per-variable through `mark_stale` hooks.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::definition::{
    ChangeNotice, ChangeSignal, ComputedValue, DefinitionContext, DefinitionOutcome,
    MarkStaleContext, StateVariableDefinition, VariableKind,
};
use crate::dependency::{ComponentValues, DependencyValue, DependencyValues};
use crate::error::CoreError;
use crate::ident::{ComponentIdx, SlotKey, VarName};
use crate::slot::{DependencyEdge, EdgeBinding, Freshness};
use crate::value::StateValue;
use crate::Core;

impl Core {
    /// Reads a state variable by name or entry alias, freshening it first.
    ///
    /// Array variables read by their registered name return the assembled
    /// list; entry aliases (`submittedResponse2`) return one element.
    ///
    /// # Errors
    /// Fatal resolution and cycle errors propagate; they abort building the
    /// affected slot but leave the rest of the graph intact.
    pub fn value(
        &mut self,
        component: ComponentIdx,
        variable: &str,
    ) -> Result<StateValue, CoreError> {
        let ty = self
            .tree
            .type_of(component)
            .ok_or(CoreError::UnknownComponent(component))?;
        let resolved = self.registry.resolve_variable(ty, variable)?;
        let def = resolved.definition;
        let key = SlotKey {
            component,
            variable: def.name,
            array_key: resolved.array_key,
        };
        self.freshen_with(key, &def)
    }

    /// Freshens an already-resolved slot key.
    pub(crate) fn freshen_target(&mut self, key: SlotKey) -> Result<StateValue, CoreError> {
        let def = self.definition_for(key)?;
        self.freshen_with(key, &def)
    }

    pub(crate) fn freshen_with(
        &mut self,
        key: SlotKey,
        def: &StateVariableDefinition,
    ) -> Result<StateValue, CoreError> {
        match (&def.kind, key.array_key) {
            (VariableKind::Scalar, None) => self.freshen_scalar(key, def),
            (VariableKind::Scalar, Some(_)) => Err(CoreError::InternalCorruption(
                "array key addressed a scalar variable",
            )),
            (VariableKind::Array(spec), None) => self.freshen_array(key.component, def, spec),
            (VariableKind::Array(spec), Some(k)) => {
                self.freshen_array_entry(key.component, def, spec, k)
            }
        }
    }

    fn freshen_scalar(
        &mut self,
        key: SlotKey,
        def: &StateVariableDefinition,
    ) -> Result<StateValue, CoreError> {
        self.enter_slot(key)?;
        let out = self.freshen_scalar_inner(key, def);
        self.leave_slot();
        out
    }

    fn freshen_scalar_inner(
        &mut self,
        key: SlotKey,
        def: &StateVariableDefinition,
    ) -> Result<StateValue, CoreError> {
        if self.slot_entry(key).is_fresh() {
            self.stats.cache_hits += 1;
            return self.cached_value(key);
        }
        self.ensure_edges(key, def)?;
        let edges = self.slot_entry(key).edges.clone();
        let (inputs, marks) = self.gather_inputs(&edges)?;

        // Recompute short-circuit: a stale slot whose inputs are unchanged
        // keeps its cached value. Essential-backed variables always rerun,
        // since their baseline cell changes outside the dependency inputs.
        let unchanged = !def.caps.has_essential && {
            let slot = self.slot_entry(key);
            slot.value.is_some()
                && slot.last_inputs.as_ref() == Some(&inputs)
                && slot.touch_marks == marks
        };
        if unchanged {
            self.stats.early_cutoffs += 1;
            self.slot_entry(key).freshness = Freshness::Fresh;
            return self.cached_value(key);
        }

        let ctx = DefinitionContext {
            values: &inputs,
            array: None,
        };
        let result = (def.definition)(&ctx);
        self.stats.definitions_run += 1;
        self.warnings.extend(result.warnings);
        let (value, used_default) = match result.outcome {
            DefinitionOutcome::Scalar(ComputedValue::SetValue(v)) => (v, false),
            DefinitionOutcome::Scalar(ComputedValue::UseEssentialOrDefault) => {
                let default = def.default.map_or(StateValue::Null, |f| f());
                self.essential.get_or_init(key, default)
            }
            DefinitionOutcome::Array { .. } => {
                return Err(CoreError::InternalCorruption(
                    "scalar definition returned an array outcome",
                ))
            }
        };
        let slot = self.slot_entry(key);
        slot.value = Some(value.clone());
        slot.used_default = used_default;
        slot.freshness = Freshness::Fresh;
        slot.last_inputs = Some(inputs);
        slot.touch_marks = marks;
        slot.touched += 1;
        Ok(value)
    }

    /// Freshens every edge target and assembles the named value map, plus
    /// touch marks of was-touched dependencies for the short-circuit check.
    pub(crate) fn gather_inputs(
        &mut self,
        edges: &[DependencyEdge],
    ) -> Result<(DependencyValues, BTreeMap<SlotKey, u64>), CoreError> {
        let mut map: BTreeMap<&'static str, DependencyValue> = BTreeMap::new();
        let mut marks: BTreeMap<SlotKey, u64> = BTreeMap::new();
        for edge in edges {
            let value = match &edge.binding {
                EdgeBinding::Constant(v) => DependencyValue::Value(v.clone()),
                EdgeBinding::Flag(name) => DependencyValue::Value(self.flag(name)),
                EdgeBinding::Slot { key, source } => {
                    let value = self.freshen_target(*key)?;
                    self.note_touch_mark(*key, &mut marks)?;
                    let used_default = self.slots.get(key).is_some_and(|s| s.used_default);
                    DependencyValue::Variable {
                        source: *source,
                        value,
                        used_default,
                    }
                }
                EdgeBinding::Components(bindings) => {
                    let mut list = Vec::with_capacity(bindings.len());
                    for binding in bindings {
                        let mut values: BTreeMap<VarName, StateValue> = BTreeMap::new();
                        for (requested, target) in &binding.slots {
                            let value = self.freshen_target(*target)?;
                            self.note_touch_mark(*target, &mut marks)?;
                            values.insert(*requested, value);
                        }
                        list.push(ComponentValues {
                            source: binding.source,
                            values,
                        });
                    }
                    DependencyValue::Components(list)
                }
            };
            map.insert(edge.name, value);
        }
        Ok((DependencyValues(map), marks))
    }

    fn note_touch_mark(
        &mut self,
        target: SlotKey,
        marks: &mut BTreeMap<SlotKey, u64>,
    ) -> Result<(), CoreError> {
        let def = self.definition_for(target)?;
        if def.caps.check_for_actual_change {
            let touched = self.slots.get(&target).map_or(0, |s| s.touched);
            marks.insert(target, touched);
        }
        Ok(())
    }

    pub(crate) fn cached_value(&self, key: SlotKey) -> Result<StateValue, CoreError> {
        self.slots
            .get(&key)
            .and_then(|slot| slot.value.clone())
            .ok_or(CoreError::InternalCorruption(
                "fresh slot is missing its cached value",
            ))
    }

    /// Cycle guard: entering a slot already on the active chain is a fatal
    /// circular dependency, reported with the full chain.
    pub(crate) fn enter_slot(&mut self, key: SlotKey) -> Result<(), CoreError> {
        if let Some(pos) = self.active_chain.iter().position(|k| *k == key) {
            let mut chain: Vec<SlotKey> = self.active_chain[pos..].to_vec();
            chain.push(key);
            return Err(CoreError::CircularDependency { chain });
        }
        self.active_chain.push(key);
        Ok(())
    }

    pub(crate) fn leave_slot(&mut self) {
        let popped = self.active_chain.pop();
        debug_assert!(popped.is_some(), "leave_slot without matching enter_slot");
    }

    /// Marks the forward closure of `seeds` stale and emits change signals.
    ///
    /// Recomputation stays demand-driven; this only flips freshness and
    /// walks reverse edges. Returns the number of slots visited.
    pub(crate) fn mark_stale_closure(&mut self, seeds: Vec<SlotKey>) -> usize {
        let mut visited: BTreeSet<SlotKey> = BTreeSet::new();
        let mut signalled: BTreeSet<(ComponentIdx, VarName)> = BTreeSet::new();
        let mut queue: VecDeque<SlotKey> = seeds.into_iter().collect();
        while let Some(key) = queue.pop_front() {
            if !visited.insert(key) {
                continue;
            }
            let Some(slot) = self.slots.get_mut(&key) else {
                // Never-read slot: nothing cached, nothing depends on it.
                continue;
            };
            if slot.freshness == Freshness::Fresh {
                slot.freshness = Freshness::Stale;
            }
            queue.extend(slot.dependents.iter().copied());
            if signalled.insert((key.component, key.variable)) {
                self.emit_stale_signal(key);
            }
        }
        visited.len()
    }

    /// Converts one staleness mark into an external change signal, through
    /// the variable's `mark_stale` hook when it has one.
    fn emit_stale_signal(&mut self, key: SlotKey) {
        let Ok(def) = self.definition_for(key) else {
            // The owning component is mid-removal; no signal to convert.
            return;
        };
        let ctx = MarkStaleContext {
            component_just_created: self.freshly_created.contains(&key.component),
        };
        let signal = match def.mark_stale {
            Some(hook) => hook(&ctx),
            None if def.caps.for_renderer => Some(ChangeSignal::ValueChanged),
            None => None,
        };
        if let Some(signal) = signal {
            self.changes.push(ChangeNotice {
                component: key.component,
                variable: key.variable,
                signal,
            });
        }
    }
}
