// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Array expansion: runtime-sized variables with per-key slots.
//!
//! Every array variable has one umbrella slot (assembled list + resolved
//! size) and one slot per key. Size is resolved from the umbrella dependency
//! set before any key is read. Global-mode arrays compute all stale keys in
//! one definition call against the shared dependency set; per-key arrays
//! resolve and compute each key independently, so resizing never re-resolves
//! keys below `min(old, new)`. Keys at or past the declared size read as
//! `Null`.
use crate::definition::{
    ArrayContext, ArrayKeyDependencies, ArraySpec, ComputedValue, DefinitionContext,
    DefinitionOutcome, StateVariableDefinition, VariableKind,
};
use crate::dependency::DependencyValues;
use crate::error::CoreError;
use crate::ident::{ComponentIdx, SlotKey};
use crate::slot::Freshness;
use crate::value::StateValue;
use crate::Core;

impl Core {
    /// Resolves (and returns) the current size of an array variable.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownVariable`] when `variable` is not an
    /// array variable of the component's type, plus any resolution error
    /// from the umbrella dependency set.
    pub fn array_len(
        &mut self,
        component: ComponentIdx,
        variable: &str,
    ) -> Result<usize, CoreError> {
        let ty = self
            .tree
            .type_of(component)
            .ok_or(CoreError::UnknownComponent(component))?;
        let resolved = self.registry.resolve_variable(ty, variable)?;
        let def = resolved.definition;
        let VariableKind::Array(spec) = def.kind else {
            return Err(CoreError::UnknownVariable {
                component_type: ty,
                variable: variable.to_owned(),
            });
        };
        self.array_size_resolved(component, &def, &spec)
    }

    /// Reads one array element by 0-based key.
    ///
    /// # Errors
    /// Propagates resolution and cycle errors; out-of-range keys read as
    /// `Null` rather than erroring.
    pub fn array_entry(
        &mut self,
        component: ComponentIdx,
        variable: &str,
        key: usize,
    ) -> Result<StateValue, CoreError> {
        let ty = self
            .tree
            .type_of(component)
            .ok_or(CoreError::UnknownComponent(component))?;
        let resolved = self.registry.resolve_variable(ty, variable)?;
        let def = resolved.definition;
        let VariableKind::Array(spec) = def.kind else {
            return Err(CoreError::UnknownVariable {
                component_type: ty,
                variable: variable.to_owned(),
            });
        };
        self.freshen_array_entry(component, &def, &spec, key)
    }

    /// Freshens the whole array: size, every key, and the assembled list.
    pub(crate) fn freshen_array(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
    ) -> Result<StateValue, CoreError> {
        let umbrella = SlotKey::scalar(component, def.name);
        self.enter_slot(umbrella)?;
        let out = self.freshen_array_inner(component, def, spec, umbrella);
        self.leave_slot();
        out
    }

    fn freshen_array_inner(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
        umbrella: SlotKey,
    ) -> Result<StateValue, CoreError> {
        if self.slot_entry(umbrella).is_fresh() {
            self.stats.cache_hits += 1;
            return self.cached_value(umbrella);
        }
        let size = self.array_size_resolved(component, def, spec)?;
        let (inputs, marks) = self.umbrella_inputs(component, def)?;
        match spec.key_dependencies {
            ArrayKeyDependencies::Global => {
                self.compute_global_keys(component, def, spec, &inputs, size)?;
            }
            ArrayKeyDependencies::PerKey(_) => {
                for k in 0..size {
                    let _ = self.freshen_entry_per_key(component, def, spec, k, size)?;
                }
            }
        }
        let mut items = Vec::with_capacity(size);
        for k in 0..size {
            let entry = SlotKey::entry(component, def.name, k);
            let value = self
                .slots
                .get(&entry)
                .and_then(|slot| slot.value.clone())
                .unwrap_or_else(|| (spec.default_by_key)(k));
            items.push(value);
        }
        let value = StateValue::List(items);
        let slot = self.slot_entry(umbrella);
        slot.value = Some(value.clone());
        slot.used_default = false;
        slot.freshness = Freshness::Fresh;
        slot.last_inputs = Some(inputs);
        slot.touch_marks = marks;
        slot.touched += 1;
        Ok(value)
    }

    /// Freshens one element. Size resolves first; out-of-range keys are
    /// unreachable and read as `Null`.
    pub(crate) fn freshen_array_entry(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
        key: usize,
    ) -> Result<StateValue, CoreError> {
        let size = self.array_size_resolved(component, def, spec)?;
        if key >= size {
            return Ok(StateValue::Null);
        }
        match spec.key_dependencies {
            ArrayKeyDependencies::PerKey(_) => {
                self.freshen_entry_per_key(component, def, spec, key, size)
            }
            ArrayKeyDependencies::Global => {
                let entry = SlotKey::entry(component, def.name, key);
                if self.slot_entry(entry).is_fresh() {
                    self.stats.cache_hits += 1;
                    return self.cached_value(entry);
                }
                // One shared computation covers every stale key, so an
                // aliased entry read is value-identical to a whole-array
                // read.
                let (inputs, _marks) = self.umbrella_inputs(component, def)?;
                self.compute_global_keys(component, def, spec, &inputs, size)?;
                self.cached_value(entry)
            }
        }
    }

    /// Resolves the umbrella dependency set and the declared size, applying
    /// resize bookkeeping. Keys below `min(old, new)` are left untouched.
    pub(crate) fn array_size_resolved(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
    ) -> Result<usize, CoreError> {
        let umbrella = SlotKey::scalar(component, def.name);
        {
            let slot = self.slot_entry(umbrella);
            if slot.is_fresh() {
                if let Some(size) = slot.array_size {
                    return Ok(size);
                }
            }
        }
        let (inputs, _marks) = self.umbrella_inputs(component, def)?;
        let mut size = (spec.return_size)(&inputs);
        if spec.allow_extra_keys_in_inverse {
            // Inverse writes past the declared size grow the array.
            if let Some(max_key) = self.essential.max_written_key(component, def.name) {
                size = size.max(max_key + 1);
            }
        }
        let old = self.slot_entry(umbrella).array_size;
        if let Some(old) = old {
            if old != size {
                self.apply_resize(component, def, old, size);
            }
        }
        self.slot_entry(umbrella).array_size = Some(size);
        Ok(size)
    }

    /// Marks the keys affected by a resize (and their dependents) stale.
    fn apply_resize(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        old: usize,
        new: usize,
    ) {
        let (lo, hi) = if new < old { (new, old) } else { (old, new) };
        let seeds: Vec<SlotKey> = (lo..hi)
            .map(|k| SlotKey::entry(component, def.name, k))
            .filter(|key| self.slots.contains_key(key))
            .collect();
        tracing::debug!(
            array = %SlotKey::scalar(component, def.name),
            old,
            new,
            "array resized"
        );
        let _ = self.mark_stale_closure(seeds);
    }

    /// Resolves the umbrella edges and gathers their values.
    fn umbrella_inputs(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
    ) -> Result<(DependencyValues, std::collections::BTreeMap<SlotKey, u64>), CoreError> {
        let umbrella = SlotKey::scalar(component, def.name);
        self.ensure_edges(umbrella, def)?;
        let edges = self.slot_entry(umbrella).edges.clone();
        self.gather_inputs(&edges)
    }

    /// Runs the shared definition once for every stale key of a global-mode
    /// array and distributes the per-key results.
    fn compute_global_keys(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
        inputs: &DependencyValues,
        size: usize,
    ) -> Result<(), CoreError> {
        let umbrella = SlotKey::scalar(component, def.name);
        let mut stale: Vec<usize> = Vec::new();
        for k in 0..size {
            let entry = SlotKey::entry(component, def.name, k);
            let entry_slot = self.slot_entry(entry);
            entry_slot.dependents.insert(umbrella);
            if !entry_slot.is_fresh() {
                stale.push(k);
            }
        }
        // Global-mode entries derive from the umbrella's shared dependency
        // set: staleness reaching the umbrella must reach every entry.
        {
            let umbrella_slot = self.slot_entry(umbrella);
            for k in 0..size {
                umbrella_slot
                    .dependents
                    .insert(SlotKey::entry(component, def.name, k));
            }
        }
        if stale.is_empty() {
            return Ok(());
        }
        let ctx = DefinitionContext {
            values: inputs,
            array: Some(ArrayContext {
                size,
                keys: &stale,
            }),
        };
        let result = (def.definition)(&ctx);
        self.stats.definitions_run += 1;
        self.warnings.extend(result.warnings);
        let DefinitionOutcome::Array {
            by_key,
            element_type,
        } = result.outcome
        else {
            return Err(CoreError::InternalCorruption(
                "array definition returned a scalar outcome",
            ));
        };
        if element_type.is_some() {
            self.slot_entry(umbrella).element_type = element_type;
        }
        for k in stale {
            let entry = SlotKey::entry(component, def.name, k);
            let (value, used_default) = match by_key.get(&k) {
                Some(ComputedValue::SetValue(v)) => (v.clone(), false),
                // Keys the definition did not supply fall back to the
                // essential cell / declared per-key default.
                Some(ComputedValue::UseEssentialOrDefault) | None => {
                    self.key_fallback(entry, def, spec, k)
                }
            };
            let slot = self.slot_entry(entry);
            slot.value = Some(value);
            slot.used_default = used_default;
            slot.freshness = Freshness::Fresh;
            slot.touched += 1;
        }
        Ok(())
    }

    /// Freshens one key of a per-key array through its own dependency set.
    fn freshen_entry_per_key(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
        key: usize,
        size: usize,
    ) -> Result<StateValue, CoreError> {
        let entry = SlotKey::entry(component, def.name, key);
        self.enter_slot(entry)?;
        let out = self.freshen_entry_per_key_inner(component, def, spec, key, size, entry);
        self.leave_slot();
        out
    }

    fn freshen_entry_per_key_inner(
        &mut self,
        component: ComponentIdx,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
        key: usize,
        size: usize,
        entry: SlotKey,
    ) -> Result<StateValue, CoreError> {
        let umbrella = SlotKey::scalar(component, def.name);
        self.slot_entry(entry).dependents.insert(umbrella);
        if self.slot_entry(entry).is_fresh() {
            self.stats.cache_hits += 1;
            return self.cached_value(entry);
        }
        self.ensure_edges(entry, def)?;
        let edges = self.slot_entry(entry).edges.clone();
        let (inputs, marks) = self.gather_inputs(&edges)?;
        let unchanged = !def.caps.has_essential && {
            let slot = self.slot_entry(entry);
            slot.value.is_some()
                && slot.last_inputs.as_ref() == Some(&inputs)
                && slot.touch_marks == marks
        };
        if unchanged {
            self.stats.early_cutoffs += 1;
            self.slot_entry(entry).freshness = Freshness::Fresh;
            return self.cached_value(entry);
        }
        let keys = [key];
        let ctx = DefinitionContext {
            values: &inputs,
            array: Some(ArrayContext { size, keys: &keys }),
        };
        let result = (def.definition)(&ctx);
        self.stats.definitions_run += 1;
        self.warnings.extend(result.warnings);
        let DefinitionOutcome::Array { by_key, .. } = result.outcome else {
            return Err(CoreError::InternalCorruption(
                "array definition returned a scalar outcome",
            ));
        };
        let (value, used_default) = match by_key.get(&key) {
            Some(ComputedValue::SetValue(v)) => (v.clone(), false),
            Some(ComputedValue::UseEssentialOrDefault) | None => {
                self.key_fallback(entry, def, spec, key)
            }
        };
        let slot = self.slot_entry(entry);
        slot.value = Some(value.clone());
        slot.used_default = used_default;
        slot.freshness = Freshness::Fresh;
        slot.last_inputs = Some(inputs);
        slot.touch_marks = marks;
        slot.touched += 1;
        Ok(value)
    }

    /// Essential-or-default fallback for one key.
    fn key_fallback(
        &mut self,
        entry: SlotKey,
        def: &StateVariableDefinition,
        spec: &ArraySpec,
        key: usize,
    ) -> (StateValue, bool) {
        let default = (spec.default_by_key)(key);
        if def.caps.has_essential {
            self.essential.get_or_init(entry, default)
        } else {
            (default, true)
        }
    }
}
