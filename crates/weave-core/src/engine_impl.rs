// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The engine facade.
//!
//! [`Core`] owns the dependency graph: the slot table, essential store, host
//! flags, and the warning/event/change sinks. One `Core` serves one document
//! tree on one logical evaluation thread; the graph is mutated only by
//! `freshen` (cache writes) and the transaction coordinator (essential writes
//! plus staleness marks).
use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::definition::{ChangeNotice, StateVariableDefinition};
use crate::error::CoreError;
use crate::essential::EssentialStore;
use crate::event::ActionEvent;
use crate::ident::{ComponentIdx, SlotKey};
use crate::registry::ComponentRegistry;
use crate::slot::VariableSlot;
use crate::tree::{ComponentRecord, ComponentTree};
use crate::txn::ActionRequest;
use crate::value::StateValue;
use crate::warning::{WarnLevel, Warning};

/// Diagnostic counters. Purely observational; nothing in the engine reads
/// them back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    /// Forward `definition` invocations.
    pub definitions_run: u64,
    /// Dependency edge-set (re)builds.
    pub edges_rebuilt: u64,
    /// Reads answered from a fresh cache without recomputation.
    pub cache_hits: u64,
    /// Stale slots whose recompute was skipped because every dependency
    /// value was unchanged.
    pub early_cutoffs: u64,
}

/// The reactive state-variable dependency engine.
pub struct Core {
    pub(crate) registry: ComponentRegistry,
    pub(crate) tree: ComponentTree,
    pub(crate) slots: FxHashMap<SlotKey, VariableSlot>,
    pub(crate) essential: EssentialStore,
    pub(crate) flags: BTreeMap<&'static str, StateValue>,
    pub(crate) flag_dependents: BTreeMap<&'static str, BTreeSet<SlotKey>>,
    /// Slots currently being freshened, outermost first. A slot appearing
    /// twice is a circular dependency.
    pub(crate) active_chain: Vec<SlotKey>,
    pub(crate) warnings: Vec<Warning>,
    pub(crate) events: Vec<ActionEvent>,
    pub(crate) changes: Vec<ChangeNotice>,
    pub(crate) queue: Vec<ActionRequest>,
    pub(crate) tx_counter: u64,
    /// Components created since the last transaction; their staleness
    /// signals carry the `component_just_created` flag.
    pub(crate) freshly_created: BTreeSet<ComponentIdx>,
    pub(crate) stats: CoreStats,
}

impl core::fmt::Debug for Core {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Core")
            .field("components", &self.tree.len())
            .field("slots", &self.slots.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Creates an engine over a registered type set and a host-built tree.
    #[must_use]
    pub fn new(registry: ComponentRegistry, tree: ComponentTree) -> Self {
        Self {
            registry,
            tree,
            slots: FxHashMap::default(),
            essential: EssentialStore::new(),
            flags: BTreeMap::new(),
            flag_dependents: BTreeMap::new(),
            active_chain: Vec::new(),
            warnings: Vec::new(),
            events: Vec::new(),
            changes: Vec::new(),
            queue: Vec::new(),
            tx_counter: 0,
            freshly_created: BTreeSet::new(),
            stats: CoreStats::default(),
        }
    }

    /// The component-type registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// The component tree.
    #[must_use]
    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// Diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> CoreStats {
        self.stats
    }

    /// Sets a host flag and marks every slot reading it stale.
    pub fn set_flag(&mut self, name: &'static str, value: StateValue) {
        self.flags.insert(name, value);
        let seeds: Vec<SlotKey> = self
            .flag_dependents
            .get(name)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        let _ = self.mark_stale_closure(seeds);
    }

    /// Reads a host flag (`Null` when unset).
    #[must_use]
    pub fn flag(&self, name: &str) -> StateValue {
        self.flags.get(name).cloned().unwrap_or(StateValue::Null)
    }

    /// Peeks an essential cell without initializing or freshening anything.
    #[must_use]
    pub fn essential_peek(
        &self,
        component: ComponentIdx,
        variable: &'static str,
        array_key: Option<usize>,
    ) -> Option<StateValue> {
        self.essential
            .peek(&SlotKey {
                component,
                variable,
                array_key,
            })
            .map(|cell| cell.value.clone())
    }

    /// Declared element component type of an array variable, when its
    /// definition has supplied one.
    #[must_use]
    pub fn array_element_type(
        &self,
        component: ComponentIdx,
        variable: &'static str,
    ) -> Option<&'static str> {
        self.slots
            .get(&SlotKey::scalar(component, variable))
            .and_then(|slot| slot.element_type)
    }

    /// Inserts a component under an existing parent and invalidates the
    /// structural dependencies of its ancestors.
    ///
    /// The new component is treated as just-created for staleness signals.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownComponentType`] for an unregistered type
    /// tag and [`CoreError::UnknownComponent`] for a missing parent.
    pub fn insert_component(
        &mut self,
        idx: ComponentIdx,
        record: ComponentRecord,
    ) -> Result<(), CoreError> {
        if !self.registry.contains(record.component_type) {
            return Err(CoreError::UnknownComponentType(record.component_type));
        }
        if let Some(parent) = record.parent {
            if !self.tree.contains(parent) {
                return Err(CoreError::UnknownComponent(parent));
            }
        }
        self.tree.insert(idx, record);
        self.freshly_created.insert(idx);
        // Child/descendant/subtree selections live on ancestors; force their
        // edge sets to rebuild against the new topology.
        let mut seeds = Vec::new();
        for ancestor in self.tree.ancestors(idx) {
            seeds.extend(self.invalidate_component_slots(ancestor));
        }
        let _ = self.mark_stale_closure(seeds);
        Ok(())
    }

    /// Marks an existing component as just-(re)created and restales its
    /// slots, so `mark_stale` hooks observe the creation flag.
    pub fn component_created(&mut self, idx: ComponentIdx) {
        self.freshly_created.insert(idx);
        let seeds: Vec<SlotKey> = self
            .slots
            .keys()
            .filter(|key| key.component == idx)
            .copied()
            .collect();
        let _ = self.mark_stale_closure(seeds);
        self.freshly_created.remove(&idx);
    }

    /// Removes a component subtree: tree records, slots, and essential cells.
    ///
    /// Surviving slots that read the removed ones are invalidated and marked
    /// stale so their edges rebuild against the new topology.
    pub fn remove_component(&mut self, idx: ComponentIdx) {
        let ancestors = self.tree.ancestors(idx);
        let removed = self.tree.remove_subtree(idx);
        if removed.is_empty() {
            return;
        }
        tracing::debug!(component = %idx, removed = removed.len(), "removing component subtree");
        let removed_set: BTreeSet<ComponentIdx> = removed.iter().copied().collect();

        let removed_slots: Vec<SlotKey> = self
            .slots
            .keys()
            .filter(|key| removed_set.contains(&key.component))
            .copied()
            .collect();
        let mut seeds = Vec::new();
        for key in &removed_slots {
            if let Some(slot) = self.slots.remove(key) {
                for dependent in slot.dependents {
                    if removed_set.contains(&dependent.component) {
                        continue;
                    }
                    if let Some(dep_slot) = self.slots.get_mut(&dependent) {
                        dep_slot.invalidate_edges();
                        seeds.push(dependent);
                    }
                }
            }
        }
        for ancestor in ancestors {
            seeds.extend(self.invalidate_component_slots(ancestor));
        }
        for component in &removed {
            self.essential.remove_component(*component);
            self.freshly_created.remove(component);
        }
        for set in self.flag_dependents.values_mut() {
            set.retain(|key| !removed_set.contains(&key.component));
        }
        for slot in self.slots.values_mut() {
            slot.dependents
                .retain(|key| !removed_set.contains(&key.component));
        }
        let _ = self.mark_stale_closure(seeds);
    }

    /// Drains the collected author warnings.
    pub fn drain_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Drains the recorded telemetry events.
    pub fn drain_events(&mut self) -> Vec<ActionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drains the renderer change feed.
    pub fn drain_changes(&mut self) -> Vec<ChangeNotice> {
        std::mem::take(&mut self.changes)
    }

    // ── internal helpers shared by the resolver/evaluator/coordinator ──

    pub(crate) fn warn(&mut self, message: impl Into<String>, level: WarnLevel) {
        self.warnings.push(Warning::new(message, level));
    }

    /// The slot for `key`, created lazily.
    pub(crate) fn slot_entry(&mut self, key: SlotKey) -> &mut VariableSlot {
        self.slots.entry(key).or_insert_with(VariableSlot::new)
    }

    /// Looks up the definition governing `key`'s variable.
    pub(crate) fn definition_for(
        &self,
        key: SlotKey,
    ) -> Result<StateVariableDefinition, CoreError> {
        let ty = self
            .tree
            .type_of(key.component)
            .ok_or(CoreError::UnknownComponent(key.component))?;
        Ok(*self.registry.variable(ty, key.variable)?)
    }

    /// Invalidates every slot owned by `component`; returns the touched keys.
    fn invalidate_component_slots(&mut self, component: ComponentIdx) -> Vec<SlotKey> {
        let keys: Vec<SlotKey> = self
            .slots
            .keys()
            .filter(|key| key.component == component)
            .copied()
            .collect();
        for key in &keys {
            if let Some(slot) = self.slots.get_mut(key) {
                slot.invalidate_edges();
            }
        }
        keys
    }
}
