// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The dependency resolver.
//!
//! Resolution is two-phase. Phase 1 freshens only the variable's determining
//! variables; their values are snapshotted next to the edge set. Phase 2 calls
//! `return_dependencies` and binds every spec to concrete targets. The edge
//! set stays valid exactly as long as the snapshot compares value-equal; any
//! change discards and rebuilds the whole set. This is what lets a dependency
//! map change *shape* based on another variable's current value.
use std::collections::BTreeMap;

use crate::definition::{ArrayKeyDependencies, StateVariableDefinition, VariableKind};
use crate::dependency::{DependencySource, DependencySpec, DeterminingValues};
use crate::error::CoreError;
use crate::ident::{ComponentIdx, SlotKey, VarName};
use crate::slot::{ComponentBinding, DependencyEdge, EdgeBinding, Freshness};
use crate::Core;

impl Core {
    /// Ensures `key`'s edge set is built and current.
    ///
    /// Freshens determining variables first; when their snapshot is
    /// unchanged the existing edges are kept. Otherwise the edge set is
    /// discarded, rebuilt, and the slot is marked stale.
    pub(crate) fn ensure_edges(
        &mut self,
        key: SlotKey,
        def: &StateVariableDefinition,
    ) -> Result<(), CoreError> {
        // Phase 1: determining variables. They are ordinary dependencies
        // too: the slot re-resolves whenever one of them changes.
        let mut determining: BTreeMap<VarName, crate::value::StateValue> = BTreeMap::new();
        for name in def.determining.iter().copied() {
            let dkey = SlotKey::scalar(key.component, name);
            let value = self.freshen_target(dkey)?;
            self.slot_entry(dkey).dependents.insert(key);
            determining.insert(name, value);
        }

        let unchanged = {
            let slot = self.slot_entry(key);
            slot.has_edges && slot.determining_snapshot.as_ref() == Some(&determining)
        };
        if unchanged {
            return Ok(());
        }

        // Drop the old edge set and its reverse registrations. The slot is
        // edge-less until the rebuild below succeeds.
        let old_edges = std::mem::take(&mut self.slot_entry(key).edges);
        self.slot_entry(key).has_edges = false;
        for edge in &old_edges {
            for target in edge.target_slots() {
                if let Some(slot) = self.slots.get_mut(&target) {
                    slot.dependents.remove(&key);
                }
            }
            if let EdgeBinding::Flag(name) = &edge.binding {
                if let Some(set) = self.flag_dependents.get_mut(name) {
                    set.remove(&key);
                }
            }
        }

        // Phase 2: declare and bind.
        let determining_values = DeterminingValues(determining.clone());
        let specs = match (&def.kind, key.array_key) {
            (VariableKind::Array(spec), Some(array_key)) => match spec.key_dependencies {
                ArrayKeyDependencies::PerKey(per_key) => per_key(array_key, &determining_values),
                // Global-mode keys share the umbrella's edges and carry none
                // of their own.
                ArrayKeyDependencies::Global => BTreeMap::new(),
            },
            _ => (def.return_dependencies)(&determining_values),
        };
        let edges = self.build_edges(key, specs)?;

        for edge in &edges {
            for target in edge.target_slots() {
                self.slot_entry(target).dependents.insert(key);
            }
            if let EdgeBinding::Flag(name) = &edge.binding {
                self.flag_dependents.entry(*name).or_default().insert(key);
            }
        }

        let slot = self.slot_entry(key);
        slot.edges = edges;
        slot.has_edges = true;
        slot.determining_snapshot = Some(determining);
        slot.last_inputs = None;
        slot.touch_marks.clear();
        slot.freshness = Freshness::Stale;
        self.stats.edges_rebuilt += 1;
        tracing::debug!(slot = %key, "rebuilt dependency edges");
        Ok(())
    }

    /// Binds a named spec map to concrete edges. Read-only over the tree and
    /// registry; reverse-edge registration happens in the caller.
    fn build_edges(
        &self,
        key: SlotKey,
        specs: BTreeMap<&'static str, DependencySpec>,
    ) -> Result<Vec<DependencyEdge>, CoreError> {
        let mut edges = Vec::with_capacity(specs.len());
        for (name, spec) in specs {
            let binding = match spec {
                DependencySpec::StateVariable {
                    component,
                    variable,
                    optional,
                } => {
                    let target = component.unwrap_or(key.component);
                    match self.bind_variable(key, name, target, variable, optional)? {
                        Some(binding) => binding,
                        None => continue,
                    }
                }
                DependencySpec::Child {
                    groups,
                    variables,
                    variables_optional,
                    index,
                } => {
                    let matched =
                        self.filter_components(self.tree.children(key.component), &groups, index);
                    self.bind_components(key, name, &matched, &variables, variables_optional)?
                }
                DependencySpec::Descendant {
                    groups,
                    variables,
                    variables_optional,
                    index,
                } => {
                    let descendants = self.tree.descendants(key.component);
                    let matched = self.filter_components(&descendants, &groups, index);
                    self.bind_components(key, name, &matched, &variables, variables_optional)?
                }
                DependencySpec::Ancestor {
                    component_type,
                    variables,
                    optional,
                } => {
                    let found = self
                        .tree
                        .ancestors(key.component)
                        .into_iter()
                        .find(|a| {
                            self.tree
                                .type_of(*a)
                                .is_some_and(|ty| self.registry.matches_filter(ty, component_type))
                        });
                    match found {
                        Some(ancestor) if variables.len() == 1 => {
                            match self.bind_variable(key, name, ancestor, variables[0], false)? {
                                Some(binding) => binding,
                                None => continue,
                            }
                        }
                        Some(ancestor) => {
                            self.bind_components(key, name, &[ancestor], &variables, false)?
                        }
                        None if optional => continue,
                        None => {
                            return Err(self.resolution_error(
                                key,
                                name,
                                format!("no ancestor of type `{component_type}`"),
                            ))
                        }
                    }
                }
                DependencySpec::Flag { name: flag } => EdgeBinding::Flag(flag),
                DependencySpec::Value { value } => EdgeBinding::Constant(value),
                DependencySpec::Attribute { name: attr, default } => EdgeBinding::Constant(
                    self.tree
                        .attribute(key.component, attr)
                        .cloned()
                        .unwrap_or(default),
                ),
                DependencySpec::SourceCompositeStateVariable { variable, optional } => {
                    match self.tree.source_composite(key.component) {
                        Some(composite) => {
                            match self.bind_variable(key, name, composite, variable, optional)? {
                                Some(binding) => binding,
                                None => continue,
                            }
                        }
                        None if optional => continue,
                        None => {
                            return Err(self.resolution_error(
                                key,
                                name,
                                "component has no source composite".to_owned(),
                            ))
                        }
                    }
                }
                DependencySpec::RecursiveDependencyValues { variable, groups } => {
                    let descendants = self.tree.descendants(key.component);
                    let matched: Vec<ComponentIdx> = self
                        .filter_components(&descendants, &groups, None)
                        .into_iter()
                        .filter(|c| {
                            self.tree
                                .type_of(*c)
                                .is_some_and(|ty| self.registry.has_variable(ty, variable))
                        })
                        .collect();
                    self.bind_components(key, name, &matched, &[variable], true)?
                }
            };
            edges.push(DependencyEdge { name, binding });
        }
        Ok(edges)
    }

    /// Binds one `(component, variable)` pair as a single-slot edge.
    ///
    /// Returns `Ok(None)` when the target is missing and the spec allows it.
    fn bind_variable(
        &self,
        key: SlotKey,
        dependency: &'static str,
        target: ComponentIdx,
        variable: VarName,
        optional: bool,
    ) -> Result<Option<EdgeBinding>, CoreError> {
        let Some(component_type) = self.tree.type_of(target) else {
            if optional {
                return Ok(None);
            }
            return Err(self.resolution_error(
                key,
                dependency,
                format!("component {target} does not exist"),
            ));
        };
        match self.registry.resolve_variable(component_type, variable) {
            Ok(resolved) => Ok(Some(EdgeBinding::Slot {
                key: SlotKey {
                    component: target,
                    variable: resolved.definition.name,
                    array_key: resolved.array_key,
                },
                source: DependencySource {
                    component: target,
                    component_type,
                },
            })),
            Err(_) if optional => Ok(None),
            Err(_) => Err(self.resolution_error(
                key,
                dependency,
                format!("component {target} ({component_type}) has no variable `{variable}`"),
            )),
        }
    }

    /// Binds an ordered component selection, one [`ComponentBinding`] per
    /// matched component.
    fn bind_components(
        &self,
        key: SlotKey,
        dependency: &'static str,
        matched: &[ComponentIdx],
        variables: &[VarName],
        variables_optional: bool,
    ) -> Result<EdgeBinding, CoreError> {
        let mut bindings = Vec::with_capacity(matched.len());
        for component in matched {
            let Some(component_type) = self.tree.type_of(*component) else {
                return Err(CoreError::InternalCorruption(
                    "tree navigation returned a missing component",
                ));
            };
            let mut slots = Vec::with_capacity(variables.len());
            for variable in variables {
                match self.registry.resolve_variable(component_type, variable) {
                    Ok(resolved) => slots.push((
                        *variable,
                        SlotKey {
                            component: *component,
                            variable: resolved.definition.name,
                            array_key: resolved.array_key,
                        },
                    )),
                    Err(_) if variables_optional => {}
                    Err(_) => {
                        return Err(self.resolution_error(
                            key,
                            dependency,
                            format!(
                                "component {component} ({component_type}) has no variable `{variable}`"
                            ),
                        ))
                    }
                }
            }
            bindings.push(ComponentBinding {
                source: DependencySource {
                    component: *component,
                    component_type,
                },
                slots,
            });
        }
        Ok(EdgeBinding::Components(bindings))
    }

    /// Filters a candidate list by type/group, with an optional nth-match
    /// restriction.
    fn filter_components(
        &self,
        candidates: &[ComponentIdx],
        groups: &[&'static str],
        index: Option<usize>,
    ) -> Vec<ComponentIdx> {
        let matched: Vec<ComponentIdx> = candidates
            .iter()
            .filter(|c| {
                self.tree.type_of(**c).is_some_and(|ty| {
                    groups.is_empty()
                        || groups.iter().any(|g| self.registry.matches_filter(ty, g))
                })
            })
            .copied()
            .collect();
        match index {
            Some(i) => matched.get(i).map(|c| vec![*c]).unwrap_or_default(),
            None => matched,
        }
    }

    fn resolution_error(&self, key: SlotKey, dependency: &str, detail: String) -> CoreError {
        CoreError::Resolution {
            component: key.component,
            variable: key.variable,
            dependency: dependency.to_owned(),
            detail,
        }
    }
}
