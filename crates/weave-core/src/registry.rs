// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Component-type descriptor registry.
//!
//! There is no inheritance at runtime: a component type is a flat descriptor
//! whose variable table is assembled by explicit composition (shared bundles
//! are plain functions returning definition lists, merged before
//! registration). "Is-a" queries are membership tests against a precomputed
//! taxonomy of domain-separated type ids.
use std::collections::{BTreeMap, BTreeSet};

use crate::definition::{StateVariableDefinition, VariableKind};
use crate::error::{CoreError, RegistryError};
use crate::ident::{make_ctype_id, TypeId, VarName};

/// A component-type descriptor, supplied once at registration.
#[derive(Debug)]
pub struct ComponentTypeDescriptor {
    /// Unique component-type name.
    pub name: &'static str,
    /// Taxonomy groups this type belongs to (e.g. a `textInput` belongs to
    /// `input`). Filters in dependency specs match against the type name or
    /// any group.
    pub groups: &'static [&'static str],
    /// The variable table. Duplicate names are a registration error.
    pub variables: Vec<StateVariableDefinition>,
}

/// A registered component type.
#[derive(Debug)]
struct RegisteredType {
    /// The type's own id plus one id per group: the flat taxonomy used for
    /// "is-a" membership tests.
    taxonomy: BTreeSet<TypeId>,
    /// Variable name → descriptor.
    variables: BTreeMap<VarName, StateVariableDefinition>,
    /// Entry-name prefix → owning array variable.
    entry_prefixes: Vec<(&'static str, VarName)>,
}

/// A variable lookup that may have gone through an entry alias.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedVariable {
    /// The owning variable's descriptor.
    pub definition: StateVariableDefinition,
    /// `Some(key)` when the request was an entry alias (`prefixN` → key
    /// `N - 1`).
    pub array_key: Option<usize>,
}

/// Registry of component-type descriptors.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    types: BTreeMap<&'static str, RegisteredType>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component-type descriptor.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateType`] for a repeated type name,
    /// [`RegistryError::DuplicateVariable`] / [`RegistryError::DuplicateEntryPrefix`]
    /// for colliding table entries, and
    /// [`RegistryError::UnknownDeterminingVariable`] when a determining name
    /// does not exist on the same type.
    pub fn register(&mut self, descriptor: ComponentTypeDescriptor) -> Result<(), RegistryError> {
        if self.types.contains_key(descriptor.name) {
            return Err(RegistryError::DuplicateType(descriptor.name));
        }

        let mut variables: BTreeMap<VarName, StateVariableDefinition> = BTreeMap::new();
        let mut entry_prefixes: Vec<(&'static str, VarName)> = Vec::new();
        for def in descriptor.variables {
            if variables.contains_key(def.name) {
                return Err(RegistryError::DuplicateVariable {
                    component_type: descriptor.name,
                    variable: def.name,
                });
            }
            if let VariableKind::Array(spec) = &def.kind {
                if let Some(prefix) = spec.entry_prefix {
                    if entry_prefixes.iter().any(|(p, _)| *p == prefix) {
                        return Err(RegistryError::DuplicateEntryPrefix {
                            component_type: descriptor.name,
                            prefix,
                        });
                    }
                    entry_prefixes.push((prefix, def.name));
                }
            }
            variables.insert(def.name, def);
        }

        for def in variables.values() {
            for determining in def.determining.iter().copied() {
                if !variables.contains_key(determining) {
                    return Err(RegistryError::UnknownDeterminingVariable {
                        component_type: descriptor.name,
                        variable: def.name,
                        determining,
                    });
                }
            }
        }

        let mut taxonomy = BTreeSet::new();
        taxonomy.insert(make_ctype_id(descriptor.name));
        for group in descriptor.groups {
            taxonomy.insert(make_ctype_id(group));
        }

        self.types.insert(
            descriptor.name,
            RegisteredType {
                taxonomy,
                variables,
                entry_prefixes,
            },
        );
        Ok(())
    }

    /// Whether a component type is registered.
    #[must_use]
    pub fn contains(&self, component_type: &str) -> bool {
        self.types.contains_key(component_type)
    }

    /// Whether `component_type` matches `filter`: its own name, or one of
    /// its taxonomy groups.
    #[must_use]
    pub fn matches_filter(&self, component_type: &str, filter: &str) -> bool {
        self.types
            .get(component_type)
            .is_some_and(|t| t.taxonomy.contains(&make_ctype_id(filter)))
    }

    /// Whether a component type declares a variable under its exact name.
    #[must_use]
    pub fn has_variable(&self, component_type: &str, variable: &str) -> bool {
        self.types
            .get(component_type)
            .is_some_and(|t| t.variables.contains_key(variable))
    }

    /// Looks up a variable by its exact registered name.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownComponentType`] or
    /// [`CoreError::UnknownVariable`].
    pub fn variable(
        &self,
        component_type: &'static str,
        variable: &str,
    ) -> Result<&StateVariableDefinition, CoreError> {
        let ty = self
            .types
            .get(component_type)
            .ok_or(CoreError::UnknownComponentType(component_type))?;
        ty.variables
            .get(variable)
            .ok_or_else(|| CoreError::UnknownVariable {
                component_type,
                variable: variable.to_owned(),
            })
    }

    /// Looks up a variable by exact name or entry alias.
    ///
    /// An entry alias is `prefixN` where `prefix` is an array variable's
    /// declared entry prefix and `N` is a 1-based key (`submittedResponse2`
    /// reads key `1` of `submittedResponses`).
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownComponentType`] or
    /// [`CoreError::UnknownVariable`].
    pub fn resolve_variable(
        &self,
        component_type: &'static str,
        requested: &str,
    ) -> Result<ResolvedVariable, CoreError> {
        let ty = self
            .types
            .get(component_type)
            .ok_or(CoreError::UnknownComponentType(component_type))?;
        if let Some(def) = ty.variables.get(requested) {
            return Ok(ResolvedVariable {
                definition: *def,
                array_key: None,
            });
        }
        for (prefix, variable) in &ty.entry_prefixes {
            let Some(suffix) = requested.strip_prefix(prefix) else {
                continue;
            };
            let Ok(ordinal) = suffix.parse::<usize>() else {
                continue;
            };
            if ordinal == 0 {
                continue;
            }
            let Some(def) = ty.variables.get(variable) else {
                continue;
            };
            return Ok(ResolvedVariable {
                definition: *def,
                array_key: Some(ordinal - 1),
            });
        }
        Err(CoreError::UnknownVariable {
            component_type,
            variable: requested.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        ArrayKeyDependencies, ArraySpec, DefinitionResult, StateVariableDefinition, VariableKind,
    };
    use crate::value::StateValue;

    fn probe_type() -> ComponentTypeDescriptor {
        let items = StateVariableDefinition {
            kind: VariableKind::Array(ArraySpec {
                entry_prefix: Some("item"),
                return_size: |_| 0,
                key_dependencies: ArrayKeyDependencies::Global,
                default_by_key: |_| StateValue::Null,
                allow_extra_keys_in_inverse: false,
            }),
            ..StateVariableDefinition::scalar("items", |_| DefinitionResult::essential())
        };
        ComponentTypeDescriptor {
            name: "probe",
            groups: &["widget"],
            variables: vec![
                StateVariableDefinition::scalar("count", |_| {
                    DefinitionResult::set_value(StateValue::Integer(0))
                }),
                items,
            ],
        }
    }

    #[test]
    fn taxonomy_matches_name_and_groups() {
        let mut registry = ComponentRegistry::new();
        registry.register(probe_type()).unwrap();
        assert!(registry.matches_filter("probe", "probe"));
        assert!(registry.matches_filter("probe", "widget"));
        assert!(!registry.matches_filter("probe", "input"));
    }

    #[test]
    fn entry_aliases_resolve_one_based() {
        let mut registry = ComponentRegistry::new();
        registry.register(probe_type()).unwrap();
        let resolved = registry.resolve_variable("probe", "item3").unwrap();
        assert_eq!(resolved.definition.name, "items");
        assert_eq!(resolved.array_key, Some(2));
        assert!(registry.resolve_variable("probe", "item0").is_err());
        assert!(registry.resolve_variable("probe", "itemx").is_err());
    }

    #[test]
    fn duplicate_type_registration_is_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register(probe_type()).unwrap();
        let err = registry.register(probe_type()).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType("probe"));
    }

    #[test]
    fn unknown_determining_variable_is_rejected() {
        let mut registry = ComponentRegistry::new();
        let bad = ComponentTypeDescriptor {
            name: "bad",
            groups: &[],
            variables: vec![StateVariableDefinition {
                determining: &["missing"],
                ..StateVariableDefinition::scalar("value", |_| DefinitionResult::essential())
            }],
        };
        let err = registry.register(bad).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownDeterminingVariable { .. }
        ));
    }
}
