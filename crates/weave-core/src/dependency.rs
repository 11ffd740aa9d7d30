// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The dependency vocabulary: declarative specs and their resolved values.
//!
//! A [`DependencySpec`] is the sole contract between a component-type
//! descriptor and the engine. `return_dependencies` produces a named map of
//! specs; the resolver binds each spec to concrete slots, flags, or constants;
//! `definition` then receives the bound values as [`DependencyValues`].
use std::collections::BTreeMap;

use crate::ident::{ComponentIdx, VarName};
use crate::value::StateValue;

/// One declared dependency of a state variable.
///
/// Each variant carries its own selection fields. Optional selections that
/// match nothing are omitted from [`DependencyValues`]; required selections
/// that match nothing are fatal resolution errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencySpec {
    /// Another state variable, on this component or an explicit other one.
    ///
    /// `variable` may be an array entry alias (e.g. `submittedResponse2`).
    StateVariable {
        /// Target component; `None` means the slot's own component.
        component: Option<ComponentIdx>,
        /// Target variable name or entry alias.
        variable: VarName,
        /// When `true`, an unknown component/variable is omitted instead of
        /// failing resolution.
        optional: bool,
    },
    /// An ordered, filtered selection of direct children.
    Child {
        /// Type/group filters; a child matches if its type name equals a
        /// filter or belongs to that group. Empty means "all children".
        groups: Vec<&'static str>,
        /// Variables to read from each matched child.
        variables: Vec<VarName>,
        /// When `true`, a matched child lacking one of `variables` simply
        /// omits it; otherwise that is a resolution error.
        variables_optional: bool,
        /// Restrict to the nth matched child (0-based).
        index: Option<usize>,
    },
    /// Like [`DependencySpec::Child`], over the whole subtree in document
    /// order.
    Descendant {
        /// Type/group filters (empty means every descendant).
        groups: Vec<&'static str>,
        /// Variables to read from each matched descendant.
        variables: Vec<VarName>,
        /// Omit missing variables instead of failing.
        variables_optional: bool,
        /// Restrict to the nth matched descendant (0-based).
        index: Option<usize>,
    },
    /// The nearest ancestor matching a type/group name, walking upward.
    Ancestor {
        /// Type or group name to match.
        component_type: &'static str,
        /// Variables to read from the matched ancestor.
        variables: Vec<VarName>,
        /// When `true`, no matching ancestor omits the dependency.
        optional: bool,
    },
    /// A process-wide named flag set by the host (never a free global).
    Flag {
        /// Flag name.
        name: &'static str,
    },
    /// An inline constant.
    Value {
        /// The constant.
        value: StateValue,
    },
    /// A markup attribute of the owning component.
    Attribute {
        /// Attribute name.
        name: &'static str,
        /// Value used when the component does not carry the attribute.
        default: StateValue,
    },
    /// A state variable of the composite that expanded this component.
    SourceCompositeStateVariable {
        /// Variable to read on the source composite.
        variable: VarName,
        /// When `true`, a component with no source composite omits the
        /// dependency.
        optional: bool,
    },
    /// Whole-subtree aggregate: the named variable on every descendant (in
    /// document order) that declares it. Descendants lacking the variable are
    /// skipped; an empty subtree yields an empty selection.
    RecursiveDependencyValues {
        /// Variable to collect.
        variable: VarName,
        /// Type/group filters (empty means every descendant).
        groups: Vec<&'static str>,
    },
}

/// Provenance of a bound dependency value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencySource {
    /// Component the value was read from.
    pub component: ComponentIdx,
    /// That component's type name.
    pub component_type: &'static str,
}

/// Values of the variables read from one matched component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentValues {
    /// Which component supplied the values.
    pub source: DependencySource,
    /// Variable name → current value.
    pub values: BTreeMap<VarName, StateValue>,
}

/// One bound dependency value, as passed to `definition`.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyValue {
    /// A constant, flag, or attribute value.
    Value(StateValue),
    /// A single bound state variable.
    Variable {
        /// Provenance of the value.
        source: DependencySource,
        /// Current value.
        value: StateValue,
        /// `true` when the value came from the variable's declared default
        /// (no essential value was ever explicitly written).
        used_default: bool,
    },
    /// An ordered multi-component selection (child/descendant/recursive).
    Components(Vec<ComponentValues>),
}

/// The named map of bound dependency values for one compute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DependencyValues(pub(crate) BTreeMap<&'static str, DependencyValue>);

impl DependencyValues {
    /// Raw access to one dependency by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DependencyValue> {
        self.0.get(name)
    }

    /// The scalar value of a `Value`/`Variable` dependency, if bound.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&StateValue> {
        match self.0.get(name) {
            Some(DependencyValue::Value(v)) => Some(v),
            Some(DependencyValue::Variable { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// Numeric view of a scalar dependency.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(StateValue::as_number)
    }

    /// Integer view of a scalar dependency.
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(StateValue::as_integer)
    }

    /// Boolean view of a scalar dependency.
    #[must_use]
    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(StateValue::as_bool)
    }

    /// Text view of a scalar dependency.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(StateValue::as_text)
    }

    /// The matched components of a multi-component dependency.
    ///
    /// Missing or scalar-bound names yield an empty slice.
    #[must_use]
    pub fn components(&self, name: &str) -> &[ComponentValues] {
        match self.0.get(name) {
            Some(DependencyValue::Components(list)) => list,
            _ => &[],
        }
    }

    /// Whether a `Variable` dependency's value came from its default.
    #[must_use]
    pub fn used_default(&self, name: &str) -> bool {
        matches!(
            self.0.get(name),
            Some(DependencyValue::Variable {
                used_default: true,
                ..
            })
        )
    }
}

/// Current values of a variable's determining variables, passed to
/// `return_dependencies` so the dependency shape itself can depend on them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeterminingValues(pub(crate) BTreeMap<VarName, StateValue>);

impl DeterminingValues {
    /// The current value of one determining variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StateValue> {
        self.0.get(name)
    }

    /// Text view of one determining variable.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(StateValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_see_through_variable_bindings() {
        let mut map = BTreeMap::new();
        map.insert(
            "credit",
            DependencyValue::Variable {
                source: DependencySource {
                    component: ComponentIdx(2),
                    component_type: "award",
                },
                value: StateValue::Number(0.5),
                used_default: false,
            },
        );
        map.insert("cap", DependencyValue::Value(StateValue::Integer(1)));
        let values = DependencyValues(map);
        assert_eq!(values.number("credit"), Some(0.5));
        assert_eq!(values.integer("cap"), Some(1));
        assert!(values.components("credit").is_empty());
        assert!(!values.used_default("credit"));
    }
}
