// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! State-variable descriptors: the per-variable contract a component type
//! registers once.
//!
//! Forward and inverse computation are two independent, explicit functions;
//! the engine never derives one from the other. All callbacks are plain `fn`
//! pointers so descriptors stay `Copy` and registration stays data-only.
use std::collections::BTreeMap;

use crate::dependency::{DependencySpec, DependencyValues, DeterminingValues};
use crate::ident::{ComponentIdx, VarName};
use crate::value::StateValue;
use crate::warning::{WarnLevel, Warning};

/// Produces the named dependency map for a variable (or an array umbrella),
/// given the current values of its determining variables.
pub type ReturnDependenciesFn =
    fn(&DeterminingValues) -> BTreeMap<&'static str, DependencySpec>;

/// Produces the dependency map for one array key.
pub type KeyDependenciesFn =
    fn(usize, &DeterminingValues) -> BTreeMap<&'static str, DependencySpec>;

/// Computes the declared size of an array variable from its umbrella
/// dependency values.
pub type ArraySizeFn = fn(&DependencyValues) -> usize;

/// Forward computation: dependency values in, exactly one result out.
pub type DefinitionFn = for<'a> fn(&'a DefinitionContext<'a>) -> DefinitionResult;

/// Inverse computation: desired value in, instructions (or failure) out.
pub type InverseFn = for<'a> fn(&'a InverseContext<'a>) -> InverseResult;

/// Converts an incoming staleness signal into an external change signal.
pub type MarkStaleFn = fn(&MarkStaleContext) -> Option<ChangeSignal>;

/// Produces the default value for one array key.
pub type KeyDefaultFn = fn(usize) -> StateValue;

/// Context handed to a forward `definition` call.
#[derive(Debug)]
pub struct DefinitionContext<'a> {
    /// Bound dependency values. For per-key array computes these are the
    /// key's own bindings; otherwise the variable's (umbrella) bindings.
    pub values: &'a DependencyValues,
    /// Present for array computes.
    pub array: Option<ArrayContext<'a>>,
}

/// Array-compute context: resolved size plus the keys being computed.
#[derive(Debug)]
pub struct ArrayContext<'a> {
    /// Resolved array size.
    pub size: usize,
    /// Keys this call must produce (a subset of `0..size`).
    pub keys: &'a [usize],
}

/// How one value (scalar, or one array key) is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputedValue {
    /// The definition computed the value outright.
    SetValue(StateValue),
    /// Fall back to the essential cell, initializing it from the declared
    /// default on first read.
    UseEssentialOrDefault,
}

/// The single result a `definition` call returns.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionOutcome {
    /// Result for a scalar variable.
    Scalar(ComputedValue),
    /// Per-key results for an array variable. Requested keys missing from
    /// `by_key` take the declared per-key default.
    Array {
        /// Key → computed value.
        by_key: BTreeMap<usize, ComputedValue>,
        /// Declared element component type, surfaced to renderers.
        element_type: Option<&'static str>,
    },
}

/// A definition result: the outcome plus any author warnings to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionResult {
    /// The computed outcome.
    pub outcome: DefinitionOutcome,
    /// Warnings delivered to the global sink; they never halt evaluation.
    pub warnings: Vec<Warning>,
}

impl DefinitionResult {
    /// Scalar result: the definition computed `value`.
    #[must_use]
    pub fn set_value(value: impl Into<StateValue>) -> Self {
        Self {
            outcome: DefinitionOutcome::Scalar(ComputedValue::SetValue(value.into())),
            warnings: Vec::new(),
        }
    }

    /// Scalar result: fall back to the essential cell (or declared default).
    #[must_use]
    pub fn essential() -> Self {
        Self {
            outcome: DefinitionOutcome::Scalar(ComputedValue::UseEssentialOrDefault),
            warnings: Vec::new(),
        }
    }

    /// Array result from an explicit per-key map.
    #[must_use]
    pub fn array(by_key: BTreeMap<usize, ComputedValue>) -> Self {
        Self {
            outcome: DefinitionOutcome::Array {
                by_key,
                element_type: None,
            },
            warnings: Vec::new(),
        }
    }

    /// Array result where every requested key falls back to its essential
    /// cell.
    #[must_use]
    pub fn array_essential(keys: &[usize]) -> Self {
        let by_key = keys
            .iter()
            .map(|k| (*k, ComputedValue::UseEssentialOrDefault))
            .collect();
        Self::array(by_key)
    }

    /// Declares the element component type of an array result. No-op for
    /// scalar outcomes.
    #[must_use]
    pub fn with_element_type(mut self, ty: &'static str) -> Self {
        if let DefinitionOutcome::Array { element_type, .. } = &mut self.outcome {
            *element_type = Some(ty);
        }
        self
    }

    /// Attaches one warning for the global sink.
    #[must_use]
    pub fn with_warning(mut self, message: impl Into<String>, level: WarnLevel) -> Self {
        self.warnings.push(Warning::new(message, level));
        self
    }
}

/// Context handed to an inverse `definition` call.
#[derive(Debug)]
pub struct InverseContext<'a> {
    /// Desired value for the variable (for array targets, the assembled
    /// desired list or entry value).
    pub desired: &'a StateValue,
    /// Desired values per array key, when the write targets array entries.
    pub desired_by_key: Option<&'a BTreeMap<usize, StateValue>>,
    /// Current bound dependency values.
    pub values: &'a DependencyValues,
    /// `true` only for the externally initiated write of a burst; recursive
    /// planner invocations clear it. First writes may trigger
    /// resize/allocation behavior later writes must not repeat.
    pub initial_change: bool,
}

/// One instruction produced by an inverse definition.
#[derive(Debug, Clone, PartialEq)]
pub enum InverseInstruction {
    /// Write this variable's own essential cell.
    SetEssential {
        /// Value to store.
        value: StateValue,
    },
    /// Write this array variable's essential cells, per key.
    SetEssentialByKey {
        /// Key → value to store.
        by_key: BTreeMap<usize, StateValue>,
    },
    /// Redirect the desired value into a scalar-bound dependency; the
    /// planner re-invokes itself on whatever that dependency currently
    /// resolves to.
    SetDependency {
        /// Dependency key (as named by `return_dependencies`).
        dependency: &'static str,
        /// Desired value for the dependency's target.
        desired: StateValue,
    },
    /// Redirect into one variable of one matched component of a
    /// multi-component dependency.
    SetDependencyComponent {
        /// Dependency key (as named by `return_dependencies`).
        dependency: &'static str,
        /// Index into the matched-component list.
        index: usize,
        /// Variable of that component to write.
        variable: VarName,
        /// Desired value for it.
        desired: StateValue,
    },
}

/// Result of an inverse definition.
#[derive(Debug, Clone, PartialEq)]
pub enum InverseResult {
    /// The desired value cannot be produced; the whole write request is
    /// abandoned with no mutation anywhere.
    Failure,
    /// Instructions to recurse on. Planning succeeds only once every branch
    /// bottoms out in an essential write.
    Instructions(Vec<InverseInstruction>),
}

/// Context flags passed to a `mark_stale` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkStaleContext {
    /// `true` when the owning component was just (re)created, as opposed to
    /// an ordinary upstream value change.
    pub component_just_created: bool,
}

/// External signal kinds a `mark_stale` hook may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    /// The variable's value may have changed.
    ValueChanged,
    /// The owning component was just (re)created.
    ComponentFresh,
}

/// One entry of the renderer change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Component whose variable was touched.
    pub component: ComponentIdx,
    /// The touched variable.
    pub variable: VarName,
    /// Signal kind.
    pub signal: ChangeSignal,
}

/// Capability flags of a state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariableCaps {
    /// The variable owns an essential cell (local mutable baseline).
    pub has_essential: bool,
    /// The (external) composite-expansion layer may publicly shadow this
    /// variable. The engine only records and exposes the capability.
    pub shadowable: bool,
    /// Renderers observe this variable; staleness produces a
    /// [`ChangeNotice`] even without a `mark_stale` hook.
    pub for_renderer: bool,
    /// "Was touched" semantics: downstream recomputation is forced whenever
    /// this variable is recomputed, even if its value is unchanged.
    pub check_for_actual_change: bool,
}

/// Per-key dependency mode of an array variable.
#[derive(Clone, Copy)]
pub enum ArrayKeyDependencies {
    /// All keys share the umbrella dependency set; one `definition` call
    /// computes every requested key.
    Global,
    /// Each key resolves its own dependency set, parameterized by key index.
    PerKey(KeyDependenciesFn),
}

impl core::fmt::Debug for ArrayKeyDependencies {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Global => f.write_str("Global"),
            Self::PerKey(_) => f.write_str("PerKey(..)"),
        }
    }
}

/// Array-ness descriptor of a state variable.
#[derive(Clone, Copy)]
pub struct ArraySpec {
    /// Entry-name prefix for aliased reads (`prefix1`, `prefix2`, ...,
    /// 1-based in the alias, 0-based in [`crate::SlotKey::array_key`]).
    pub entry_prefix: Option<&'static str>,
    /// Computes the declared size from the umbrella dependency values.
    pub return_size: ArraySizeFn,
    /// Per-key dependency mode.
    pub key_dependencies: ArrayKeyDependencies,
    /// Default value for keys no dependency or essential cell supplies.
    pub default_by_key: KeyDefaultFn,
    /// Permit inverse writes past the declared size, implicitly growing it.
    pub allow_extra_keys_in_inverse: bool,
}

impl core::fmt::Debug for ArraySpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArraySpec")
            .field("entry_prefix", &self.entry_prefix)
            .field("key_dependencies", &self.key_dependencies)
            .field(
                "allow_extra_keys_in_inverse",
                &self.allow_extra_keys_in_inverse,
            )
            .finish_non_exhaustive()
    }
}

/// Scalar-vs-array shape of a state variable.
#[derive(Debug, Clone, Copy)]
pub enum VariableKind {
    /// One value.
    Scalar,
    /// Runtime-sized array of values.
    Array(ArraySpec),
}

/// Descriptor for one state variable of one component type.
///
/// Registered once per component type; immutable afterwards. Each descriptor
/// owns:
/// * a variable name and shape
/// * the determining-variable list whose values shape the dependency map
/// * callbacks for dependency declaration, forward and (optional) inverse
///   computation, and staleness-signal conversion
/// * capability flags and defaults
#[derive(Clone, Copy)]
pub struct StateVariableDefinition {
    /// Variable name, unique within the component type.
    pub name: VarName,
    /// Scalar or array shape.
    pub kind: VariableKind,
    /// Names of same-component variables whose values the dependency map
    /// depends on. Resolved (and freshened) before `return_dependencies`
    /// runs; a value change discards and rebuilds the whole edge set.
    pub determining: &'static [VarName],
    /// Declares the dependency map.
    pub return_dependencies: ReturnDependenciesFn,
    /// Forward computation.
    pub definition: DefinitionFn,
    /// Inverse computation; `None` makes the variable read-only.
    pub inverse: Option<InverseFn>,
    /// Staleness-signal conversion hook.
    pub mark_stale: Option<MarkStaleFn>,
    /// Capability flags.
    pub caps: VariableCaps,
    /// Declared default for the (scalar) essential cell.
    pub default: Option<fn() -> StateValue>,
}

impl core::fmt::Debug for StateVariableDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateVariableDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("determining", &self.determining)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}

impl StateVariableDefinition {
    /// Convenience constructor for a scalar variable with no dependencies
    /// and no inverse; fields are overridden struct-literal style.
    #[must_use]
    pub fn scalar(name: VarName, definition: DefinitionFn) -> Self {
        Self {
            name,
            kind: VariableKind::Scalar,
            determining: &[],
            return_dependencies: |_| BTreeMap::new(),
            definition,
            inverse: None,
            mark_stale: None,
            caps: VariableCaps {
                has_essential: false,
                shadowable: false,
                for_renderer: false,
                check_for_actual_change: false,
            },
            default: None,
        }
    }

    /// The array spec, when this variable is array-valued.
    #[must_use]
    pub const fn array_spec(&self) -> Option<&ArraySpec> {
        match &self.kind {
            VariableKind::Array(spec) => Some(spec),
            VariableKind::Scalar => None,
        }
    }

    /// Whether this variable is array-valued.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self.kind, VariableKind::Array(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_constructor_yields_read_only_variable() {
        let def = StateVariableDefinition::scalar("probe", |_| {
            DefinitionResult::set_value(StateValue::Integer(7))
        });
        assert!(def.inverse.is_none());
        assert!(!def.is_array());
        assert!(def.array_spec().is_none());
    }

    #[test]
    fn array_essential_covers_requested_keys() {
        let result = DefinitionResult::array_essential(&[0, 2]);
        let DefinitionOutcome::Array { by_key, .. } = result.outcome else {
            unreachable!("array_essential must produce an array outcome");
        };
        assert_eq!(by_key.len(), 2);
        assert_eq!(by_key.get(&2), Some(&ComputedValue::UseEssentialOrDefault));
    }
}
