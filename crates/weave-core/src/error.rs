// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy.
//!
//! Fatal conditions ([`CoreError`]) abort building the affected slot but never
//! tear down the whole tree. A write against a read-only variable is *not*
//! fatal: it surfaces as a [`WriteRejection`] inside a
//! [`crate::txn::TransactionOutcome`] and mutates nothing.
use thiserror::Error;

use crate::ident::{ComponentIdx, SlotKey, VarName};

/// Renders a dependency chain as `a.b -> c.d -> a.b`.
fn render_chain(chain: &[SlotKey]) -> String {
    let mut out = String::new();
    for (i, key) in chain.iter().enumerate() {
        if i > 0 {
            out.push_str(" -> ");
        }
        out.push_str(&key.to_string());
    }
    out
}

/// Fatal engine errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The component index does not exist in the tree.
    #[error("component {0} not found")]
    UnknownComponent(ComponentIdx),
    /// The component's type tag has no registered descriptor.
    #[error("component type `{0}` is not registered")]
    UnknownComponentType(&'static str),
    /// The component type has no such state variable (or entry alias).
    #[error("unknown state variable `{variable}` for component type `{component_type}`")]
    UnknownVariable {
        /// Component type whose table was searched.
        component_type: &'static str,
        /// Requested variable name or entry alias.
        variable: String,
    },
    /// A required dependency could not be bound.
    #[error("failed to resolve dependency `{dependency}` of {component}.{variable}: {detail}")]
    Resolution {
        /// Component owning the slot being resolved.
        component: ComponentIdx,
        /// Variable being resolved.
        variable: VarName,
        /// Name of the offending dependency entry.
        dependency: String,
        /// What went wrong.
        detail: String,
    },
    /// A slot was found in its own dependency ancestor chain.
    #[error("circular dependency: {}", render_chain(.chain))]
    CircularDependency {
        /// The offending cycle, first slot repeated at the end.
        chain: Vec<SlotKey>,
    },
    /// Internal invariant violated (engine state corruption).
    #[error("internal invariant violated: {0}")]
    InternalCorruption(&'static str),
}

/// Errors raised while registering component-type descriptors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A descriptor with the same type name was already registered.
    #[error("duplicate component type: {0}")]
    DuplicateType(&'static str),
    /// Two variables of one component type share a name.
    #[error("duplicate state variable `{variable}` on component type `{component_type}`")]
    DuplicateVariable {
        /// Component type being registered.
        component_type: &'static str,
        /// Colliding variable name.
        variable: VarName,
    },
    /// Two array variables of one component type share an entry prefix.
    #[error("duplicate entry prefix `{prefix}` on component type `{component_type}`")]
    DuplicateEntryPrefix {
        /// Component type being registered.
        component_type: &'static str,
        /// Colliding entry-name prefix.
        prefix: &'static str,
    },
    /// A determining-variable name does not exist on the same component type.
    #[error(
        "variable `{variable}` on `{component_type}` lists unknown determining variable `{determining}`"
    )]
    UnknownDeterminingVariable {
        /// Component type being registered.
        component_type: &'static str,
        /// Variable whose determining list is malformed.
        variable: VarName,
        /// The missing determining-variable name.
        determining: VarName,
    },
}

/// Why a write request was rejected.
///
/// Rejections are ordinary outcomes, not errors: the interactive surface
/// treats them as silent no-ops while a warning is logged for the document
/// author. No essential value is mutated by a rejected request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WriteRejection {
    /// The target variable declares no inverse definition (read-only).
    #[error("variable `{variable}` of component {component} is read-only")]
    ReadOnly {
        /// Target component.
        component: ComponentIdx,
        /// Target variable name as requested.
        variable: String,
    },
    /// The inverse definition reported failure for the desired value.
    #[error("inverse computation failed for `{variable}` of component {component}")]
    InverseFailed {
        /// Target component.
        component: ComponentIdx,
        /// Target variable name as requested.
        variable: String,
    },
    /// An inverse instruction targeted an essential cell the variable lacks.
    #[error("variable `{variable}` of component {component} has no essential cell")]
    MissingEssential {
        /// Target component.
        component: ComponentIdx,
        /// Target variable name as requested.
        variable: String,
    },
    /// An inverse instruction redirected into a non-writable dependency.
    #[error(
        "dependency `{dependency}` of `{variable}` on component {component} cannot absorb a write"
    )]
    NotInvertible {
        /// Component whose inverse produced the instruction.
        component: ComponentIdx,
        /// Variable whose inverse produced the instruction.
        variable: String,
        /// The dependency key that could not be written through.
        dependency: String,
    },
    /// An array write addressed a key past the declared size without the
    /// grow-on-write capability.
    #[error("array key {key} is out of range for `{variable}` of component {component}")]
    KeyOutOfRange {
        /// Target component.
        component: ComponentIdx,
        /// Target array variable.
        variable: String,
        /// Offending key.
        key: usize,
    },
    /// Inverse planning revisited a slot already on the planning chain.
    #[error("inverse planning cycle at {0}")]
    PlanningCycle(SlotKey),
}

/// Failure modes of inverse planning: fatal, or an ordinary rejection.
#[derive(Debug)]
pub(crate) enum PlanFailure {
    /// Fatal engine error (propagates out of the transaction).
    Fatal(CoreError),
    /// Ordinary rejection (the transaction reports it and mutates nothing).
    Rejected(WriteRejection),
}

impl From<CoreError> for PlanFailure {
    fn from(e: CoreError) -> Self {
        Self::Fatal(e)
    }
}

impl From<WriteRejection> for PlanFailure {
    fn from(r: WriteRejection) -> Self {
        Self::Rejected(r)
    }
}
