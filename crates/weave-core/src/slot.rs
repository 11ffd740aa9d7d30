// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Variable slots: the per-(component, variable[, key]) cache cells.
use std::collections::{BTreeMap, BTreeSet};

use crate::dependency::{DependencySource, DependencyValues};
use crate::ident::{SlotKey, VarName};
use crate::value::StateValue;

/// Trustworthiness of a slot's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No edges have ever been resolved for this slot.
    Unresolved,
    /// Edges may exist but the cached value is not trustworthy.
    Stale,
    /// The cached value matches current dependencies.
    Fresh,
}

/// Slot bindings of one matched component of a multi-component dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentBinding {
    /// Which component matched.
    pub source: DependencySource,
    /// Requested variable → the slot it binds to.
    pub slots: Vec<(VarName, SlotKey)>,
}

/// What one dependency edge is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeBinding {
    /// A constant captured at edge-build time (inline value or attribute).
    Constant(StateValue),
    /// A host flag, read at freshen time.
    Flag(&'static str),
    /// A single variable slot.
    Slot {
        /// Target slot.
        key: SlotKey,
        /// Target provenance, surfaced to definitions.
        source: DependencySource,
    },
    /// An ordered multi-component selection.
    Components(Vec<ComponentBinding>),
}

/// One resolved dependency edge.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdge {
    /// Dependency key as named by `return_dependencies`.
    pub name: &'static str,
    /// What it resolved to.
    pub binding: EdgeBinding,
}

impl DependencyEdge {
    /// Every slot this edge reads, in binding order.
    pub fn target_slots(&self) -> Vec<SlotKey> {
        match &self.binding {
            EdgeBinding::Constant(_) | EdgeBinding::Flag(_) => Vec::new(),
            EdgeBinding::Slot { key, .. } => vec![*key],
            EdgeBinding::Components(bindings) => bindings
                .iter()
                .flat_map(|b| b.slots.iter().map(|(_, key)| *key))
                .collect(),
        }
    }
}

/// One cache cell of the dependency graph.
///
/// Slots are created lazily on first access and live until the owning
/// component is destroyed or structurally replaced. Only `freshen` writes the
/// cached value; only the transaction coordinator flips freshness to stale.
#[derive(Debug, Clone, Default)]
pub struct VariableSlot {
    /// Cached value (meaningful only while [`Freshness::Fresh`]).
    pub value: Option<StateValue>,
    /// Cache trustworthiness.
    pub freshness: Freshness,
    /// Whether the cached value came from a declared default (no essential
    /// value ever explicitly written).
    pub used_default: bool,
    /// Resolved dependency edges.
    pub edges: Vec<DependencyEdge>,
    /// Whether `edges` has been built at least once for the current
    /// determining snapshot.
    pub has_edges: bool,
    /// Determining-variable values the current edge set was built from. Any
    /// value-inequality triggers a full edge rebuild.
    pub determining_snapshot: Option<BTreeMap<VarName, StateValue>>,
    /// Dependency values of the last definition run, for the recompute
    /// short-circuit.
    pub last_inputs: Option<DependencyValues>,
    /// Touch counters of "check for actual change" dependencies at the last
    /// definition run; a counter mismatch defeats the short-circuit.
    pub touch_marks: BTreeMap<SlotKey, u64>,
    /// Reverse edges: slots whose value reads this one.
    pub dependents: BTreeSet<SlotKey>,
    /// Number of definition runs for this slot (drives "was touched"
    /// semantics).
    pub touched: u64,
    /// Resolved size, for array umbrella slots.
    pub array_size: Option<usize>,
    /// Declared element component type, for array umbrella slots.
    pub element_type: Option<&'static str>,
}

impl Default for Freshness {
    fn default() -> Self {
        Self::Unresolved
    }
}

impl VariableSlot {
    /// Creates an unresolved slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cached value is currently trustworthy.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    /// Drops the edge set and snapshots so resolution starts over.
    pub fn invalidate_edges(&mut self) {
        self.edges.clear();
        self.has_edges = false;
        self.determining_snapshot = None;
        self.last_inputs = None;
        self.touch_marks.clear();
        if self.freshness == Freshness::Fresh {
            self.freshness = Freshness::Stale;
        }
    }
}
