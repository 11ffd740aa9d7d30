// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Essential values: per-variable mutable baseline state.
//!
//! One cell per `(component, variable[, array key])`, addressed by the same
//! [`SlotKey`] shape as slots. Cells are lazily initialized from declared
//! defaults on first read and outlive recomputation; only explicit write
//! instructions (routed through the transaction coordinator) mutate them.
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::ident::{ComponentIdx, SlotKey, VarName};
use crate::value::StateValue;

/// One essential cell.
#[derive(Debug, Clone, PartialEq)]
pub struct EssentialCell {
    /// Current baseline value.
    pub value: StateValue,
    /// `false` while the cell still holds its lazily-initialized default.
    pub explicitly_set: bool,
}

/// The essential value store.
#[derive(Debug, Clone, Default)]
pub struct EssentialStore {
    cells: BTreeMap<SlotKey, EssentialCell>,
}

impl EssentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a cell, initializing it to `default` on first access.
    ///
    /// Returns the value and whether it (still) comes from the default.
    pub fn get_or_init(&mut self, key: SlotKey, default: StateValue) -> (StateValue, bool) {
        let cell = self.cells.entry(key).or_insert(EssentialCell {
            value: default,
            explicitly_set: false,
        });
        (cell.value.clone(), !cell.explicitly_set)
    }

    /// Overwrites a cell with an explicit value.
    pub fn set(&mut self, key: SlotKey, value: StateValue) {
        self.cells.insert(
            key,
            EssentialCell {
                value,
                explicitly_set: true,
            },
        );
    }

    /// Reads a cell without initializing it.
    #[must_use]
    pub fn peek(&self, key: &SlotKey) -> Option<&EssentialCell> {
        self.cells.get(key)
    }

    /// The largest explicitly written array key for `(component, variable)`,
    /// if any. Drives implicit array growth for variables that permit extra
    /// keys in inverse writes.
    #[must_use]
    pub fn max_written_key(&self, component: ComponentIdx, variable: VarName) -> Option<usize> {
        let lo = SlotKey::entry(component, variable, 0);
        let hi = SlotKey::entry(component, variable, usize::MAX);
        self.cells
            .range((Bound::Included(lo), Bound::Included(hi)))
            .filter(|(_, cell)| cell.explicitly_set)
            .filter_map(|(key, _)| key.array_key)
            .max()
    }

    /// Drops every cell owned by `component`.
    pub fn remove_component(&mut self, component: ComponentIdx) {
        self.cells.retain(|key, _| key.component != component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_read_initializes_from_default_and_reports_it() {
        let mut store = EssentialStore::new();
        let key = SlotKey::scalar(ComponentIdx(1), "value");
        let (v, used_default) = store.get_or_init(key, StateValue::from(""));
        assert_eq!(v, StateValue::from(""));
        assert!(used_default);
        // Still the default on the second read.
        let (_, used_default) = store.get_or_init(key, StateValue::from("other"));
        assert!(used_default);
    }

    #[test]
    fn explicit_writes_clear_the_default_marker() {
        let mut store = EssentialStore::new();
        let key = SlotKey::scalar(ComponentIdx(1), "value");
        store.set(key, StateValue::from("x"));
        let (v, used_default) = store.get_or_init(key, StateValue::from(""));
        assert_eq!(v, StateValue::from("x"));
        assert!(!used_default);
    }

    #[test]
    fn max_written_key_ignores_lazy_defaults_and_other_variables() {
        let mut store = EssentialStore::new();
        let c = ComponentIdx(4);
        let _ = store.get_or_init(SlotKey::entry(c, "a", 9), StateValue::Null);
        store.set(SlotKey::entry(c, "a", 2), StateValue::Integer(1));
        store.set(SlotKey::entry(c, "a", 5), StateValue::Integer(2));
        store.set(SlotKey::entry(c, "b", 7), StateValue::Integer(3));
        assert_eq!(store.max_written_key(c, "a"), Some(5));
        assert_eq!(store.max_written_key(ComponentIdx(5), "a"), None);
    }
}
