// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Telemetry event records.
//!
//! Events are a one-way side channel: actions record them inside a
//! transaction, the host drains them via [`crate::Core::drain_events`], and
//! the dependency graph never reads them back. A rejected transaction emits
//! none of its events.
use std::collections::BTreeMap;

use crate::value::StateValue;

/// One telemetry event: `{verb, object, result}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionEvent {
    /// What happened (e.g. `"submitted"`).
    pub verb: String,
    /// What it happened to (e.g. a component label or index).
    pub object: String,
    /// Structured payload describing the outcome.
    pub result: BTreeMap<String, StateValue>,
}

impl ActionEvent {
    /// Creates an event with an empty result payload.
    #[must_use]
    pub fn new(verb: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            object: object.into(),
            result: BTreeMap::new(),
        }
    }

    /// Adds one result field.
    #[must_use]
    pub fn with_result(mut self, key: impl Into<String>, value: StateValue) -> Self {
        self.result.insert(key.into(), value);
        self
    }
}
