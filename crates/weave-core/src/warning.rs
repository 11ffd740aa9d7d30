// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Author-facing warning sink.
//!
//! Warnings never halt evaluation. Definitions attach them to their results,
//! the transaction coordinator logs rejected writes through the same sink, and
//! the authoring layer drains them via [`crate::Core::drain_warnings`].

/// Severity of a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WarnLevel {
    /// Informational note.
    Info,
    /// Something is likely wrong with the authored document.
    Warning,
    /// Authoring error; evaluation continued with a fallback.
    Error,
}

/// One collected warning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Warning {
    /// Human-readable message for the document author.
    pub message: String,
    /// Severity level.
    pub level: WarnLevel,
}

impl Warning {
    /// Creates a warning.
    #[must_use]
    pub fn new(message: impl Into<String>, level: WarnLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}
