// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The transaction coordinator.
//!
//! A transaction applies one instruction batch atomically: every
//! `updateValue` is planned into essential writes through the inverse
//! planner, all resulting writes are applied together, and the forward
//! closure of every touched slot is marked stale. Recomputation stays
//! demand-driven. If any instruction is rejected, nothing is applied and no
//! event is emitted — the batch is visible-or-not as a unit.
//!
//! Actions are fully serialized: a queued action with the same source
//! identity as a newer one is superseded (only the latest applies).
use std::collections::BTreeSet;

use crate::error::{CoreError, PlanFailure, WriteRejection};
use crate::event::ActionEvent;
use crate::ident::{ComponentIdx, SlotKey};
use crate::inverse::EssentialWrite;
use crate::value::StateValue;
use crate::warning::WarnLevel;
use crate::Core;

/// Thin wrapper around a transaction identifier.
///
/// The coordinator issues monotonically increasing identifiers.
///
/// # Invariants
/// - The underlying `u64` may wrap at `u64::MAX` (wrapping is intentional).
///   When wrapping occurs, numbering resumes at `1` (skipping zero).
/// - Zero (`TxId(0)`) is reserved as invalid; the coordinator never issues it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TxId(u64);

impl TxId {
    /// Constructs a `TxId` from a raw `u64` value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TxId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One instruction of a transaction batch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    /// Write a desired value through the variable's inverse definition.
    UpdateValue {
        /// Target component.
        component: ComponentIdx,
        /// Variable name or entry alias.
        state_variable: String,
        /// Explicit array key (when the name is not an entry alias).
        array_key: Option<usize>,
        /// Desired value.
        value: StateValue,
    },
    /// Overwrite an essential cell directly, bypassing inverse planning.
    SetEssentialValue {
        /// Target component.
        component: ComponentIdx,
        /// Variable name or entry alias.
        state_variable: String,
        /// Explicit array key (when the name is not an entry alias).
        array_key: Option<usize>,
        /// Value to store.
        value: StateValue,
    },
    /// Record a telemetry event. Pure side effect; no graph feedback.
    RecordEvent {
        /// The event payload.
        event: ActionEvent,
    },
}

/// Identity of an action's source, used to supersede stale calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActionSource {
    /// Component the action originates from.
    pub component: ComponentIdx,
    /// Action name (e.g. `"submitAnswer"`).
    pub action: &'static str,
}

/// An instruction batch with a source identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    /// Source identity; a newer request with the same source supersedes a
    /// queued older one.
    pub source: ActionSource,
    /// The batch, applied as one transaction.
    pub instructions: Vec<Instruction>,
}

/// What one committed transaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction identifier.
    pub tx: TxId,
    /// Essential cells written.
    pub essential_writes: usize,
    /// Slots visited by forward-closure staleness marking.
    pub slots_marked_stale: usize,
    /// Telemetry events recorded.
    pub events_recorded: usize,
}

/// Outcome of one transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOutcome {
    /// Every instruction was applied.
    Committed(TransactionReceipt),
    /// An instruction was rejected; nothing was mutated and no event was
    /// recorded.
    Rejected {
        /// Transaction identifier (consumed even on rejection).
        tx: TxId,
        /// Why the batch was rejected.
        rejection: WriteRejection,
    },
}

impl Core {
    /// Applies one instruction batch as a transaction.
    ///
    /// # Errors
    /// Fatal resolution/cycle errors propagate as [`CoreError`]. Ordinary
    /// write rejections (read-only targets, failed inverses) come back as
    /// [`TransactionOutcome::Rejected`] with nothing mutated.
    pub fn dispatch(&mut self, request: &ActionRequest) -> Result<TransactionOutcome, CoreError> {
        let tx = self.next_tx();
        let mut writes: Vec<EssentialWrite> = Vec::new();
        let mut pending_events: Vec<ActionEvent> = Vec::new();
        // The first write of a burst against each variable carries the
        // initial-change flag; later element writes do not.
        let mut written: BTreeSet<SlotKey> = BTreeSet::new();

        for instruction in &request.instructions {
            let planned = match instruction {
                Instruction::UpdateValue {
                    component,
                    state_variable,
                    array_key,
                    value,
                } => {
                    let target = self.instruction_target(*component, state_variable)?;
                    let initial_change = written.insert(target);
                    let mut chain = Vec::new();
                    self.plan_update(
                        *component,
                        state_variable,
                        *array_key,
                        value.clone(),
                        initial_change,
                        &mut writes,
                        &mut chain,
                    )
                }
                Instruction::SetEssentialValue {
                    component,
                    state_variable,
                    array_key,
                    value,
                } => self.plan_direct_essential(
                    *component,
                    state_variable,
                    *array_key,
                    value.clone(),
                    &mut writes,
                ),
                Instruction::RecordEvent { event } => {
                    pending_events.push(event.clone());
                    Ok(())
                }
            };
            match planned {
                Ok(()) => {}
                Err(PlanFailure::Fatal(e)) => return Err(e),
                Err(PlanFailure::Rejected(rejection)) => {
                    self.warn(
                        format!("write rejected, no state was changed: {rejection}"),
                        WarnLevel::Warning,
                    );
                    tracing::debug!(%tx, %rejection, "transaction rejected");
                    return Ok(TransactionOutcome::Rejected { tx, rejection });
                }
            }
        }

        // Apply phase: all planned writes land together, then the forward
        // closure of every touched slot goes stale.
        let mut seeds: BTreeSet<SlotKey> = BTreeSet::new();
        for write in &writes {
            self.essential.set(write.key, write.value.clone());
            seeds.insert(write.key);
            if write.key.array_key.is_some() {
                seeds.insert(SlotKey::scalar(write.key.component, write.key.variable));
            }
        }
        let slots_marked_stale = self.mark_stale_closure(seeds.into_iter().collect());
        self.freshly_created.clear();
        let events_recorded = pending_events.len();
        self.events.extend(pending_events);
        let receipt = TransactionReceipt {
            tx,
            essential_writes: writes.len(),
            slots_marked_stale,
            events_recorded,
        };
        tracing::debug!(
            %tx,
            writes = receipt.essential_writes,
            stale = receipt.slots_marked_stale,
            "transaction committed"
        );
        Ok(TransactionOutcome::Committed(receipt))
    }

    /// Queues an action, superseding any queued request with the same
    /// source identity.
    pub fn enqueue_action(&mut self, request: ActionRequest) {
        self.queue.retain(|queued| queued.source != request.source);
        self.queue.push(request);
    }

    /// Applies every queued action, fully serialized, in arrival order of
    /// the surviving (latest-per-source) requests.
    ///
    /// # Errors
    /// Propagates the first fatal error; earlier transactions stay applied.
    pub fn flush_actions(&mut self) -> Result<Vec<TransactionOutcome>, CoreError> {
        let queued = std::mem::take(&mut self.queue);
        let mut outcomes = Vec::with_capacity(queued.len());
        for request in queued {
            outcomes.push(self.dispatch(&request)?);
        }
        Ok(outcomes)
    }

    fn next_tx(&mut self) -> TxId {
        // Increment with wrap and ensure we never produce 0 (reserved invalid).
        self.tx_counter = self.tx_counter.wrapping_add(1);
        if self.tx_counter == 0 {
            self.tx_counter = 1;
        }
        TxId::from_raw(self.tx_counter)
    }

    /// Resolves an instruction's target slot for burst bookkeeping.
    fn instruction_target(
        &self,
        component: ComponentIdx,
        requested: &str,
    ) -> Result<SlotKey, CoreError> {
        let ty = self
            .tree
            .type_of(component)
            .ok_or(CoreError::UnknownComponent(component))?;
        let resolved = self.registry.resolve_variable(ty, requested)?;
        Ok(SlotKey::scalar(component, resolved.definition.name))
    }

    /// Plans a direct essential overwrite.
    fn plan_direct_essential(
        &mut self,
        component: ComponentIdx,
        requested: &str,
        explicit_key: Option<usize>,
        value: StateValue,
        out: &mut Vec<EssentialWrite>,
    ) -> Result<(), PlanFailure> {
        let ty = self
            .tree
            .type_of(component)
            .ok_or(CoreError::UnknownComponent(component))?;
        let resolved = self.registry.resolve_variable(ty, requested)?;
        let def = resolved.definition;
        if !def.caps.has_essential {
            return Err(WriteRejection::MissingEssential {
                component,
                variable: requested.to_owned(),
            }
            .into());
        }
        let array_key = resolved.array_key.or(explicit_key);
        if def.is_array() && array_key.is_none() {
            // Whole-array overwrite: one cell per supplied element.
            let Some(items) = value.as_list() else {
                return Err(WriteRejection::InverseFailed {
                    component,
                    variable: requested.to_owned(),
                }
                .into());
            };
            for (key, item) in items.iter().enumerate() {
                out.push(EssentialWrite {
                    key: SlotKey::entry(component, def.name, key),
                    value: item.clone(),
                });
            }
            return Ok(());
        }
        out.push(EssentialWrite {
            key: SlotKey {
                component,
                variable: def.name,
                array_key,
            },
            value,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_ids_expose_and_display_their_raw_value() {
        assert_eq!(TxId::from_raw(7).value(), 7);
        assert_eq!(format!("{}", TxId::from_raw(7)), "7");
    }
}
