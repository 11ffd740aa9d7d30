// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weave-core: reactive state-variable dependency engine.
//!
//! Every component of an interactive document exposes named state variables
//! whose values are declared, not imperatively computed: a registered
//! descriptor states which other variables/components a variable reads, how
//! to compute it forward, and (for editable variables) how to translate a
//! desired value backward into essential-state writes. The engine is a
//! single-threaded, demand-driven cache over that dependency graph.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod array;
mod definition;
mod dependency;
mod engine_impl;
mod error;
mod essential;
mod event;
mod freshen;
mod ident;
mod inverse;
mod registry;
mod resolve;
mod slot;
mod tree;
mod txn;
mod value;
mod warning;

// Re-exports for stable public API
/// Engine facade and diagnostic counters.
pub use engine_impl::{Core, CoreStats};
/// State-variable descriptor contract: shapes, callbacks, results, signals.
pub use definition::{
    ArrayContext, ArrayKeyDependencies, ArraySizeFn, ArraySpec, ChangeNotice, ChangeSignal,
    ComputedValue, DefinitionContext, DefinitionFn, DefinitionOutcome, DefinitionResult,
    InverseContext, InverseFn, InverseInstruction, InverseResult, KeyDefaultFn, KeyDependenciesFn,
    MarkStaleContext, MarkStaleFn, ReturnDependenciesFn, StateVariableDefinition, VariableCaps,
    VariableKind,
};
/// The dependency vocabulary: declarative specs and their bound values.
pub use dependency::{
    ComponentValues, DependencySource, DependencySpec, DependencyValue, DependencyValues,
    DeterminingValues,
};
/// Error taxonomy: fatal errors, registration errors, write rejections.
pub use error::{CoreError, RegistryError, WriteRejection};
/// Essential cell introspection.
pub use essential::EssentialCell;
/// Telemetry event records.
pub use event::ActionEvent;
/// Identifier types for components, component types, and slots.
pub use ident::{make_ctype_id, ComponentIdx, Hash, SlotKey, TypeId, VarName};
/// Component-type registration.
pub use registry::{ComponentRegistry, ComponentTypeDescriptor, ResolvedVariable};
/// Slot freshness, for introspection and tests.
pub use slot::Freshness;
/// Host-built component topology.
pub use tree::{ComponentRecord, ComponentTree};
/// Transactions: instructions, action requests, receipts, identifiers.
pub use txn::{
    ActionRequest, ActionSource, Instruction, TransactionOutcome, TransactionReceipt, TxId,
};
/// Dynamic state-variable values.
pub use value::StateValue;
/// Author-facing warnings.
pub use warning::{WarnLevel, Warning};
