//! Subgroup rewrites of shared-memory idioms.
//!
//! This module turns two common workgroup communication patterns into subgroup collectives:
//!
//! - **Broadcast**: one invocation writes a shared variable, the others read it back after a
//!   barrier. Rewritten by [`BroadcastPass`] into `OpGroupNonUniformBroadcast`.
//! - **Reduce**: one invocation initialises a shared accumulator, every invocation updates it
//!   atomically, one invocation reads the result. Rewritten by [`ReducePass`] into
//!   `OpGroupNonUniform<Op> ... Reduce`.
//!
//! # Architecture
//!
//! ```text
//! Transformer::run
//!   ├─ BroadcastPass ─┐
//!   └─ ReducePass ────┤
//!                     ├─ patterns::detect   (four read-only scans, optionally on rayon)
//!                     └─ Rewriter           (disable, replace, insert, relocate, declare)
//! ```
//!
//! Every edit is recorded in the run's [`EventLog`] and summarised in the [`TransformReport`].

mod broadcast;
mod config;
mod context;
mod engine;
mod events;
mod pass;
pub mod patterns;
mod reduce;
mod rewriter;

pub use broadcast::BroadcastPass;
pub use config::{TransformConfig, DEFAULT_SCOPE_CONSTANT, SUBGROUP_SCOPE};
pub use context::TransformContext;
pub use engine::{TransformReport, Transformer};
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use pass::TransformPass;
pub use reduce::ReducePass;
pub use rewriter::{
    Rewriter, GROUP_NON_UNIFORM, GROUP_NON_UNIFORM_ARITHMETIC, GROUP_NON_UNIFORM_BALLOT,
};
