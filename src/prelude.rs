//! # spvgroup Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the spvgroup library. Import this module to get quick access to the essential
//! types for rewriting SPIR-V assembly.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all spvgroup operations
pub use crate::Error;

/// The result type used throughout spvgroup
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Runs the configured rewrites over a program or file
pub use crate::transform::Transformer;

/// Selects the rewrites and the detection mode
pub use crate::transform::TransformConfig;

/// Counts and events of one transform run
pub use crate::transform::TransformReport;

// ================================================================================================
// Program Model
// ================================================================================================

/// Editable instruction sequence and its stable line handles
pub use crate::program::{InstId, Program};

/// One line of SPIR-V assembly and its opcode vocabulary
pub use crate::assembly::{Instruction, Opcode, OperandRef, ReduceOperator};

// ================================================================================================
// Passes and Diagnostics
// ================================================================================================

/// Pass trait and the built-in rewrites
pub use crate::transform::{BroadcastPass, ReducePass, TransformContext, TransformPass};

/// Structured change tracking
pub use crate::transform::{DerivedStats, Event, EventKind, EventLog};
