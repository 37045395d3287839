//! SPIR-V assembly instruction model.
//!
//! This module provides the line-level representation the rest of the engine works on:
//!
//! - [`Opcode`] - the opcode vocabulary with engine-level meaning
//! - [`ReduceOperator`] - the operator of an atomic, mapped onto a subgroup reduction
//! - [`Instruction`] - one parsed line with opcode-specific accessors and factory helpers
//! - [`OperandRef`] - the single or paired operand returned by the source/destination accessors
//!
//! # Examples
//!
//! ```rust
//! use spvgroup::assembly::{Instruction, Opcode, ReduceOperator};
//!
//! let atomic = Instruction::parse("%32 = OpAtomicIAdd %uint %total %uint_2 %uint_0 %31")?;
//! assert_eq!(atomic.opcode().reduce_operator(), Some(ReduceOperator::IAdd));
//!
//! let reduce = Instruction::reduce("%41", ReduceOperator::IAdd, "%uint", "%uint_3", "%31");
//! assert_eq!(reduce.to_string(), "%41 = OpGroupNonUniformIAdd %uint %uint_3 Reduce %31");
//! # Ok::<(), spvgroup::Error>(())
//! ```

mod instruction;
mod opcode;

pub use instruction::{
    Instruction, OperandRef, NOP_TEXT, REDUCE_GROUP_OPERATION, WORKGROUP_STORAGE_CLASS,
};
pub use opcode::{Opcode, ReduceOperator, ATOMIC_PREFIX, GROUP_NON_UNIFORM_PREFIX};
