// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # spvgroup
//!
//! Rewrites workgroup shared-memory communication in SPIR-V compute shaders into subgroup
//! operations. Input and output are SPIR-V assembly as produced by `spirv-dis` and consumed by
//! `spirv-as`.
//!
//! Two idioms are recognised:
//!
//! - **Broadcast**: a single invocation stores a value into a `Workgroup` variable and every
//!   invocation reads it back. The store is disabled and the read becomes
//!   `OpGroupNonUniformBroadcast`.
//! - **Reduce**: a single invocation initialises a `Workgroup` accumulator, every invocation
//!   updates it with an `OpAtomic*` instruction, and a single invocation reads the result. The
//!   three are disabled and replaced by an `OpGroupNonUniform<Op> ... Reduce` in the block all
//!   invocations execute after the guard.
//!
//! Rewrites only touch the lines they need to. Disabled instructions remain as `; NOP` in
//! their original line, so the output diffs line by line against the input.
//!
//! ## Quick Start
//!
//! ```rust
//! use spvgroup::prelude::*;
//!
//! let source = "\
//! OpCapability Shader
//! %uint = OpTypeInt 32 0
//! %uint_0 = OpConstant %uint 0
//! ";
//! let (output, report) = Transformer::default().transform_str(source)?;
//! assert_eq!(output, source);
//! assert!(!report.changed());
//! # Ok::<(), spvgroup::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - Instruction model: parsing, opcode vocabulary, semantic accessors, builders
//! - [`program`] - An editable instruction sequence with stable handles and cached leaders
//! - [`analysis`] - Basic blocks, definition lookup, and single-thread guard detection
//! - [`transform`] - Candidate detection and the broadcast and reduce rewrites
//! - [`file`] - Whole-file reading and atomic writing
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Input that violates SPIR-V's structural
//! invariants (undefined identifiers, missing labels, duplicate definitions) aborts the run:
//!
//! ```rust
//! use spvgroup::{Error, Transformer};
//!
//! match Transformer::default().transform_str("OpBranch %missing") {
//!     Ok(_) => println!("transformed"),
//!     Err(Error::LabelNotFound(label)) => println!("no label {label}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Logging
//!
//! The library logs through the [`log`] facade. Listings and individual rewrites are logged at
//! `debug`, pass summaries at `info`, skipped matches at `warn`. Every change is also recorded
//! in the [`TransformReport`]'s event log.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use spvgroup::prelude::*;
///
/// let program = Program::parse("OpCapability Shader")?;
/// assert_eq!(program.len(), 1);
/// # Ok::<(), spvgroup::Error>(())
/// ```
pub mod prelude;

pub mod analysis;
pub mod assembly;
pub mod file;
pub mod program;
pub mod transform;

/// `spvgroup` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `spvgroup` Error type
///
/// Every fallible operation in this crate reports one of its variants. Malformed input is
/// unrecoverable; [`Error::FileError`] wraps I/O failures.
pub use error::Error;

pub use assembly::{Instruction, Opcode, ReduceOperator};
pub use program::{InstId, Program};
pub use transform::{TransformConfig, TransformReport, Transformer};
