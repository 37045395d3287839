//! Shared fixtures for the unit tests.
//!
//! The samples are `spirv-dis` listings of small compute shaders, kept under `tests/samples/`
//! so the integration tests can load the same files from disk.

use crate::program::Program;

/// Thread 0 stores `7` into a shared variable; every invocation reads it after a barrier.
pub const BROADCAST_SAMPLE: &str = include_str!("../../tests/samples/broadcast.spvasm");

/// Like [`BROADCAST_SAMPLE`], but thread 0 stores a value it loaded from a buffer.
pub const BROADCAST_LOAD_SAMPLE: &str = include_str!("../../tests/samples/broadcast_load.spvasm");

/// Like [`BROADCAST_LOAD_SAMPLE`], but the value is loaded before the guard and also feeds
/// the final result.
pub const BROADCAST_SHARED_LOAD_SAMPLE: &str =
    include_str!("../../tests/samples/broadcast_shared_load.spvasm");

/// The write to the shared variable sits behind a second, data-dependent guard nested in the
/// thread 0 block.
pub const NESTED_GUARD_SAMPLE: &str = include_str!("../../tests/samples/nested_guard.spvasm");

/// Thread 0 stores into two shared variables; every invocation reads both.
pub const DOUBLE_BROADCAST_SAMPLE: &str =
    include_str!("../../tests/samples/double_broadcast.spvasm");

/// Thread 0 zeroes an accumulator, every invocation atomically adds to it, thread 0 stores the
/// total.
pub const REDUCE_SAMPLE: &str = include_str!("../../tests/samples/reduce.spvasm");

/// The all-thread read of the shared variable precedes the guarded write.
pub const MISORDERED_SAMPLE: &str = include_str!("../../tests/samples/misordered.spvasm");

/// Doubles a buffer element per invocation without touching shared memory.
pub const NO_IDIOM_SAMPLE: &str = include_str!("../../tests/samples/no_idiom.spvasm");

/// Loads through an identifier that is never defined.
pub const MALFORMED_SAMPLE: &str = include_str!("../../tests/samples/malformed.spvasm");

/// Position of the line whose instruction text is exactly `text`.
///
/// # Panics
///
/// Panics if no such line exists, listing the program to ease debugging.
pub fn position_of_text(program: &Program, text: &str) -> usize {
    program
        .iter()
        .find(|(_, _, inst)| inst.to_string() == text)
        .map(|(position, _, _)| position)
        .unwrap_or_else(|| panic!("'{text}' not found in program:\n{}", program.listing()))
}
