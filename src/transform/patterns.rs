//! Candidate detection for the shared-memory idioms.
//!
//! Four read-only scans find the instructions a rewrite can act on:
//!
//! | Detector                    | Instruction     | Block         |
//! |-----------------------------|-----------------|---------------|
//! | [`single_thread_writes`]    | `OpStore`       | single-thread |
//! | [`all_thread_reads`]        | `OpLoad`        | all-thread    |
//! | [`all_thread_atomics`]      | `OpAtomic*`     | all-thread    |
//! | [`single_thread_reads`]     | `OpLoad`        | single-thread |
//!
//! All of them only consider memory referenced directly through a `Workgroup` variable. The
//! scans share nothing, so [`detect`] can run them concurrently.

use log::debug;

use crate::{
    analysis::{defuse, divergence},
    assembly::{Instruction, Opcode, ReduceOperator},
    program::{InstId, Program},
    Result,
};

/// `OpStore` to shared memory inside a single-thread block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedWrite {
    /// Handle of the store
    pub id: InstId,
    /// Position of the store at detection time
    pub position: usize,
    /// The shared variable written
    pub pointer: String,
    /// The value stored
    pub value: String,
    /// Operand naming the invocation that performs the write
    pub thread: String,
    /// The conditional branch guarding the write
    pub branch: InstId,
    /// Element type of the shared variable
    pub element_type: String,
}

/// `OpLoad` from shared memory executed by every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRead {
    /// Handle of the load
    pub id: InstId,
    /// Position of the load at detection time
    pub position: usize,
    /// The shared variable read
    pub pointer: String,
    /// Result identifier of the load
    pub result: String,
    /// Element type of the shared variable
    pub element_type: String,
}

/// Atomic read-modify-write of shared memory executed by every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicWrite {
    /// Handle of the atomic
    pub id: InstId,
    /// Position of the atomic at detection time
    pub position: usize,
    /// The shared variable updated
    pub pointer: String,
    /// Each invocation's contribution
    pub value: String,
    /// Result identifier (the pre-update value)
    pub result: String,
    /// Result type of the atomic
    pub element_type: String,
    /// Subgroup operator equivalent to the atomic
    pub operator: ReduceOperator,
}

/// `OpLoad` from shared memory inside a single-thread block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedRead {
    /// Handle of the load
    pub id: InstId,
    /// Position of the load at detection time
    pub position: usize,
    /// The shared variable read
    pub pointer: String,
    /// Result identifier of the load
    pub result: String,
    /// Element type of the shared variable
    pub element_type: String,
    /// Operand naming the invocation that performs the read
    pub thread: String,
    /// The conditional branch guarding the read
    pub branch: InstId,
}

/// Output of all four detectors over one program state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    /// Single-thread shared writes
    pub writes: Vec<SharedWrite>,
    /// All-thread shared reads
    pub reads: Vec<SharedRead>,
    /// All-thread shared atomics
    pub atomics: Vec<AtomicWrite>,
    /// Single-thread shared reads
    pub guarded_reads: Vec<GuardedRead>,
}

impl Candidates {
    /// True if no detector found anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
            && self.reads.is_empty()
            && self.atomics.is_empty()
            && self.guarded_reads.is_empty()
    }
}

/// True if `pointer_id` names a `Workgroup` variable.
fn is_shared(program: &Program, pointer_id: &str) -> Result<bool> {
    let (_, pointer) = defuse::resolve(program, pointer_id)?;
    Ok(pointer.is_shared_variable())
}

/// Loads from shared memory, with the classification of their block.
fn shared_loads(
    program: &Program,
) -> Result<Vec<(usize, InstId, &Instruction, Option<divergence::SingleThread>)>> {
    let mut loads = Vec::new();
    for (position, id, inst) in program.iter() {
        if inst.opcode() != Opcode::Load || !is_shared(program, inst.source_id()?)? {
            continue;
        }
        let guard = divergence::classify_block(program, position)?;
        loads.push((position, id, inst, guard));
    }
    Ok(loads)
}

fn result_of(inst: &Instruction) -> Result<&str> {
    inst.result_id()
        .ok_or_else(|| malformed_error!("'{}' has no result identifier", inst))
}

/// Stores to shared memory performed by a single invocation.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for dangling references, and the accessor errors of
/// [`Instruction`] for malformed stores.
pub fn single_thread_writes(program: &Program) -> Result<Vec<SharedWrite>> {
    let mut writes = Vec::new();
    for (position, id, inst) in program.iter() {
        if inst.opcode() != Opcode::Store {
            continue;
        }
        let pointer = inst.destination_id()?;
        if !is_shared(program, pointer)? {
            continue;
        }
        let Some(guard) = divergence::classify_block(program, position)? else {
            continue;
        };

        writes.push(SharedWrite {
            id,
            position,
            pointer: pointer.to_string(),
            value: inst.source_id()?.to_string(),
            thread: guard.thread,
            branch: guard.branch,
            element_type: defuse::pointer_element_type(program, pointer)?.to_string(),
        });
    }
    Ok(writes)
}

/// Loads from shared memory performed by every invocation.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for dangling references, and the accessor errors of
/// [`Instruction`] for malformed loads.
pub fn all_thread_reads(program: &Program) -> Result<Vec<SharedRead>> {
    let mut reads = Vec::new();
    for (position, id, inst, guard) in shared_loads(program)? {
        if guard.is_some() {
            continue;
        }
        let result = result_of(inst)?;
        reads.push(SharedRead {
            id,
            position,
            pointer: inst.source_id()?.to_string(),
            result: result.to_string(),
            element_type: defuse::memory_element_type(program, result)?.to_string(),
        });
    }
    Ok(reads)
}

/// Atomic updates of shared memory performed by every invocation.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for dangling references, and the accessor errors of
/// [`Instruction`] for malformed atomics.
pub fn all_thread_atomics(program: &Program) -> Result<Vec<AtomicWrite>> {
    let mut atomics = Vec::new();
    for (position, id, inst) in program.iter() {
        let Some(operator) = inst.opcode().reduce_operator() else {
            continue;
        };
        let pointer = inst.destination_id()?;
        if !is_shared(program, pointer)? || divergence::classify_block(program, position)?.is_some()
        {
            continue;
        }

        atomics.push(AtomicWrite {
            id,
            position,
            pointer: pointer.to_string(),
            value: inst.source_id()?.to_string(),
            result: result_of(inst)?.to_string(),
            element_type: inst.result_type()?.to_string(),
            operator,
        });
    }
    Ok(atomics)
}

/// Loads from shared memory performed by a single invocation.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for dangling references, and the accessor errors of
/// [`Instruction`] for malformed loads.
pub fn single_thread_reads(program: &Program) -> Result<Vec<GuardedRead>> {
    let mut reads = Vec::new();
    for (position, id, inst, guard) in shared_loads(program)? {
        let Some(guard) = guard else {
            continue;
        };
        let result = result_of(inst)?;
        reads.push(GuardedRead {
            id,
            position,
            pointer: inst.source_id()?.to_string(),
            result: result.to_string(),
            element_type: defuse::memory_element_type(program, result)?.to_string(),
            thread: guard.thread,
            branch: guard.branch,
        });
    }
    Ok(reads)
}

/// Runs all four detectors over the current program state.
///
/// With `parallel` set the scans run on the rayon pool; otherwise they run in sequence. The
/// results are identical either way.
///
/// # Errors
///
/// The first error reported by any detector.
pub fn detect(program: &Program, parallel: bool) -> Result<Candidates> {
    let ((writes, reads), (atomics, guarded_reads)) = if parallel {
        rayon::join(
            || {
                rayon::join(
                    || single_thread_writes(program),
                    || all_thread_reads(program),
                )
            },
            || {
                rayon::join(
                    || all_thread_atomics(program),
                    || single_thread_reads(program),
                )
            },
        )
    } else {
        (
            (single_thread_writes(program), all_thread_reads(program)),
            (all_thread_atomics(program), single_thread_reads(program)),
        )
    };

    let candidates = Candidates {
        writes: writes?,
        reads: reads?,
        atomics: atomics?,
        guarded_reads: guarded_reads?,
    };
    debug!(
        "candidates: {} writes, {} reads, {} atomics, {} guarded reads",
        candidates.writes.len(),
        candidates.reads.len(),
        candidates.atomics.len(),
        candidates.guarded_reads.len()
    );
    Ok(candidates)
}
