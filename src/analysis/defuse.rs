//! Whole-program definition resolution.
//!
//! SPIR-V identifiers live in a single module-wide namespace and are defined exactly once, so
//! resolution is not flow-sensitive: an identifier resolves to the same instruction no matter
//! where it is used. Lookups by result identifier go through the program's definition index;
//! the operand-matching scans are linear.
//!
//! Every resolver is read-only. A dangling reference is reported as
//! [`crate::Error::UnresolvedId`] by the `Result`-returning resolvers and is fatal to a run.

use crate::{
    assembly::{Instruction, Opcode},
    program::{InstId, Program},
    Error, Result,
};

/// Position and instruction defining `id`, if any.
#[must_use]
pub fn find_by_result_id<'a>(program: &'a Program, id: &str) -> Option<(usize, &'a Instruction)> {
    let handle = program.definition(id)?;
    let position = program.position_of(handle).ok()?;
    program.at(position).map(|inst| (position, inst))
}

/// Like [`find_by_result_id`], failing on a dangling reference.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] if no instruction defines `id`.
pub fn resolve<'a>(program: &'a Program, id: &str) -> Result<(usize, &'a Instruction)> {
    find_by_result_id(program, id).ok_or_else(|| Error::UnresolvedId(id.to_string()))
}

/// Handle of the instruction defining `id`.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] if no instruction defines `id`.
pub fn resolve_handle(program: &Program, id: &str) -> Result<InstId> {
    program
        .definition(id)
        .ok_or_else(|| Error::UnresolvedId(id.to_string()))
}

/// First `OpStore` whose stored value is `source_id`.
#[must_use]
pub fn find_store<'a>(program: &'a Program, source_id: &str) -> Option<(usize, &'a Instruction)> {
    program
        .iter()
        .find(|(_, _, inst)| {
            inst.opcode() == Opcode::Store && inst.source_id().ok() == Some(source_id)
        })
        .map(|(position, _, inst)| (position, inst))
}

/// First `OpBranchConditional` whose condition is `condition_id`.
#[must_use]
pub fn find_conditional_branch_by_source<'a>(
    program: &'a Program,
    condition_id: &str,
) -> Option<(usize, &'a Instruction)> {
    program
        .iter()
        .find(|(_, _, inst)| {
            inst.opcode() == Opcode::BranchConditional
                && inst.source_id().ok() == Some(condition_id)
        })
        .map(|(position, _, inst)| (position, inst))
}

/// First `OpBranchConditional` with `label` as either its true or its false target.
#[must_use]
pub fn find_conditional_branch_by_target<'a>(
    program: &'a Program,
    label: &str,
) -> Option<(usize, &'a Instruction)> {
    program
        .iter()
        .find(|(_, _, inst)| {
            inst.opcode() == Opcode::BranchConditional
                && inst
                    .destination()
                    .is_ok_and(|targets| targets.contains(label))
        })
        .map(|(position, _, inst)| (position, inst))
}

const NON_USE_PREFIXES: [&str; 4] = ["OpName", "OpMemberName", "OpDecorate", "OpMemberDecorate"];

/// Positions of every instruction that uses `id` as an operand.
///
/// Debug names and decorations are not counted as uses.
#[must_use]
pub fn find_uses(program: &Program, id: &str) -> Vec<usize> {
    program
        .iter()
        .filter(|(_, _, inst)| !NON_USE_PREFIXES.contains(&inst.mnemonic()))
        .filter(|(_, _, inst)| inst.operands().iter().any(|operand| operand == id))
        .map(|(position, _, _)| position)
        .collect()
}

/// Element type of the memory a pointer refers to.
///
/// Variables are followed through their declared pointer type; access chains carry their
/// pointer type as the result type.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for a dangling reference, and
/// [`crate::Error::InvalidAccessor`] if `pointer_id` or its type is not a pointer.
pub fn pointer_element_type<'a>(program: &'a Program, pointer_id: &str) -> Result<&'a str> {
    let (_, pointer) = resolve(program, pointer_id)?;
    let type_id = if pointer.opcode().is_access_chain() {
        pointer.result_type()?
    } else {
        pointer.pointer_type_id()?
    };

    let (_, pointer_type) = resolve(program, type_id)?;
    pointer_type.pointee_type()
}

/// Element type of the memory a loaded value was read from.
///
/// Two hops: the value's defining load gives the pointer, the pointer's declared type gives the
/// pointee.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for a dangling reference, and
/// [`crate::Error::InvalidAccessor`] if `value_id` is not defined by a load.
pub fn memory_element_type<'a>(program: &'a Program, value_id: &str) -> Result<&'a str> {
    let (_, load) = resolve(program, value_id)?;
    if load.opcode() != Opcode::Load {
        return Err(Error::InvalidAccessor {
            accessor: "memory_element_type",
            opcode: load.mnemonic().to_string(),
        });
    }
    pointer_element_type(program, load.source_id()?)
}
