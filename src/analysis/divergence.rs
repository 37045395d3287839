//! Single-thread guard detection.
//!
//! A block is *single-thread* when it can only be entered through the true edge of an
//! `OpBranchConditional` whose condition compares the invocation index against some value:
//!
//! ```text
//!   %13 = OpAccessChain %_ptr_Input_uint %gl_LocalInvocationID %uint_0
//!   %14 = OpLoad %uint %13
//!   %16 = OpIEqual %bool %14 %uint_0
//!         OpBranchConditional %16 %17 %18
//!   %17 = OpLabel            ; single-thread, thread %uint_0
//! ```
//!
//! The analysis is deliberately one level deep. Only the branch immediately controlling the
//! block's leader is inspected, so nested or compound guards classify as all-thread.

use crate::{
    analysis::{cfg, defuse},
    assembly::{Instruction, Opcode},
    program::{InstId, Program},
    Result,
};

/// Names `spirv-dis` gives the per-invocation index built-ins.
pub const INVOCATION_INDEX_NAMES: [&str; 2] = ["%gl_LocalInvocationID", "%gl_LocalInvocationIndex"];

/// `BuiltIn` decorations identifying the per-invocation index.
pub const INVOCATION_INDEX_BUILTINS: [&str; 2] = ["LocalInvocationId", "LocalInvocationIndex"];

/// Result of classifying a block as guarded for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleThread {
    /// Operand naming which invocation runs the block, e.g. `%uint_0`
    pub thread: String,
    /// The `OpBranchConditional` guarding the block
    pub branch: InstId,
}

/// Defining instruction of the condition of the branch targeting `label_id`.
///
/// Either target of the branch matches. Returns `None` when no conditional branch targets the
/// label.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] if the branch condition has no definition.
pub fn controlling_condition<'a>(
    program: &'a Program,
    label_id: &str,
) -> Result<Option<(usize, &'a Instruction)>> {
    let Some((_, branch)) = defuse::find_conditional_branch_by_target(program, label_id) else {
        return Ok(None);
    };
    defuse::resolve(program, branch.source_id()?).map(Some)
}

/// True if `variable_id` is the local invocation index built-in, either by `spirv-dis` name or
/// by its `BuiltIn` decoration.
#[must_use]
pub fn is_invocation_index_builtin(program: &Program, variable_id: &str) -> bool {
    INVOCATION_INDEX_NAMES.contains(&variable_id)
        || program.instructions().any(|inst| {
            inst.opcode() == Opcode::Decorate
                && matches!(
                    inst.operands(),
                    [target, decoration, builtin, ..]
                        if target == variable_id
                            && decoration == "BuiltIn"
                            && INVOCATION_INDEX_BUILTINS.contains(&builtin.as_str())
                )
        })
}

/// True if `value_id` is a load of the invocation index: either directly from the built-in, or
/// through an access chain based on it.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] if `value_id` or the loaded pointer has no definition.
pub fn is_thread_index_expression(program: &Program, value_id: &str) -> Result<bool> {
    let (_, value) = defuse::resolve(program, value_id)?;
    if value.opcode() != Opcode::Load {
        return Ok(false);
    }

    let pointer_id = value.source_id()?;
    let (_, pointer) = defuse::resolve(program, pointer_id)?;
    let variable_id = if pointer.opcode().is_access_chain() {
        pointer.base()?
    } else {
        pointer_id
    };

    Ok(is_invocation_index_builtin(program, variable_id))
}

/// Classifies the block containing `position`.
///
/// Returns the singled-out thread operand and the guarding branch when the block's leader is a
/// label entered through the true edge of `OpBranchConditional (OpIEqual tid X)` (operands in
/// either order), and `None` when the block executes for every invocation.
///
/// Only the true target counts. The false target is where the guarded path rejoins, so every
/// invocation reaches it; reductions are placed there for that reason. Only the branch
/// directly controlling the leader is inspected: a block behind a second, nested condition
/// classifies by that inner condition alone.
///
/// # Errors
///
/// [`crate::Error::UnresolvedId`] for dangling references in the guard, and
/// [`crate::Error::Malformed`] if `position` is outside the program.
pub fn classify_block(program: &Program, position: usize) -> Result<Option<SingleThread>> {
    let (_, leader) = cfg::find_block_leader(program, position)?;
    if !leader.is_label() {
        return Ok(None);
    }
    let Some(label) = leader.result_id() else {
        return Ok(None);
    };

    let Some((branch_position, branch)) = defuse::find_conditional_branch_by_target(program, label)
    else {
        return Ok(None);
    };
    let (on_true, _) = branch.branch_targets()?;
    if on_true != label {
        return Ok(None);
    }

    let (_, condition) = defuse::resolve(program, branch.source_id()?)?;
    if condition.opcode() != Opcode::IEqual {
        return Ok(None);
    }
    let Some((lhs, rhs)) = condition.source()?.pair() else {
        return Ok(None);
    };

    let thread = if is_thread_index_expression(program, lhs)? {
        rhs
    } else if is_thread_index_expression(program, rhs)? {
        lhs
    } else {
        return Ok(None);
    };

    let Some(branch) = program.id_at(branch_position) else {
        return Ok(None);
    };
    Ok(Some(SingleThread {
        thread: thread.to_string(),
        branch,
    }))
}
