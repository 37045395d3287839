//! Basic-block leader computation.
//!
//! Blocks are never materialized. A block is the half-open range between two consecutive
//! leaders, and the block containing a position is found by locating the greatest leader not
//! after it.
//!
//! Leader rules:
//!
//! - position 0 is always a leader
//! - after an `OpBranch`, `OpBranchConditional` or `OpSwitch` at `n`, position `n + 1` and the
//!   position of every target label are leaders
//! - after a block terminator (`OpReturn`, `OpKill`, ...) or a barrier at `n`, position `n + 1`
//!   is a leader
//!
//! Barriers end a block here even though SPIR-V does not treat them as terminators: code after a
//! barrier observes every write made before it, which is what the pattern detectors depend on.

use rustc_hash::FxHashMap;

use crate::{
    assembly::{Instruction, Opcode},
    program::Program,
    Error, Result,
};

/// Computes the sorted, deduplicated leader positions of an instruction sequence.
///
/// # Errors
///
/// [`crate::Error::LabelNotFound`] if a branch targets a label that does not exist, and
/// [`crate::Error::MissingOperand`] for a branch without targets.
///
/// # Examples
///
/// ```rust
/// use spvgroup::{analysis::cfg::compute_leaders, assembly::Instruction};
///
/// let lines = [
///     "%5 = OpLabel",
///     "OpBranchConditional %16 %17 %18",
///     "%17 = OpLabel",
///     "OpBranch %18",
///     "%18 = OpLabel",
///     "OpReturn",
/// ];
/// let instructions = lines
///     .iter()
///     .map(|line| Instruction::parse(line))
///     .collect::<Result<Vec<_>, _>>()?;
/// let refs: Vec<&Instruction> = instructions.iter().collect();
///
/// assert_eq!(compute_leaders(&refs)?, vec![0, 2, 4]);
/// # Ok::<(), spvgroup::Error>(())
/// ```
pub fn compute_leaders(instructions: &[&Instruction]) -> Result<Vec<usize>> {
    let labels: FxHashMap<&str, usize> = instructions
        .iter()
        .enumerate()
        .filter(|(_, inst)| inst.is_label())
        .filter_map(|(position, inst)| inst.result_id().map(|id| (id, position)))
        .collect();

    let mut leaders = vec![false; instructions.len()];
    if let Some(first) = leaders.first_mut() {
        *first = true;
    }

    for (position, inst) in instructions.iter().enumerate() {
        let opcode = inst.opcode();
        if !opcode.affects_control_flow() {
            continue;
        }

        if let Some(next) = leaders.get_mut(position + 1) {
            *next = true;
        }

        if matches!(
            opcode,
            Opcode::Branch | Opcode::BranchConditional | Opcode::Switch
        ) {
            for target in inst.successor_labels()? {
                let label = labels
                    .get(target)
                    .copied()
                    .ok_or_else(|| Error::LabelNotFound(target.to_string()))?;
                leaders[label] = true;
            }
        }
    }

    Ok(leaders
        .iter()
        .enumerate()
        .filter_map(|(position, is_leader)| is_leader.then_some(position))
        .collect())
}

/// Position of the `OpLabel` defining `label`, by linear scan.
///
/// # Errors
///
/// [`crate::Error::LabelNotFound`] if no such label exists.
pub fn find_label(instructions: &[&Instruction], label: &str) -> Result<usize> {
    instructions
        .iter()
        .position(|inst| inst.is_label() && inst.result_id() == Some(label))
        .ok_or_else(|| Error::LabelNotFound(label.to_string()))
}

/// The leader position and instruction of the block containing `position`.
///
/// # Errors
///
/// [`crate::Error::Malformed`] if `position` is outside the program.
pub fn find_block_leader(program: &Program, position: usize) -> Result<(usize, &Instruction)> {
    program
        .block_leader(position)
        .and_then(|leader| program.at(leader).map(|inst| (leader, inst)))
        .ok_or_else(|| {
            malformed_error!(
                "Position {} is outside a {} line program",
                position,
                program.len()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::BROADCAST_SAMPLE;

    fn parse_all(lines: &[&str]) -> Vec<Instruction> {
        lines
            .iter()
            .map(|line| Instruction::parse(line).unwrap())
            .collect()
    }

    #[test]
    fn straight_line_has_single_leader() {
        let insts = parse_all(&["%1 = OpLabel", "%2 = OpLoad %uint %x", "OpReturn"]);
        let refs: Vec<&Instruction> = insts.iter().collect();

        assert_eq!(compute_leaders(&refs).unwrap(), vec![0]);
    }

    #[test]
    fn barrier_and_return_split_blocks() {
        let insts = parse_all(&[
            "%1 = OpLabel",
            "OpStore %x %c",
            "OpControlBarrier %uint_2 %uint_2 %uint_264",
            "%2 = OpLoad %uint %x",
            "OpMemoryBarrier %uint_1 %uint_264",
            "OpReturn",
            "OpFunctionEnd",
        ]);
        let refs: Vec<&Instruction> = insts.iter().collect();

        assert_eq!(compute_leaders(&refs).unwrap(), vec![0, 3, 5, 6]);
    }

    #[test]
    fn switch_targets_are_leaders() {
        let insts = parse_all(&[
            "%1 = OpLabel",
            "OpSwitch %sel %d 0 %a 1 %b",
            "%a = OpLabel",
            "OpBranch %d",
            "%b = OpLabel",
            "OpBranch %d",
            "%d = OpLabel",
            "OpReturn",
        ]);
        let refs: Vec<&Instruction> = insts.iter().collect();

        assert_eq!(compute_leaders(&refs).unwrap(), vec![0, 2, 4, 6]);
    }

    #[test]
    fn missing_branch_target_fails() {
        let insts = parse_all(&["%1 = OpLabel", "OpBranchConditional %c %1 %9"]);
        let refs: Vec<&Instruction> = insts.iter().collect();

        match compute_leaders(&refs) {
            Err(Error::LabelNotFound(label)) => assert_eq!(label, "%9"),
            other => panic!("Expected LabelNotFound, got {other:?}"),
        }
        assert!(matches!(
            find_label(&refs, "%9"),
            Err(Error::LabelNotFound(_))
        ));
        assert_eq!(find_label(&refs, "%1").unwrap(), 0);
    }

    #[test]
    fn empty_sequence_has_no_leaders() {
        assert!(compute_leaders(&[]).unwrap().is_empty());
    }

    #[test]
    fn block_leader_of_guarded_store() {
        let program = Program::parse(BROADCAST_SAMPLE).unwrap();
        let (position, store) = program
            .iter()
            .find(|(_, _, inst)| inst.to_string() == "OpStore %value %uint_7")
            .map(|(position, _, inst)| (position, inst.clone()))
            .unwrap();

        let (leader, label) = find_block_leader(&program, position).unwrap();
        assert!(leader < position);
        assert!(label.is_label(), "store {store} should start in a labelled block");
        assert_eq!(label.result_id(), Some("%17"));

        assert!(find_block_leader(&program, program.len()).is_err());
    }
}
