//! Broadcast rewrite.
//!
//! Replaces the "one invocation writes, everyone reads" shared-memory idiom with a subgroup
//! broadcast:
//!
//! ```text
//! Before:                                     After:
//!   %17 = OpLabel                               %17 = OpLabel
//!         OpStore %value %uint_7                      ; NOP
//!         OpBranch %18                                OpBranch %18
//!   %18 = OpLabel                               %18 = OpLabel
//!         OpControlBarrier ...                        OpControlBarrier ...
//!   %29 = OpLoad %uint %value                   %29 = OpGroupNonUniformBroadcast %uint %uint_3 %uint_7 %uint_0
//! ```
//!
//! The write must precede the read. A value defined outside the guarded block is used where
//! it is. A value loaded inside the guarded block moves right in front of the broadcast,
//! together with an access chain feeding it from the same block, so the operand is defined
//! where it is used. If such a load (or its chain) has another use, or the value is computed
//! by anything but a load, the pairing is left alone with a warning.

use log::{debug, info, warn};

use crate::{
    analysis::defuse,
    assembly::{Instruction, Opcode},
    program::{InstId, Program},
    transform::{
        context::TransformContext,
        events::EventKind,
        pass::TransformPass,
        patterns::{self, Candidates, SharedRead, SharedWrite},
        rewriter::{Rewriter, GROUP_NON_UNIFORM_BALLOT},
        TransformConfig,
    },
    Result,
};

/// A read together with the writes it is paired with.
#[derive(Debug)]
struct Pairing<'a> {
    read: &'a SharedRead,
    /// The latest write preceding the read; supplies the broadcast value.
    source: &'a SharedWrite,
    /// Every write preceding the read.
    writes: Vec<InstId>,
}

/// Pairs each all-thread read with the single-thread writes to the same variable that precede
/// it.
fn find_pairings(candidates: &Candidates) -> Vec<Pairing<'_>> {
    candidates
        .reads
        .iter()
        .filter_map(|read| {
            let matched: Vec<&SharedWrite> = candidates
                .writes
                .iter()
                .filter(|write| write.pointer == read.pointer && write.position < read.position)
                .collect();
            let source = *matched.iter().max_by_key(|write| write.position)?;

            Some(Pairing {
                read,
                source,
                writes: matched.iter().map(|write| write.id).collect(),
            })
        })
        .collect()
}

/// Where the broadcast value is defined, relative to the guarded write supplying it.
#[derive(Debug, PartialEq, Eq)]
enum ValueSource {
    /// Defined outside the guarded block; already visible to the broadcast.
    InPlace,
    /// Loaded inside the guarded block and used nowhere else. The load, and an access chain
    /// feeding it from the same block, move in front of the broadcast.
    Guarded { load: InstId, chain: Option<InstId> },
    /// Defined inside the guarded block in a way that cannot move.
    Pinned(String),
}

/// Locates the definition of the value written by `pairing.source`.
fn value_source(program: &Program, pairing: &Pairing<'_>) -> Result<ValueSource> {
    let value = &pairing.source.value;
    let Some((load_position, load)) = defuse::find_by_result_id(program, value) else {
        return Ok(ValueSource::InPlace);
    };
    let block = program.block_leader(program.position_of(pairing.source.id)?);
    if program.block_leader(load_position) != block {
        return Ok(ValueSource::InPlace);
    }
    if load.opcode() != Opcode::Load {
        return Ok(ValueSource::Pinned(format!(
            "{value} is computed by {} inside the guarded block",
            load.mnemonic()
        )));
    }

    let writes = pairing
        .writes
        .iter()
        .map(|&write| program.position_of(write))
        .collect::<Result<Vec<usize>>>()?;
    if let Some(other) = defuse::find_uses(program, value)
        .into_iter()
        .find(|position| !writes.contains(position))
    {
        return Ok(ValueSource::Pinned(format!(
            "{value} is also used at line {other}"
        )));
    }

    let pointer_id = load.source_id()?;
    let mut chain = None;
    if let Some((chain_position, pointer)) = defuse::find_by_result_id(program, pointer_id) {
        if pointer.opcode().is_access_chain() && program.block_leader(chain_position) == block {
            if let Some(other) = defuse::find_uses(program, pointer_id)
                .into_iter()
                .find(|&position| position != load_position)
            {
                return Ok(ValueSource::Pinned(format!(
                    "{pointer_id} is also used at line {other}"
                )));
            }
            chain = program.id_at(chain_position);
        }
    }

    Ok(ValueSource::Guarded {
        load: defuse::resolve_handle(program, value)?,
        chain,
    })
}

/// Rewrites guarded shared-memory writes read back by every invocation into
/// `OpGroupNonUniformBroadcast`.
#[derive(Debug, Default)]
pub struct BroadcastPass;

impl BroadcastPass {
    /// Creates a new broadcast pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn skip(&self, ctx: &TransformContext, read: &SharedRead, reason: &str) {
        let message = format!("{} left as is: {reason}", read.result);
        warn!("{}: {message}", self.name());
        ctx.events
            .record(EventKind::Warning)
            .at(read.position)
            .pass(self.name())
            .message(message);
    }

    /// Rewrites one pairing. Returns false, without editing, when the value cannot be made
    /// visible to the broadcast.
    fn rewrite(
        &self,
        rewriter: &mut Rewriter<'_, '_>,
        ctx: &TransformContext,
        pairing: &Pairing<'_>,
        scope: &str,
    ) -> Result<bool> {
        let (read, source) = (pairing.read, pairing.source);
        let value = match value_source(rewriter.program(), pairing)? {
            ValueSource::Pinned(reason) => {
                self.skip(ctx, read, &reason);
                return Ok(false);
            }
            value => value,
        };
        debug!(
            "{}: {} <- {} via {} (thread {})",
            self.name(),
            read.result,
            source.value,
            read.pointer,
            source.thread
        );

        for &write in &pairing.writes {
            rewriter.disable(write)?;
        }

        rewriter.replace(
            read.id,
            Instruction::broadcast(
                &read.result,
                &read.element_type,
                scope,
                &source.value,
                &source.thread,
            ),
            EventKind::BroadcastInserted,
        )?;

        if let ValueSource::Guarded { load, chain } = value {
            let load = rewriter.relocate_before(load, read.id)?;
            if let Some(chain) = chain {
                rewriter.relocate_before(chain, load)?;
            }
        }
        Ok(true)
    }
}

impl TransformPass for BroadcastPass {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn description(&self) -> &'static str {
        "Replaces single-thread shared writes read by all threads with a subgroup broadcast"
    }

    fn is_enabled(&self, config: &TransformConfig) -> bool {
        config.broadcast
    }

    fn run(&self, program: &mut Program, ctx: &TransformContext) -> Result<bool> {
        let candidates = patterns::detect(program, ctx.config.parallel_detection)?;
        let pairings = find_pairings(&candidates);
        if pairings.is_empty() {
            return Ok(false);
        }

        let scope = ctx.scope_operand();
        let mut rewriter = Rewriter::new(program, ctx, self.name());
        let mut inserted = 0;
        for pairing in &pairings {
            if self.rewrite(&mut rewriter, ctx, pairing, &scope)? {
                inserted += 1;
            }
        }
        if inserted == 0 {
            return Ok(false);
        }
        let declarations = rewriter.declare_subgroup_support(GROUP_NON_UNIFORM_BALLOT)?;

        info!(
            "{}: {} broadcast(s) inserted, {} declaration(s) added",
            self.name(),
            inserted,
            declarations
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{
        position_of_text, BROADCAST_LOAD_SAMPLE, BROADCAST_SAMPLE, BROADCAST_SHARED_LOAD_SAMPLE,
        DOUBLE_BROADCAST_SAMPLE, MISORDERED_SAMPLE,
    };

    fn run(text: &str) -> (Program, TransformContext, bool) {
        let mut program = Program::parse(text).unwrap();
        let ctx = TransformContext::new(TransformConfig::default());
        let changed = BroadcastPass::new().run(&mut program, &ctx).unwrap();
        (program, ctx, changed)
    }

    #[test]
    fn constant_is_broadcast() {
        let (program, ctx, changed) = run(BROADCAST_SAMPLE);
        assert!(changed);

        let broadcast = position_of_text(
            &program,
            "%29 = OpGroupNonUniformBroadcast %uint %uint_3 %uint_7 %uint_0",
        );
        assert!(!program.to_string().contains("OpStore %value"));
        assert!(program
            .at(broadcast + 1)
            .is_some_and(|inst| inst.to_string().starts_with("%31 = OpAccessChain")));

        assert_eq!(ctx.events.count_kind(EventKind::BroadcastInserted), 1);
        assert_eq!(ctx.events.count_kind(EventKind::InstructionDisabled), 1);
        assert_eq!(ctx.events.count_kind(EventKind::DeclarationAppended), 3);
        assert!(!ctx.events.has(EventKind::InstructionRelocated));
    }

    #[test]
    fn loaded_value_moves_before_broadcast() {
        let (program, ctx, changed) = run(BROADCAST_LOAD_SAMPLE);
        assert!(changed);

        let chain = position_of_text(&program, "%25 = OpAccessChain %_ptr_Uniform_uint %_ %int_0 %int_5");
        let load = position_of_text(&program, "%26 = OpLoad %uint %25");
        let broadcast = position_of_text(
            &program,
            "%32 = OpGroupNonUniformBroadcast %uint %uint_3 %26 %uint_0",
        );

        assert_eq!(load, chain + 1);
        assert_eq!(broadcast, load + 1);
        assert_eq!(program.block_leader(chain), program.block_leader(broadcast));
        assert_eq!(ctx.events.count_kind(EventKind::InstructionRelocated), 2);
    }

    #[test]
    fn value_loaded_before_guard_stays_in_place() {
        let (program, ctx, changed) = run(BROADCAST_SHARED_LOAD_SAMPLE);
        assert!(changed);

        let entry = position_of_text(&program, "%5 = OpLabel");
        let load = position_of_text(&program, "%26 = OpLoad %uint %25");
        let other_use = position_of_text(&program, "%36 = OpIAdd %uint %14 %26");
        let broadcast = position_of_text(
            &program,
            "%32 = OpGroupNonUniformBroadcast %uint %uint_3 %26 %uint_0",
        );

        assert_eq!(program.block_leader(load), Some(entry));
        assert!(load < other_use && other_use < broadcast);
        assert!(!ctx.events.has(EventKind::InstructionRelocated));
        assert_eq!(ctx.events.count_kind(EventKind::InstructionDisabled), 1);
    }

    #[test]
    fn guarded_value_with_other_use_is_skipped() {
        let text = BROADCAST_LOAD_SAMPLE.replace(
            "               OpStore %value %26\n",
            "               OpStore %value %26\n           %35 = OpIAdd %uint %26 %uint_2\n",
        );
        assert_ne!(text, BROADCAST_LOAD_SAMPLE);

        let (program, ctx, changed) = run(&text);
        assert!(!changed);
        assert_eq!(program.to_string(), text);
        assert_eq!(ctx.events.warnings().count(), 1);
        assert!(ctx
            .events
            .warnings()
            .all(|event| event.message.starts_with("%32 left as is: %26 is also used")));
    }

    #[test]
    fn guarded_chain_with_other_use_is_skipped() {
        let text = BROADCAST_LOAD_SAMPLE.replace(
            "               OpStore %value %26\n",
            "               OpStore %value %26\n               OpStore %25 %uint_2\n",
        );

        let (program, ctx, changed) = run(&text);
        assert!(!changed);
        assert_eq!(program.to_string(), text);
        assert!(ctx
            .events
            .warnings()
            .any(|event| event.message.contains("%25 is also used")));
    }

    #[test]
    fn computed_guarded_value_is_skipped() {
        let text = BROADCAST_LOAD_SAMPLE.replace(
            "               OpStore %value %26\n",
            "           %35 = OpIAdd %uint %26 %uint_2\n               OpStore %value %35\n",
        );

        let (program, ctx, changed) = run(&text);
        assert!(!changed);
        assert_eq!(program.to_string(), text);
        assert!(ctx
            .events
            .warnings()
            .any(|event| event.message.contains("computed by OpIAdd")));
    }

    #[test]
    fn declarations_are_shared_between_broadcasts() {
        let (program, ctx, changed) = run(DOUBLE_BROADCAST_SAMPLE);
        assert!(changed);

        position_of_text(&program, "%31 = OpGroupNonUniformBroadcast %uint %uint_3 %uint_7 %uint_0");
        position_of_text(&program, "%32 = OpGroupNonUniformBroadcast %uint %uint_3 %uint_9 %uint_0");
        assert_eq!(ctx.events.count_kind(EventKind::BroadcastInserted), 2);
        assert_eq!(ctx.events.count_kind(EventKind::DeclarationAppended), 3);
        assert_eq!(
            program.len(),
            Program::parse(DOUBLE_BROADCAST_SAMPLE).unwrap().len() + 3
        );
    }

    #[test]
    fn write_after_read_is_not_paired() {
        let (program, ctx, changed) = run(MISORDERED_SAMPLE);
        assert!(!changed);
        assert_eq!(program.to_string(), MISORDERED_SAMPLE);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn latest_write_supplies_value() {
        let text = "\
OpCapability Shader
OpDecorate %tid BuiltIn LocalInvocationIndex
%uint = OpTypeInt 32 0
%bool = OpTypeBool
%uint_0 = OpConstant %uint 0
%uint_1 = OpConstant %uint 1
%uint_2 = OpConstant %uint 2
%_ptr_Input_uint = OpTypePointer Input %uint
%_ptr_Workgroup_uint = OpTypePointer Workgroup %uint
%tid = OpVariable %_ptr_Input_uint Input
%shared = OpVariable %_ptr_Workgroup_uint Workgroup
%5 = OpLabel
%6 = OpLoad %uint %tid
%7 = OpIEqual %bool %6 %uint_0
OpBranchConditional %7 %8 %9
%8 = OpLabel
OpStore %shared %uint_1
OpStore %shared %uint_2
OpBranch %9
%9 = OpLabel
%10 = OpLoad %uint %shared
OpReturn
";
        let (program, ctx, changed) = run(text);
        assert!(changed);
        position_of_text(&program, "%10 = OpGroupNonUniformBroadcast %uint %uint_3 %uint_2 %uint_0");
        assert_eq!(ctx.events.count_kind(EventKind::InstructionDisabled), 2);
    }
}
