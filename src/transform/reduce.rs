//! Reduce rewrite.
//!
//! Replaces the "initialise, every invocation updates atomically, one invocation reads the
//! result" shared-memory idiom with a subgroup reduction:
//!
//! ```text
//! Before:                                       After:
//!   %17 = OpLabel                                 %17 = OpLabel
//!         OpStore %total %uint_0                        ; NOP
//!   ...                                           ...
//!   %32 = OpAtomicIAdd %uint %total ... %31             ; NOP
//!   ...                                           ...
//!   %36 = OpLabel                                 %36 = OpLabel
//!   %40 = OpAccessChain %_ptr_Uniform_uint ...          ; NOP
//!   %41 = OpLoad %uint %total                           ; NOP
//!         OpStore %40 %41                               ; NOP
//!         OpBranch %37                                  OpBranch %37
//!   %37 = OpLabel                                 %37 = OpLabel
//!                                                 %41 = OpGroupNonUniformIAdd %uint %uint_3 Reduce %31
//!                                                 %40 = OpAccessChain %_ptr_Uniform_uint ...
//!                                                       OpStore %40 %41
//! ```
//!
//! The reduction must run on every invocation, so it is placed at the head of the block the
//! read's guard falls through to, and the store consuming the result moves after it.

use log::{debug, info, warn};

use crate::{
    analysis::defuse,
    assembly::Instruction,
    program::{InstId, Program},
    transform::{
        context::TransformContext,
        events::EventKind,
        pass::TransformPass,
        patterns::{self, AtomicWrite, Candidates, GuardedRead, SharedWrite},
        rewriter::{Rewriter, GROUP_NON_UNIFORM_ARITHMETIC},
        TransformConfig,
    },
    Result,
};

/// A matched (writes, atomic, read) chain.
#[derive(Debug)]
struct Chain<'a> {
    writes: Vec<&'a SharedWrite>,
    atomic: &'a AtomicWrite,
    read: &'a GuardedRead,
    consumer: Option<Consumer>,
}

/// Store consuming the reduced value, and an access chain feeding its pointer from the read's
/// block.
#[derive(Debug)]
struct Consumer {
    store: InstId,
    chain: Option<InstId>,
}

/// Rewrites atomically accumulated shared variables into `OpGroupNonUniform*` reductions.
#[derive(Debug, Default)]
pub struct ReducePass;

impl ReducePass {
    /// Creates a new reduce pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn skip(&self, ctx: &TransformContext, read: &GuardedRead, reason: &str) {
        let message = format!("{} left as is: {reason}", read.result);
        warn!("{}: {message}", self.name());
        ctx.events
            .record(EventKind::Warning)
            .at(read.position)
            .pass(self.name())
            .message(message);
    }

    /// Matches every single-thread read with its initialising writes and exactly one atomic.
    ///
    /// The read's result may only feed one store in the read's own block, which moves along
    /// with the reduction; any other use is left behind and the chain is skipped.
    fn find_chains<'a>(
        &self,
        program: &Program,
        candidates: &'a Candidates,
        ctx: &TransformContext,
    ) -> Result<Vec<Chain<'a>>> {
        let mut chains = Vec::new();
        for read in &candidates.guarded_reads {
            let writes: Vec<&SharedWrite> = candidates
                .writes
                .iter()
                .filter(|write| {
                    write.pointer == read.pointer
                        && write.thread == read.thread
                        && write.element_type == read.element_type
                        && write.position < read.position
                })
                .collect();
            let Some(first_write) = writes.iter().map(|write| write.position).min() else {
                continue;
            };

            let atomics: Vec<&AtomicWrite> = candidates
                .atomics
                .iter()
                .filter(|atomic| {
                    atomic.pointer == read.pointer
                        && first_write < atomic.position
                        && atomic.position < read.position
                })
                .collect();

            let atomic = match atomics.as_slice() {
                [] => continue,
                [atomic] => *atomic,
                _ => {
                    self.skip(
                        ctx,
                        read,
                        &format!("{} atomics update {}", atomics.len(), read.pointer),
                    );
                    continue;
                }
            };
            if !defuse::find_uses(program, &atomic.result).is_empty() {
                self.skip(ctx, read, &format!("result {} is used", atomic.result));
                continue;
            }

            let consumer = find_consumer(program, read)?;
            if let Some((id, position)) = stranded_use(program, read, consumer.as_ref())? {
                self.skip(ctx, read, &format!("{id} is also used at line {position}"));
                continue;
            }

            chains.push(Chain {
                writes,
                atomic,
                read,
                consumer,
            });
        }
        Ok(chains)
    }

    fn rewrite(
        &self,
        rewriter: &mut Rewriter<'_, '_>,
        chain: &Chain<'_>,
        scope: &str,
    ) -> Result<()> {
        let (atomic, read) = (chain.atomic, chain.read);
        debug!(
            "{}: {} = {} of {} over {}",
            self.name(),
            read.result,
            atomic.operator,
            atomic.value,
            read.pointer
        );

        let merge = merge_label(rewriter.program(), read.branch)?;

        for write in &chain.writes {
            rewriter.disable(write.id)?;
        }
        rewriter.disable(atomic.id)?;
        rewriter.disable(read.id)?;

        let reduce = rewriter.insert_after(
            merge,
            Instruction::reduce(
                &read.result,
                atomic.operator,
                &read.element_type,
                scope,
                &atomic.value,
            ),
            EventKind::ReduceInserted,
        )?;

        if let Some(consumer) = &chain.consumer {
            let mut anchor = reduce;
            if let Some(chain) = consumer.chain {
                anchor = rewriter.relocate_after(chain, anchor)?;
            }
            rewriter.relocate_after(consumer.store, anchor)?;
        }
        Ok(())
    }
}

/// The false target of the guarding branch: the first block every invocation executes again.
fn merge_label(program: &Program, branch: InstId) -> Result<InstId> {
    let (_, merge) = program.get(branch)?.branch_targets()?;
    defuse::resolve_handle(program, merge)
}

/// The store of the read's result, when it sits in the read's block.
fn find_consumer(program: &Program, read: &GuardedRead) -> Result<Option<Consumer>> {
    let Some((store_position, store)) = defuse::find_store(program, &read.result) else {
        return Ok(None);
    };
    let read_block = program.block_leader(program.position_of(read.id)?);
    if program.block_leader(store_position) != read_block {
        return Ok(None);
    }
    let Some(store_id) = program.id_at(store_position) else {
        return Ok(None);
    };

    let chain = match defuse::find_by_result_id(program, store.destination_id()?) {
        Some((position, pointer))
            if pointer.opcode().is_access_chain() && program.block_leader(position) == read_block =>
        {
            program.id_at(position)
        }
        _ => None,
    };

    Ok(Some(Consumer {
        store: store_id,
        chain,
    }))
}

/// First use of the read's result, or of the consumer's relocated pointer, other than the
/// consumer store itself.
fn stranded_use(
    program: &Program,
    read: &GuardedRead,
    consumer: Option<&Consumer>,
) -> Result<Option<(String, usize)>> {
    let store = consumer
        .map(|consumer| program.position_of(consumer.store))
        .transpose()?;
    let other_use = |id: &str| {
        defuse::find_uses(program, id)
            .into_iter()
            .find(|&position| Some(position) != store)
            .map(|position| (id.to_string(), position))
    };

    if let Some(found) = other_use(&read.result) {
        return Ok(Some(found));
    }
    let Some(chain) = consumer.and_then(|consumer| consumer.chain) else {
        return Ok(None);
    };
    Ok(program.get(chain)?.result_id().and_then(other_use))
}

impl TransformPass for ReducePass {
    fn name(&self) -> &'static str {
        "reduce"
    }

    fn description(&self) -> &'static str {
        "Replaces atomically accumulated shared variables with a subgroup reduction"
    }

    fn is_enabled(&self, config: &TransformConfig) -> bool {
        config.reduce
    }

    fn run(&self, program: &mut Program, ctx: &TransformContext) -> Result<bool> {
        let candidates = patterns::detect(program, ctx.config.parallel_detection)?;
        let chains = self.find_chains(program, &candidates, ctx)?;
        if chains.is_empty() {
            return Ok(false);
        }

        let scope = ctx.scope_operand();
        let mut rewriter = Rewriter::new(program, ctx, self.name());
        for chain in &chains {
            self.rewrite(&mut rewriter, chain, &scope)?;
        }
        let declarations = rewriter.declare_subgroup_support(GROUP_NON_UNIFORM_ARITHMETIC)?;

        info!(
            "{}: {} reduction(s) inserted, {} declaration(s) added",
            self.name(),
            chains.len(),
            declarations
        );
        Ok(true)
    }
}
