//! Event-recording edit operations shared by the rewrite passes.
//!
//! [`Rewriter`] wraps the structural edits of [`Program`] so that every change a pass makes is
//! logged, both through `log::debug!` and as an [`EventKind`] in the run's event log.

use log::debug;

use crate::{
    assembly::Instruction,
    program::{InstId, Program},
    transform::{
        config::SUBGROUP_SCOPE,
        context::TransformContext,
        events::EventKind,
    },
    Result,
};

/// Capability required by every `OpGroupNonUniform*` instruction.
pub const GROUP_NON_UNIFORM: &str = "GroupNonUniform";

/// Capability required by `OpGroupNonUniformBroadcast`.
pub const GROUP_NON_UNIFORM_BALLOT: &str = "GroupNonUniformBallot";

/// Capability required by the arithmetic and bitwise subgroup reductions.
pub const GROUP_NON_UNIFORM_ARITHMETIC: &str = "GroupNonUniformArithmetic";

/// Scalar type of the scope constant, without the `%`.
const SCOPE_TYPE: &str = "uint";

/// A pass's handle on the program being rewritten.
pub struct Rewriter<'p, 'c> {
    program: &'p mut Program,
    ctx: &'c TransformContext,
    pass: &'static str,
}

impl<'p, 'c> Rewriter<'p, 'c> {
    /// Wraps `program` for edits attributed to `pass`.
    pub fn new(program: &'p mut Program, ctx: &'c TransformContext, pass: &'static str) -> Self {
        Self { program, ctx, pass }
    }

    /// The program in its current state.
    #[must_use]
    pub fn program(&self) -> &Program {
        &*self.program
    }

    fn record(&self, kind: EventKind, id: InstId) -> Result<()> {
        let position = self.program.position_of(id)?;
        let text = self.program.get(id)?.to_string();
        debug!("{}: {kind} {position:3} | {text}", self.pass);
        self.ctx
            .events
            .record(kind)
            .at(position)
            .pass(self.pass)
            .message(text);
        Ok(())
    }

    /// Replaces a line with `; NOP`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidHandle`] for a foreign handle.
    pub fn disable(&mut self, id: InstId) -> Result<()> {
        if self.program.get(id)?.is_nop() {
            return Ok(());
        }
        self.record(EventKind::InstructionDisabled, id)?;
        self.program.disable(id)
    }

    /// Replaces a line in place, recording the change as `kind`.
    ///
    /// # Errors
    ///
    /// See [`Program::replace`].
    pub fn replace(&mut self, id: InstId, inst: Instruction, kind: EventKind) -> Result<()> {
        self.program.replace(id, inst)?;
        self.record(kind, id)
    }

    /// Inserts a new line after `anchor`, recording the change as `kind`.
    ///
    /// # Errors
    ///
    /// See [`Program::insert_after`].
    pub fn insert_after(
        &mut self,
        anchor: InstId,
        inst: Instruction,
        kind: EventKind,
    ) -> Result<InstId> {
        let id = self.program.insert_after(anchor, inst)?;
        self.record(kind, id)?;
        Ok(id)
    }

    /// Moves a line to just before `anchor`.
    ///
    /// # Errors
    ///
    /// See [`Program::relocate_before`].
    pub fn relocate_before(&mut self, id: InstId, anchor: InstId) -> Result<InstId> {
        let moved = self.program.relocate_before(id, anchor)?;
        self.record(EventKind::InstructionRelocated, moved)?;
        Ok(moved)
    }

    /// Moves a line to just after `anchor`.
    ///
    /// # Errors
    ///
    /// See [`Program::relocate_after`].
    pub fn relocate_after(&mut self, id: InstId, anchor: InstId) -> Result<InstId> {
        let moved = self.program.relocate_after(id, anchor)?;
        self.record(EventKind::InstructionRelocated, moved)?;
        Ok(moved)
    }

    fn append(&mut self, inst: Instruction) -> Result<Option<InstId>> {
        let appended = self.program.append_declaration(inst)?;
        if let Some(id) = appended {
            self.record(EventKind::DeclarationAppended, id)?;
        }
        Ok(appended)
    }

    /// Declares what a subgroup collective needs: the `GroupNonUniform` capability, the
    /// operation-specific `capability`, and the scope constant.
    ///
    /// Each declaration is added at most once per program. When the scope constant is added
    /// and `%uint` is not yet declared, `%uint = OpTypeInt 32 0` is inserted right before it.
    ///
    /// Returns the number of lines added.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Malformed`] if the program has no place for a declaration.
    pub fn declare_subgroup_support(&mut self, capability: &str) -> Result<usize> {
        let mut added = 0;
        for name in [GROUP_NON_UNIFORM, capability] {
            if self.append(Instruction::capability(name))?.is_some() {
                added += 1;
            }
        }

        let constant = Instruction::constant(
            &self.ctx.config.scope_constant,
            SCOPE_TYPE,
            SUBGROUP_SCOPE,
        );
        if let Some(constant) = self.append(constant)? {
            added += 1;
            let scope_type = format!("%{SCOPE_TYPE}");
            if self.program.definition(&scope_type).is_none() {
                let id = self
                    .program
                    .insert_before(constant, Instruction::int_type(SCOPE_TYPE, 32, false))?;
                self.record(EventKind::DeclarationAppended, id)?;
                added += 1;
            }
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformConfig;

    #[test]
    fn declarations_are_added_once() {
        let text = "OpCapability Shader\n%uint = OpTypeInt 32 0\n%uint_0 = OpConstant %uint 0\n";
        let mut program = Program::parse(text).unwrap();
        let ctx = TransformContext::new(TransformConfig::default());

        let mut rewriter = Rewriter::new(&mut program, &ctx, "test");
        assert_eq!(
            rewriter
                .declare_subgroup_support(GROUP_NON_UNIFORM_BALLOT)
                .unwrap(),
            3
        );
        assert_eq!(
            rewriter
                .declare_subgroup_support(GROUP_NON_UNIFORM_BALLOT)
                .unwrap(),
            0
        );
        assert_eq!(
            rewriter
                .declare_subgroup_support(GROUP_NON_UNIFORM_ARITHMETIC)
                .unwrap(),
            1
        );

        assert_eq!(
            program.to_string(),
            "OpCapability Shader\nOpCapability GroupNonUniform\nOpCapability GroupNonUniformBallot\n\
             OpCapability GroupNonUniformArithmetic\n%uint = OpTypeInt 32 0\n\
             %uint_0 = OpConstant %uint 0\n%uint_3 = OpConstant %uint 3\n"
        );
        assert_eq!(ctx.events.count_kind(EventKind::DeclarationAppended), 4);
    }

    #[test]
    fn missing_uint_type_is_declared_before_constant() {
        let text = "OpCapability Shader\n%int = OpTypeInt 32 1\n%int_0 = OpConstant %int 0\n";
        let mut program = Program::parse(text).unwrap();
        let ctx = TransformContext::new(TransformConfig::default());

        let added = Rewriter::new(&mut program, &ctx, "test")
            .declare_subgroup_support(GROUP_NON_UNIFORM_ARITHMETIC)
            .unwrap();

        assert_eq!(added, 4);
        assert!(program.to_string().ends_with(
            "%int_0 = OpConstant %int 0\n%uint = OpTypeInt 32 0\n%uint_3 = OpConstant %uint 3\n"
        ));
    }

    #[test]
    fn edits_are_recorded() {
        let text = "%1 = OpLabel\n%2 = OpLoad %uint %x\nOpStore %y %2\nOpReturn\n";
        let mut program = Program::parse(text).unwrap();
        let ctx = TransformContext::new(TransformConfig::default());
        let load = program.id_at(1).unwrap();
        let store = program.id_at(2).unwrap();

        let mut rewriter = Rewriter::new(&mut program, &ctx, "test");
        rewriter.disable(store).unwrap();
        rewriter.disable(store).unwrap();
        rewriter.relocate_after(load, store).unwrap();

        assert_eq!(ctx.events.count_kind(EventKind::InstructionDisabled), 1);
        assert_eq!(ctx.events.count_kind(EventKind::InstructionRelocated), 1);
        assert_eq!(ctx.events.filter_pass("test").count(), 2);
    }
}
