//! The mutable program arena.
//!
//! A [`Program`] is the ordered sequence of instructions read from one SPIR-V assembly file,
//! together with the leading and trailing whitespace of every line, an index from result
//! identifiers to their defining instruction, and the cached basic-block leader set.
//!
//! # Stable Handles
//!
//! Every line is assigned an [`InstId`] when it enters the program. Handles are never reused and
//! stay valid across insertions, so transform passes can capture handles during detection and
//! resolve their current position at the moment of each edit. Positions are only meaningful for
//! the program state they were read from.
//!
//! # Edits
//!
//! All structural changes go through a small set of operations:
//!
//! - [`Program::replace`] - swap the instruction held by a line
//! - [`Program::insert_before`] / [`Program::insert_after`] / [`Program::insert`] - add a line
//! - [`Program::relocate_before`] / [`Program::relocate_after`] - disable a line and re-insert a
//!   copy elsewhere
//! - [`Program::disable`] - replace a line with the `; NOP` placeholder
//! - [`Program::append_declaration`] - add a module-level declaration once
//!
//! Disabled lines keep their slot, so the output diffs line-by-line against the input except
//! where instructions were inserted.
//!
//! # Examples
//!
//! ```rust
//! use spvgroup::{assembly::Instruction, Program};
//!
//! let source = "       %uint = OpTypeInt 32 0\n     %uint_0 = OpConstant %uint 0\n";
//! let mut program = Program::parse(source)?;
//! assert_eq!(program.to_string(), source);
//!
//! program.append_declaration(Instruction::constant("uint_3", "uint", 3))?;
//! assert_eq!(program.len(), 3);
//! assert!(program.to_string().contains("%uint_3 = OpConstant %uint 3"));
//! # Ok::<(), spvgroup::Error>(())
//! ```

use std::fmt;

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    analysis::cfg,
    assembly::{Instruction, Opcode},
    Error, Result,
};

/// Stable identity of one line of a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(usize);

impl InstId {
    /// Raw arena index of this handle.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Line {
    id: InstId,
    indent: String,
    trailing: String,
    inst: Instruction,
}

/// An ordered, editable sequence of instructions with derived basic-block leaders.
#[derive(Debug, Clone)]
pub struct Program {
    lines: Vec<Line>,
    /// Current position of every issued handle, indexed by `InstId`
    positions: Vec<usize>,
    defs: FxHashMap<String, InstId>,
    leaders: Vec<usize>,
    trailing_newline: bool,
}

impl Program {
    /// Parses a whole SPIR-V assembly listing.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Empty`] if the text contains no non-whitespace character
    /// - [`crate::Error::DuplicateDefinition`] if a result identifier is defined twice
    /// - [`crate::Error::LabelNotFound`] if a branch targets a missing label
    /// - [`crate::Error::Malformed`] for lines that cannot be split into an instruction
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::Empty);
        }

        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);

        let mut program = Program {
            lines: Vec::new(),
            positions: Vec::new(),
            defs: FxHashMap::default(),
            leaders: Vec::new(),
            trailing_newline,
        };

        for raw in body.split('\n') {
            let content = raw.trim_start();
            let indent = &raw[..raw.len() - content.len()];
            let inst_text = content.trim_end();
            let trailing = &content[inst_text.len()..];

            let inst = Instruction::parse(inst_text)?;
            let id = program.issue(program.lines.len());
            program.define(&inst, id)?;
            program.lines.push(Line {
                id,
                indent: indent.to_string(),
                trailing: trailing.to_string(),
                inst,
            });
        }

        program.recompute_leaders()?;
        Ok(program)
    }

    fn issue(&mut self, position: usize) -> InstId {
        let id = InstId(self.positions.len());
        self.positions.push(position);
        id
    }

    fn define(&mut self, inst: &Instruction, id: InstId) -> Result<()> {
        if let Some(result) = inst.result_id() {
            match self.defs.get(result) {
                Some(existing) if *existing != id => {
                    return Err(Error::DuplicateDefinition(result.to_string()));
                }
                _ => {
                    self.defs.insert(result.to_string(), id);
                }
            }
        }
        Ok(())
    }

    fn undefine(&mut self, inst: &Instruction, id: InstId) {
        if let Some(result) = inst.result_id() {
            if self.defs.get(result) == Some(&id) {
                self.defs.remove(result);
            }
        }
    }

    fn reindex(&mut self) {
        for (position, line) in self.lines.iter().enumerate() {
            self.positions[line.id.0] = position;
        }
    }

    fn recompute_leaders(&mut self) -> Result<()> {
        let instructions: Vec<&Instruction> = self.lines.iter().map(|line| &line.inst).collect();
        self.leaders = cfg::compute_leaders(&instructions)?;
        Ok(())
    }

    /// Number of lines, including comments and disabled instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if the program holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Current position of a handle.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidHandle`] if the handle was not issued by this program.
    pub fn position_of(&self, id: InstId) -> Result<usize> {
        self.positions
            .get(id.0)
            .copied()
            .ok_or(Error::InvalidHandle(id.0))
    }

    /// The instruction currently held by a handle.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidHandle`] if the handle was not issued by this program.
    pub fn get(&self, id: InstId) -> Result<&Instruction> {
        let position = self.position_of(id)?;
        Ok(&self.lines[position].inst)
    }

    /// The instruction at a position.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<&Instruction> {
        self.lines.get(position).map(|line| &line.inst)
    }

    /// The handle of the line at a position.
    #[must_use]
    pub fn id_at(&self, position: usize) -> Option<InstId> {
        self.lines.get(position).map(|line| line.id)
    }

    /// Iterates `(position, handle, instruction)` in program order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, InstId, &Instruction)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .map(|(position, line)| (position, line.id, &line.inst))
    }

    /// Iterates the instructions in program order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.lines.iter().map(|line| &line.inst)
    }

    /// Handle of the instruction defining `result_id`.
    #[must_use]
    pub fn definition(&self, result_id: &str) -> Option<InstId> {
        self.defs.get(result_id).copied()
    }

    /// Sorted basic-block leader positions.
    #[must_use]
    pub fn leaders(&self) -> &[usize] {
        &self.leaders
    }

    /// Leader of the basic block containing `position`.
    #[must_use]
    pub fn block_leader(&self, position: usize) -> Option<usize> {
        if position >= self.lines.len() {
            return None;
        }
        let count = self.leaders.partition_point(|&leader| leader <= position);
        count.checked_sub(1).map(|index| self.leaders[index])
    }

    /// Replaces the instruction held by a line, keeping its handle and indentation.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidHandle`] for a foreign handle
    /// - [`crate::Error::DuplicateDefinition`] if the new result identifier is already defined
    ///   by another line
    /// - [`crate::Error::LabelNotFound`] if the edit creates a branch to a missing label
    pub fn replace(&mut self, id: InstId, inst: Instruction) -> Result<()> {
        let position = self.position_of(id)?;
        let old = self.lines[position].inst.clone();

        self.undefine(&old, id);
        if let Err(error) = self.define(&inst, id) {
            // Restore the previous definition before reporting
            self.define(&old, id)?;
            return Err(error);
        }

        let touches_control_flow =
            old.opcode().affects_control_flow() || inst.opcode().affects_control_flow();
        debug!("replace {position:3} | {old} => {inst}");
        self.lines[position].inst = inst;

        if touches_control_flow {
            self.recompute_leaders()?;
        }
        Ok(())
    }

    /// Replaces a line with the `; NOP` placeholder, dropping any definition it held.
    ///
    /// Disabling an already disabled line is a no-op.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidHandle`] for a foreign handle.
    pub fn disable(&mut self, id: InstId) -> Result<()> {
        let position = self.position_of(id)?;
        if self.lines[position].inst.is_nop() {
            return Ok(());
        }

        self.lines[position].trailing.clear();
        self.replace(id, Instruction::nop())
    }

    /// Inserts a new line at `position`, shifting later lines down.
    ///
    /// The new line takes the indentation of the line it displaces, or of the last line when
    /// appending at the end.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Malformed`] if `position` is past the end
    /// - [`crate::Error::DuplicateDefinition`] if the result identifier is already defined
    pub fn insert(&mut self, position: usize, inst: Instruction) -> Result<InstId> {
        let indent = self
            .lines
            .get(position)
            .or_else(|| self.lines.last())
            .map(|line| line.indent.clone())
            .unwrap_or_default();
        self.insert_with_indent(position, inst, indent)
    }

    fn insert_with_indent(
        &mut self,
        position: usize,
        inst: Instruction,
        indent: String,
    ) -> Result<InstId> {
        if position > self.lines.len() {
            return Err(malformed_error!(
                "Insert position {} is past the end of a {} line program",
                position,
                self.lines.len()
            ));
        }

        let id = InstId(self.positions.len());
        self.define(&inst, id)?;
        self.positions.push(position);

        debug!("insert  {position:3} | {inst}");
        self.lines.insert(
            position,
            Line {
                id,
                indent,
                trailing: String::new(),
                inst,
            },
        );
        self.reindex();
        self.recompute_leaders()?;
        Ok(id)
    }

    /// Inserts a new line immediately before `anchor`.
    ///
    /// # Errors
    ///
    /// See [`Program::insert`].
    pub fn insert_before(&mut self, anchor: InstId, inst: Instruction) -> Result<InstId> {
        let position = self.position_of(anchor)?;
        self.insert(position, inst)
    }

    /// Inserts a new line immediately after `anchor`, reusing the indentation of `anchor`.
    ///
    /// # Errors
    ///
    /// See [`Program::insert`].
    pub fn insert_after(&mut self, anchor: InstId, inst: Instruction) -> Result<InstId> {
        let position = self.position_of(anchor)?;
        let indent = self.lines[position].indent.clone();
        self.insert_with_indent(position + 1, inst, indent)
    }

    /// Moves a line to just before `anchor`.
    ///
    /// The original slot is disabled first so its definition moves with the copy; the copy keeps
    /// the original indentation and receives a fresh handle, which is returned.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidHandle`] for foreign handles, plus the errors of
    /// [`Program::insert`].
    pub fn relocate_before(&mut self, id: InstId, anchor: InstId) -> Result<InstId> {
        let (inst, indent) = self.take_for_relocation(id)?;
        let position = self.position_of(anchor)?;
        self.insert_with_indent(position, inst, indent)
    }

    /// Moves a line to just after `anchor`. See [`Program::relocate_before`].
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidHandle`] for foreign handles, plus the errors of
    /// [`Program::insert`].
    pub fn relocate_after(&mut self, id: InstId, anchor: InstId) -> Result<InstId> {
        let (inst, indent) = self.take_for_relocation(id)?;
        let position = self.position_of(anchor)?;
        self.insert_with_indent(position + 1, inst, indent)
    }

    fn take_for_relocation(&mut self, id: InstId) -> Result<(Instruction, String)> {
        let position = self.position_of(id)?;
        let line = &self.lines[position];
        if line.inst.is_comment() {
            return Err(malformed_error!(
                "Cannot relocate comment line {}: '{}'",
                position,
                line.inst
            ));
        }

        let copy = (line.inst.clone(), line.indent.clone());
        self.disable(id)?;
        Ok(copy)
    }

    /// Appends a module-level declaration once.
    ///
    /// The declaration is skipped when its result identifier is already defined, or, for
    /// result-less declarations such as `OpCapability`, when an identical instruction already
    /// exists. Otherwise it is inserted after the last instruction with the same opcode; when
    /// there is none, after the last declaration of the preceding kind (capabilities go before
    /// the first instruction, integer types after the last capability, constants after the last
    /// integer type).
    ///
    /// Returns the handle of the new line, or `None` when the declaration was already present.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Malformed`] if no anchor for the declaration exists.
    pub fn append_declaration(&mut self, inst: Instruction) -> Result<Option<InstId>> {
        let present = match inst.result_id() {
            Some(result) => self.defs.contains_key(result),
            None => self
                .instructions()
                .any(|existing| existing.to_string() == inst.to_string()),
        };
        if present {
            return Ok(None);
        }

        let position = self.declaration_position(&inst)?;
        let indent = position
            .checked_sub(1)
            .and_then(|previous| self.lines.get(previous))
            .filter(|line| line.inst.mnemonic() == inst.mnemonic())
            .map(|line| line.indent.clone())
            .unwrap_or_else(|| declaration_indent(&inst));

        self.insert_with_indent(position, inst, indent).map(Some)
    }

    fn last_position_of(&self, mnemonic: &str) -> Option<usize> {
        self.lines
            .iter()
            .rposition(|line| !line.inst.is_comment() && line.inst.mnemonic() == mnemonic)
    }

    fn declaration_position(&self, inst: &Instruction) -> Result<usize> {
        if let Some(last) = self.last_position_of(inst.mnemonic()) {
            return Ok(last + 1);
        }

        let fallback = match inst.opcode() {
            Opcode::Capability => self.lines.iter().position(|line| !line.inst.is_comment()),
            Opcode::TypeInt => self.last_position_of("OpCapability").map(|p| p + 1),
            Opcode::Constant => self
                .last_position_of("OpTypeInt")
                .or_else(|| self.last_position_of("OpTypePointer"))
                .map(|p| p + 1),
            _ => None,
        };

        fallback.ok_or_else(|| {
            malformed_error!("No position to declare '{}' in this program", inst)
        })
    }

    /// Numbered listing, one `{position:3} | {instruction}` row per line.
    #[must_use]
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (position, line) in self.lines.iter().enumerate() {
            out.push_str(&format!("{position:3} | {}\n", line.inst));
        }
        out
    }
}

/// `spirv-dis` right-aligns result identifiers so that `=` lands in a fixed column.
fn declaration_indent(inst: &Instruction) -> String {
    const ASSIGN_COLUMN: usize = 15;
    match inst.result_id() {
        Some(result) => " ".repeat(ASSIGN_COLUMN.saturating_sub(result.len() + 1)),
        None => " ".repeat(ASSIGN_COLUMN),
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, line) in self.lines.iter().enumerate() {
            if position > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}{}{}", line.indent, line.inst, line.trailing)?;
        }
        if self.trailing_newline {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{BROADCAST_SAMPLE, NO_IDIOM_SAMPLE};

    #[test]
    fn parse_roundtrip_is_verbatim() {
        for sample in [BROADCAST_SAMPLE, NO_IDIOM_SAMPLE] {
            let program = Program::parse(sample).unwrap();
            assert_eq!(program.to_string(), sample);
        }

        let odd = "; header\r\n\tOpCapability Shader   \n\n   %1 = OpLabel";
        let program = Program::parse(odd).unwrap();
        assert_eq!(program.to_string(), odd);
        assert_eq!(program.len(), 4);
    }

    #[test]
    fn parse_empty_fails() {
        assert!(matches!(Program::parse(""), Err(Error::Empty)));
        assert!(matches!(Program::parse("  \n\n "), Err(Error::Empty)));
    }

    #[test]
    fn parse_duplicate_definition_fails() {
        let text = "%1 = OpLabel\n%1 = OpLabel\n";
        match Program::parse(text) {
            Err(Error::DuplicateDefinition(id)) => assert_eq!(id, "%1"),
            other => panic!("Expected DuplicateDefinition, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_label_fails() {
        let text = "%1 = OpLabel\nOpBranch %2\n";
        match Program::parse(text) {
            Err(Error::LabelNotFound(label)) => assert_eq!(label, "%2"),
            other => panic!("Expected LabelNotFound, got {other:?}"),
        }
    }

    #[test]
    fn definitions_are_indexed() {
        let program = Program::parse(BROADCAST_SAMPLE).unwrap();
        let id = program.definition("%value").unwrap();
        assert!(program.get(id).unwrap().is_shared_variable());
        assert!(program.definition("%nothing").is_none());
    }

    #[test]
    fn insert_keeps_handles_stable() {
        let mut program = Program::parse("%1 = OpLabel\nOpReturn\n").unwrap();
        let label = program.id_at(0).unwrap();
        let ret = program.id_at(1).unwrap();

        let inserted = program
            .insert_after(label, Instruction::parse("%2 = OpLoad %uint %x").unwrap())
            .unwrap();

        assert_eq!(program.position_of(label).unwrap(), 0);
        assert_eq!(program.position_of(inserted).unwrap(), 1);
        assert_eq!(program.position_of(ret).unwrap(), 2);
        assert_eq!(program.definition("%2"), Some(inserted));
        assert_eq!(program.to_string(), "%1 = OpLabel\n%2 = OpLoad %uint %x\nOpReturn\n");
    }

    #[test]
    fn insert_duplicate_definition_fails() {
        let mut program = Program::parse("%1 = OpLabel\nOpReturn\n").unwrap();
        let result = program.insert(1, Instruction::parse("%1 = OpLabel").unwrap());
        assert!(matches!(result, Err(Error::DuplicateDefinition(_))));
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn insert_past_end_fails() {
        let mut program = Program::parse("OpReturn").unwrap();
        assert!(program.insert(5, Instruction::nop()).is_err());
    }

    #[test]
    fn disable_keeps_slot_and_indent() {
        let mut program = Program::parse("  %2 = OpLoad %uint %x\n  OpReturn\n").unwrap();
        let load = program.id_at(0).unwrap();

        program.disable(load).unwrap();
        program.disable(load).unwrap();

        assert_eq!(program.to_string(), "  ; NOP\n  OpReturn\n");
        assert!(program.definition("%2").is_none());
        assert!(program.get(load).unwrap().is_nop());
    }

    #[test]
    fn relocate_moves_definition() {
        let text = "%1 = OpLabel\n%2 = OpLoad %uint %x\nOpStore %y %2\nOpReturn\n";
        let mut program = Program::parse(text).unwrap();
        let load = program.id_at(1).unwrap();
        let store = program.id_at(2).unwrap();

        let moved = program.relocate_after(load, store).unwrap();

        assert_ne!(moved, load);
        assert_eq!(program.definition("%2"), Some(moved));
        assert_eq!(program.position_of(moved).unwrap(), 3);
        assert_eq!(
            program.to_string(),
            "%1 = OpLabel\n; NOP\nOpStore %y %2\n%2 = OpLoad %uint %x\nOpReturn\n"
        );
    }

    #[test]
    fn relocate_comment_fails() {
        let mut program = Program::parse("; hello\nOpReturn").unwrap();
        let comment = program.id_at(0).unwrap();
        let ret = program.id_at(1).unwrap();
        assert!(program.relocate_before(comment, ret).is_err());
    }

    #[test]
    fn replace_detects_duplicates() {
        let mut program = Program::parse("%1 = OpLabel\n%2 = OpLoad %uint %x\n").unwrap();
        let load = program.id_at(1).unwrap();

        let clash = Instruction::parse("%1 = OpLoad %uint %x").unwrap();
        assert!(matches!(
            program.replace(load, clash),
            Err(Error::DuplicateDefinition(_))
        ));
        assert_eq!(program.definition("%2"), Some(load));

        let broadcast = Instruction::broadcast("%2", "%uint", "%uint_3", "%uint_7", "%uint_0");
        program.replace(load, broadcast).unwrap();
        assert_eq!(program.definition("%2"), Some(load));
    }

    #[test]
    fn leaders_follow_edits() {
        let text = "%1 = OpLabel\nOpStore %x %c\nOpStore %y %c\nOpReturn\n";
        let mut program = Program::parse(text).unwrap();
        assert_eq!(program.leaders(), &[0]);

        let second = program.id_at(2).unwrap();
        program
            .insert_before(second, Instruction::parse("OpControlBarrier %c %c %c").unwrap())
            .unwrap();
        assert_eq!(program.leaders(), &[0, 3]);
        assert_eq!(program.block_leader(4), Some(3));
        assert_eq!(program.block_leader(1), Some(0));
        assert_eq!(program.block_leader(99), None);

        let barrier = program.id_at(2).unwrap();
        program.disable(barrier).unwrap();
        assert_eq!(program.leaders(), &[0]);
    }

    #[test]
    fn append_declaration_once() {
        let text = "OpCapability Shader\n%uint = OpTypeInt 32 0\n%uint_0 = OpConstant %uint 0\n";
        let mut program = Program::parse(text).unwrap();

        let cap = program
            .append_declaration(Instruction::capability("GroupNonUniform"))
            .unwrap();
        assert_eq!(program.position_of(cap.unwrap()).unwrap(), 1);
        assert!(program
            .append_declaration(Instruction::capability("GroupNonUniform"))
            .unwrap()
            .is_none());

        let constant = program
            .append_declaration(Instruction::constant("uint_3", "uint", 3))
            .unwrap();
        assert_eq!(program.position_of(constant.unwrap()).unwrap(), 4);
        assert!(program
            .append_declaration(Instruction::constant("uint_3", "uint", 3))
            .unwrap()
            .is_none());

        assert_eq!(
            program.to_string(),
            "OpCapability Shader\nOpCapability GroupNonUniform\n%uint = OpTypeInt 32 0\n\
             %uint_0 = OpConstant %uint 0\n%uint_3 = OpConstant %uint 3\n"
        );
    }

    #[test]
    fn append_declaration_falls_back() {
        let text = "; comment\n%bool = OpTypeBool\n%ptr = OpTypePointer Workgroup %bool\n";
        let mut program = Program::parse(text).unwrap();

        let cap = program
            .append_declaration(Instruction::capability("Shader"))
            .unwrap()
            .unwrap();
        assert_eq!(program.position_of(cap).unwrap(), 1);

        let int = program
            .append_declaration(Instruction::int_type("uint", 32, false))
            .unwrap()
            .unwrap();
        assert_eq!(program.position_of(int).unwrap(), 2);

        assert!(program
            .append_declaration(Instruction::parse("%f = OpTypeFloat 32").unwrap())
            .is_err());
    }

    #[test]
    fn listing_numbers_lines() {
        let program = Program::parse("%1 = OpLabel\nOpReturn").unwrap();
        assert_eq!(program.listing(), "  0 | %1 = OpLabel\n  1 | OpReturn\n");
    }
}
