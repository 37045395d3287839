//! Instruction representation, textual parsing and opcode-specific accessors.
//!
//! An [`Instruction`] is one line of SPIR-V assembly, split into an optional result identifier,
//! an [`Opcode`] and a list of whitespace-separated operand tokens. Instructions are immutable
//! once constructed: edits to a program always replace whole instructions.
//!
//! # Text Fidelity
//!
//! Parsed instructions remember the exact operation text they were read from, so a program that
//! is never edited serializes back to its input byte-for-byte. Instructions synthesized by the
//! factory helpers render a canonical `%result = OpName operand operand` form.
//!
//! # Accessors
//!
//! The semantic accessors ([`Instruction::source`], [`Instruction::destination`],
//! [`Instruction::storage_class`], ...) are only defined for particular opcodes. Calling one on
//! an inapplicable instruction yields [`crate::Error::InvalidAccessor`].
//!
//! ```rust
//! use spvgroup::assembly::{Instruction, OperandRef};
//!
//! let store = Instruction::parse("OpStore %value %uint_7")?;
//! assert_eq!(store.source()?, OperandRef::Single("%uint_7"));
//! assert_eq!(store.destination()?, OperandRef::Single("%value"));
//! assert!(store.storage_class().is_err());
//! # Ok::<(), spvgroup::Error>(())
//! ```

use std::{fmt, str::FromStr};

use crate::{
    assembly::{Opcode, ReduceOperator},
    Error, Result,
};

/// Storage class of workgroup-shared memory.
pub const WORKGROUP_STORAGE_CLASS: &str = "Workgroup";

/// Group operation tag used for whole-subgroup reductions.
pub const REDUCE_GROUP_OPERATION: &str = "Reduce";

/// Text a disabled instruction is replaced with.
pub const NOP_TEXT: &str = "; NOP";

/// One or two operand tokens returned by [`Instruction::source`] and
/// [`Instruction::destination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRef<'a> {
    /// A single identifier or literal
    Single(&'a str),
    /// An ordered pair, e.g. the compared values of `OpIEqual` or the targets of
    /// `OpBranchConditional`
    Pair(&'a str, &'a str),
}

impl<'a> OperandRef<'a> {
    /// The single token, or `None` for a pair.
    #[must_use]
    pub fn single(self) -> Option<&'a str> {
        match self {
            OperandRef::Single(value) => Some(value),
            OperandRef::Pair(..) => None,
        }
    }

    /// The pair of tokens, or `None` for a single token.
    #[must_use]
    pub fn pair(self) -> Option<(&'a str, &'a str)> {
        match self {
            OperandRef::Single(_) => None,
            OperandRef::Pair(first, second) => Some((first, second)),
        }
    }

    /// True if either side equals `token`.
    #[must_use]
    pub fn contains(self, token: &str) -> bool {
        match self {
            OperandRef::Single(value) => value == token,
            OperandRef::Pair(first, second) => first == token || second == token,
        }
    }
}

/// A single SPIR-V assembly instruction.
///
/// # Examples
///
/// ```rust
/// use spvgroup::assembly::{Instruction, Opcode};
///
/// let inst = Instruction::parse("%29 = OpLoad %uint %value")?;
/// assert_eq!(inst.result_id(), Some("%29"));
/// assert_eq!(inst.opcode(), Opcode::Load);
/// assert_eq!(inst.operands(), ["%uint", "%value"]);
/// # Ok::<(), spvgroup::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    result_id: Option<String>,
    opcode: Opcode,
    mnemonic: String,
    operands: Vec<String>,
    text: String,
}

impl Instruction {
    /// Parses one line of assembly. Leading and trailing whitespace is ignored.
    ///
    /// Lines starting with `;` and blank lines become [`Opcode::Comment`] instructions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a line starting with an identifier is not of the
    /// form `%result = OpName ...`.
    pub fn parse(line: &str) -> Result<Self> {
        let text = line.trim();
        if text.is_empty() || text.starts_with(';') {
            return Ok(Self::comment_line(text));
        }

        let (result_id, operation) = match text.split_once(" = ") {
            Some((lhs, rhs)) if lhs.starts_with('%') && !lhs.contains(char::is_whitespace) => {
                (Some(lhs.to_string()), rhs)
            }
            _ if text.starts_with('%') => {
                return Err(malformed_error!("Missing operation after '{}'", text));
            }
            _ => (None, text),
        };

        let mut tokens = operation.split_whitespace();
        let mnemonic = tokens
            .next()
            .ok_or_else(|| malformed_error!("Missing operation after '{}'", text))?;

        Ok(Instruction {
            result_id,
            opcode: Opcode::from_mnemonic(mnemonic),
            mnemonic: mnemonic.to_string(),
            operands: tokens.map(str::to_string).collect(),
            text: text.to_string(),
        })
    }

    /// Builds an instruction from its parts and renders its canonical text.
    #[must_use]
    pub fn new(result_id: Option<&str>, mnemonic: &str, operands: &[&str]) -> Self {
        let mut text = String::new();
        if let Some(result) = result_id {
            text.push_str(result);
            text.push_str(" = ");
        }
        text.push_str(mnemonic);
        for operand in operands {
            text.push(' ');
            text.push_str(operand);
        }

        Instruction {
            result_id: result_id.map(str::to_string),
            opcode: Opcode::from_mnemonic(mnemonic),
            mnemonic: mnemonic.to_string(),
            operands: operands.iter().map(|op| (*op).to_string()).collect(),
            text,
        }
    }

    fn comment_line(text: &str) -> Self {
        Instruction {
            result_id: None,
            opcode: Opcode::Comment,
            mnemonic: String::new(),
            operands: Vec::new(),
            text: text.to_string(),
        }
    }

    /// The no-op placeholder a disabled instruction is replaced with.
    #[must_use]
    pub fn nop() -> Self {
        Self::comment_line(NOP_TEXT)
    }

    /// `%result = OpGroupNonUniformBroadcast <data_type> <scope> <source> <thread>`
    #[must_use]
    pub fn broadcast(result: &str, data_type: &str, scope: &str, source: &str, thread: &str) -> Self {
        Self::new(
            Some(result),
            "OpGroupNonUniformBroadcast",
            &[data_type, scope, source, thread],
        )
    }

    /// `%result = OpGroupNonUniform<op> <data_type> <scope> Reduce <source>`
    #[must_use]
    pub fn reduce(
        result: &str,
        operator: ReduceOperator,
        data_type: &str,
        scope: &str,
        source: &str,
    ) -> Self {
        Self::new(
            Some(result),
            &operator.mnemonic(),
            &[data_type, scope, REDUCE_GROUP_OPERATION, source],
        )
    }

    /// `%<name> = OpConstant %<data_type> <value>`
    #[must_use]
    pub fn constant(name: &str, data_type: &str, value: u32) -> Self {
        let result = format!("%{name}");
        let data_type = format!("%{data_type}");
        let value = value.to_string();
        Self::new(Some(&result), "OpConstant", &[data_type.as_str(), value.as_str()])
    }

    /// `%<name> = OpTypeInt <width> <signedness>`
    #[must_use]
    pub fn int_type(name: &str, width: u32, signed: bool) -> Self {
        let result = format!("%{name}");
        let width = width.to_string();
        Self::new(
            Some(&result),
            "OpTypeInt",
            &[width.as_str(), if signed { "1" } else { "0" }],
        )
    }

    /// `OpCapability <name>`
    #[must_use]
    pub fn capability(name: &str) -> Self {
        Self::new(None, "OpCapability", &[name])
    }

    /// The identifier this instruction defines, if any.
    #[must_use]
    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    /// The engine-level opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The mnemonic as written, empty for comments.
    #[must_use]
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Operand tokens following the mnemonic.
    #[must_use]
    pub fn operands(&self) -> &[String] {
        &self.operands
    }

    /// True for comment lines, blank lines and disabled instructions.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.opcode == Opcode::Comment
    }

    /// True for the placeholder written by [`Instruction::nop`].
    #[must_use]
    pub fn is_nop(&self) -> bool {
        self.is_comment() && self.text == NOP_TEXT
    }

    /// True for `OpLabel`.
    #[must_use]
    pub fn is_label(&self) -> bool {
        self.opcode == Opcode::Label
    }

    /// Operand at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingOperand`] if the instruction is too short.
    pub fn operand(&self, index: usize) -> Result<&str> {
        self.operands
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingOperand {
                opcode: self.mnemonic.clone(),
                index,
            })
    }

    fn not_applicable(&self, accessor: &'static str) -> Error {
        Error::InvalidAccessor {
            accessor,
            opcode: if self.is_comment() {
                self.text.clone()
            } else {
                self.mnemonic.clone()
            },
        }
    }

    /// The value consumed by the instruction.
    ///
    /// | Opcode | Source |
    /// |---|---|
    /// | `OpLoad`, `OpStore` | operand 1 |
    /// | `OpIEqual` | operands 1 and 2 |
    /// | `OpBranchConditional` | operand 0 (the condition) |
    /// | atomics | operand 4 (the value) |
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] for any other opcode.
    pub fn source(&self) -> Result<OperandRef<'_>> {
        match self.opcode {
            Opcode::Load | Opcode::Store => Ok(OperandRef::Single(self.operand(1)?)),
            Opcode::IEqual => Ok(OperandRef::Pair(self.operand(1)?, self.operand(2)?)),
            Opcode::BranchConditional => Ok(OperandRef::Single(self.operand(0)?)),
            op if op.is_atomic() => Ok(OperandRef::Single(self.operand(4)?)),
            _ => Err(self.not_applicable("source")),
        }
    }

    /// The value produced or location targeted by the instruction.
    ///
    /// | Opcode | Destination |
    /// |---|---|
    /// | `OpBranchConditional` | true and false labels |
    /// | atomics | operand 1 (the pointer) |
    /// | `OpStore`, `OpBranch` | operand 0 |
    /// | `OpLoad` | the result identifier |
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] for any other opcode.
    pub fn destination(&self) -> Result<OperandRef<'_>> {
        match self.opcode {
            Opcode::BranchConditional => {
                Ok(OperandRef::Pair(self.operand(1)?, self.operand(2)?))
            }
            Opcode::Store | Opcode::Branch => Ok(OperandRef::Single(self.operand(0)?)),
            Opcode::Load => self
                .result_id()
                .map(OperandRef::Single)
                .ok_or_else(|| malformed_error!("'{}' has no result identifier", self.text)),
            op if op.is_atomic() => Ok(OperandRef::Single(self.operand(1)?)),
            _ => Err(self.not_applicable("destination")),
        }
    }

    /// Single-token [`Instruction::source`].
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] if the source is a pair or not defined.
    pub fn source_id(&self) -> Result<&str> {
        self.source()?
            .single()
            .ok_or_else(|| self.not_applicable("source_id"))
    }

    /// Single-token [`Instruction::destination`].
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] if the destination is a pair or not defined.
    pub fn destination_id(&self) -> Result<&str> {
        self.destination()?
            .single()
            .ok_or_else(|| self.not_applicable("destination_id"))
    }

    /// `(true_label, false_label)` of an `OpBranchConditional`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] for any other opcode.
    pub fn branch_targets(&self) -> Result<(&str, &str)> {
        match self.opcode {
            Opcode::BranchConditional => Ok((self.operand(1)?, self.operand(2)?)),
            _ => Err(self.not_applicable("branch_targets")),
        }
    }

    /// Every label a branch can transfer control to.
    ///
    /// For `OpSwitch` this is the default label followed by each case label.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] if the instruction is not a branch.
    pub fn successor_labels(&self) -> Result<Vec<&str>> {
        match self.opcode {
            Opcode::Branch => Ok(vec![self.operand(0)?]),
            Opcode::BranchConditional => {
                let (on_true, on_false) = self.branch_targets()?;
                Ok(vec![on_true, on_false])
            }
            Opcode::Switch => {
                let mut labels = vec![self.operand(1)?];
                labels.extend(self.operands.iter().skip(3).step_by(2).map(String::as_str));
                Ok(labels)
            }
            _ => Err(self.not_applicable("successor_labels")),
        }
    }

    /// Storage class of a variable or pointer type.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] unless the opcode is `OpVariable` or `OpTypePointer`.
    pub fn storage_class(&self) -> Result<&str> {
        match self.opcode {
            Opcode::Variable => self.operand(1),
            Opcode::TypePointer => self.operand(0),
            _ => Err(self.not_applicable("storage_class")),
        }
    }

    /// True iff this is a variable in workgroup-shared storage.
    #[must_use]
    pub fn is_shared_variable(&self) -> bool {
        self.opcode == Opcode::Variable
            && self.operands.get(1).map(String::as_str) == Some(WORKGROUP_STORAGE_CLASS)
    }

    /// The pointer being indexed by an access chain.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] unless the instruction is an access chain.
    pub fn base(&self) -> Result<&str> {
        if self.opcode.is_access_chain() {
            self.operand(1)
        } else {
            Err(self.not_applicable("base"))
        }
    }

    /// Identifier of the pointer type a variable is declared with.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] unless the opcode is `OpVariable`.
    pub fn pointer_type_id(&self) -> Result<&str> {
        match self.opcode {
            Opcode::Variable => self.operand(0),
            _ => Err(self.not_applicable("pointer_type_id")),
        }
    }

    /// Element type a pointer type points to.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] unless the opcode is `OpTypePointer`.
    pub fn pointee_type(&self) -> Result<&str> {
        match self.opcode {
            Opcode::TypePointer => self.operand(1),
            _ => Err(self.not_applicable("pointee_type")),
        }
    }

    /// Result type of a value-producing instruction (operand 0).
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidAccessor`] for instructions without a typed result.
    pub fn result_type(&self) -> Result<&str> {
        match self.opcode {
            Opcode::Load
            | Opcode::IEqual
            | Opcode::Constant
            | Opcode::AccessChain
            | Opcode::InBoundsAccessChain
            | Opcode::GroupNonUniformBroadcast => self.operand(0),
            op if op.is_atomic() => self.operand(0),
            _ => Err(self.not_applicable("result_type")),
        }
    }
}

impl FromStr for Instruction {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        Instruction::parse(line)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
