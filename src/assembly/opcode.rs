//! Opcode vocabulary recognised by the transform engine.
//!
//! SPIR-V has several hundred opcodes, but the engine only needs to understand the handful that
//! take part in the shared-memory idioms and in basic-block construction. Everything else is
//! carried as [`Opcode::Unknown`] and round-trips verbatim through the textual form.
//!
//! Mnemonic conversion is derived with `strum`: [`Opcode`] parses from and prints as its
//! `Op*` mnemonic, and [`ReduceOperator`] parses from the suffix of an atomic mnemonic and prints
//! as the matching `OpGroupNonUniform*` operation name.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Prefix shared by every atomic read-modify-write mnemonic.
pub const ATOMIC_PREFIX: &str = "OpAtomic";

/// Prefix of the subgroup non-uniform operation mnemonics.
pub const GROUP_NON_UNIFORM_PREFIX: &str = "OpGroupNonUniform";

/// Opcodes with engine-level meaning.
///
/// `Unknown` and `Comment` are never produced by [`std::str::FromStr`]; the instruction parser
/// falls back to them for unrecognised mnemonics and for comment or blank lines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
pub enum Opcode {
    /// `OpLoad` - read through a pointer
    #[strum(serialize = "OpLoad")]
    Load,
    /// `OpStore` - write through a pointer
    #[strum(serialize = "OpStore")]
    Store,
    /// `OpVariable` - variable declaration
    #[strum(serialize = "OpVariable")]
    Variable,
    /// `OpIEqual` - integer equality compare
    #[strum(serialize = "OpIEqual")]
    IEqual,
    /// `OpAtomicIAdd`
    #[strum(serialize = "OpAtomicIAdd")]
    AtomicIAdd,
    /// `OpAtomicSMin`
    #[strum(serialize = "OpAtomicSMin")]
    AtomicSMin,
    /// `OpAtomicUMin`
    #[strum(serialize = "OpAtomicUMin")]
    AtomicUMin,
    /// `OpAtomicSMax`
    #[strum(serialize = "OpAtomicSMax")]
    AtomicSMax,
    /// `OpAtomicUMax`
    #[strum(serialize = "OpAtomicUMax")]
    AtomicUMax,
    /// `OpAtomicAnd`
    #[strum(serialize = "OpAtomicAnd")]
    AtomicAnd,
    /// `OpAtomicOr`
    #[strum(serialize = "OpAtomicOr")]
    AtomicOr,
    /// `OpAtomicXor`
    #[strum(serialize = "OpAtomicXor")]
    AtomicXor,
    /// `OpBranch` - unconditional branch
    #[strum(serialize = "OpBranch")]
    Branch,
    /// `OpBranchConditional` - two-way conditional branch
    #[strum(serialize = "OpBranchConditional")]
    BranchConditional,
    /// `OpSwitch` - multi-way branch
    #[strum(serialize = "OpSwitch")]
    Switch,
    /// `OpReturn`
    #[strum(serialize = "OpReturn")]
    Return,
    /// `OpReturnValue`
    #[strum(serialize = "OpReturnValue")]
    ReturnValue,
    /// `OpKill`
    #[strum(serialize = "OpKill")]
    Kill,
    /// `OpUnreachable`
    #[strum(serialize = "OpUnreachable")]
    Unreachable,
    /// `OpTerminateInvocation`
    #[strum(serialize = "OpTerminateInvocation")]
    TerminateInvocation,
    /// `OpTypePointer` - pointer type declaration
    #[strum(serialize = "OpTypePointer")]
    TypePointer,
    /// `OpTypeInt` - integer type declaration
    #[strum(serialize = "OpTypeInt")]
    TypeInt,
    /// `OpConstant` - scalar constant
    #[strum(serialize = "OpConstant")]
    Constant,
    /// `OpLabel` - basic block label
    #[strum(serialize = "OpLabel")]
    Label,
    /// `OpControlBarrier`
    #[strum(serialize = "OpControlBarrier")]
    ControlBarrier,
    /// `OpMemoryBarrier`
    #[strum(serialize = "OpMemoryBarrier")]
    MemoryBarrier,
    /// `OpAccessChain` - pointer into a composite
    #[strum(serialize = "OpAccessChain")]
    AccessChain,
    /// `OpInBoundsAccessChain`
    #[strum(serialize = "OpInBoundsAccessChain")]
    InBoundsAccessChain,
    /// `OpCapability` - capability declaration
    #[strum(serialize = "OpCapability")]
    Capability,
    /// `OpDecorate` - decoration of an identifier
    #[strum(serialize = "OpDecorate")]
    Decorate,
    /// `OpGroupNonUniformBroadcast`
    #[strum(serialize = "OpGroupNonUniformBroadcast")]
    GroupNonUniformBroadcast,
    /// Any mnemonic the engine has no semantics for
    #[strum(disabled)]
    Unknown,
    /// Comment or blank line
    #[strum(disabled)]
    Comment,
}

impl Opcode {
    /// Looks up the opcode for a mnemonic, falling back to [`Opcode::Unknown`].
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        mnemonic.parse().unwrap_or(Opcode::Unknown)
    }

    /// Returns the canonical mnemonic, or `None` for `Unknown` and `Comment`.
    #[must_use]
    pub fn mnemonic(&self) -> Option<&'static str> {
        match self {
            Opcode::Unknown | Opcode::Comment => None,
            other => Some(other.into()),
        }
    }

    /// True for the atomic read-modify-write family that maps onto a subgroup reduction.
    #[must_use]
    pub fn is_atomic(&self) -> bool {
        self.reduce_operator().is_some()
    }

    /// True for access chains of either flavour.
    #[must_use]
    pub fn is_access_chain(&self) -> bool {
        matches!(self, Opcode::AccessChain | Opcode::InBoundsAccessChain)
    }

    /// True for barriers, which end a basic block in this engine's block model.
    #[must_use]
    pub fn is_barrier(&self) -> bool {
        matches!(self, Opcode::ControlBarrier | Opcode::MemoryBarrier)
    }

    /// True for instructions that end a function without a successor block.
    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Opcode::Return
                | Opcode::ReturnValue
                | Opcode::Kill
                | Opcode::Unreachable
                | Opcode::TerminateInvocation
        )
    }

    /// True for every instruction whose presence changes the leader set.
    #[must_use]
    pub fn affects_control_flow(&self) -> bool {
        matches!(
            self,
            Opcode::Branch | Opcode::BranchConditional | Opcode::Switch
        ) || self.is_return()
            || self.is_barrier()
    }

    /// The subgroup reduction matching an atomic opcode.
    ///
    /// The operator name is the atomic mnemonic with [`ATOMIC_PREFIX`] stripped.
    #[must_use]
    pub fn reduce_operator(&self) -> Option<ReduceOperator> {
        let mnemonic: &'static str = self.mnemonic()?;
        mnemonic.strip_prefix(ATOMIC_PREFIX)?.parse().ok()
    }
}

/// Commutative, associative operator of a subgroup reduction.
///
/// Parsing accepts the atomic suffix (`IAdd`, `And`, ...); `Display` yields the suffix of the
/// matching `OpGroupNonUniform*` mnemonic (`IAdd`, `BitwiseAnd`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum ReduceOperator {
    /// Integer addition
    #[strum(serialize = "IAdd")]
    IAdd,
    /// Signed minimum
    #[strum(serialize = "SMin")]
    SMin,
    /// Unsigned minimum
    #[strum(serialize = "UMin")]
    UMin,
    /// Signed maximum
    #[strum(serialize = "SMax")]
    SMax,
    /// Unsigned maximum
    #[strum(serialize = "UMax")]
    UMax,
    /// Bitwise and
    #[strum(serialize = "And", to_string = "BitwiseAnd")]
    BitwiseAnd,
    /// Bitwise or
    #[strum(serialize = "Or", to_string = "BitwiseOr")]
    BitwiseOr,
    /// Bitwise exclusive or
    #[strum(serialize = "Xor", to_string = "BitwiseXor")]
    BitwiseXor,
}

impl ReduceOperator {
    /// Full mnemonic of the subgroup operation, e.g. `OpGroupNonUniformIAdd`.
    #[must_use]
    pub fn mnemonic(&self) -> String {
        format!("{GROUP_NON_UNIFORM_PREFIX}{self}")
    }
}
