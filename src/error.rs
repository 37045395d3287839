use thiserror::Error;

/// Builds an [`Error::Malformed`] tagged with the file and line that detected the problem.
macro_rules! malformed_error {
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Everything that can go wrong while reading, rewriting or writing a shader.
///
/// Every variant except [`Error::FileError`] describes input that violates the structural
/// invariants of SPIR-V assembly (single definition per identifier, well-formed control flow,
/// opcode-specific operand layouts). These are unrecoverable: a run that hits one aborts without
/// producing output.
///
/// # Error Categories
///
/// ## Malformed Input
/// - [`Error::Malformed`] - Generic structural problem with source location of detection
/// - [`Error::UnresolvedId`] - An identifier is referenced but never defined
/// - [`Error::LabelNotFound`] - A branch targets a label that does not exist
/// - [`Error::DuplicateDefinition`] - An identifier is defined more than once
/// - [`Error::MissingOperand`] - An instruction has fewer operands than its opcode requires
/// - [`Error::Empty`] - Empty input provided
///
/// ## Engine Contract Violations
/// - [`Error::InvalidAccessor`] - A semantic accessor was used on an inapplicable opcode
/// - [`Error::InvalidHandle`] - An instruction handle does not belong to the program
///
/// ## I/O
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust
/// use spvgroup::{Error, Transformer};
///
/// // Parsing accepts the dangling pointer; detection is what resolves it.
/// match Transformer::default().transform_str("%29 = OpLoad %uint %missing\n") {
///     Ok(_) => panic!("dangling pointer accepted"),
///     Err(Error::UnresolvedId(id)) => assert_eq!(id, "%missing"),
///     Err(e) => panic!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be processed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An identifier is used but no instruction defines it.
    #[error("Identifier {0} has no defining instruction")]
    UnresolvedId(String),

    /// A branch targets a label that is not present in the program.
    #[error("Branch target label {0} does not exist")]
    LabelNotFound(String),

    /// An identifier is defined by more than one instruction.
    #[error("Identifier {0} is defined more than once")]
    DuplicateDefinition(String),

    /// A semantic accessor was invoked on an instruction whose opcode does not support it.
    ///
    /// This is a contract violation inside the transform engine, not a user-facing condition.
    #[error("Accessor '{accessor}' is not applicable to {opcode}")]
    InvalidAccessor {
        /// Name of the accessor that was called
        accessor: &'static str,
        /// Mnemonic of the instruction it was called on
        opcode: String,
    },

    /// An instruction is missing an operand its opcode requires.
    #[error("{opcode} is missing operand {index}")]
    MissingOperand {
        /// Mnemonic of the short instruction
        opcode: String,
        /// Zero-based operand index that was requested
        index: usize,
    },

    /// An instruction handle that was never issued by this program.
    #[error("Invalid instruction handle {0}")]
    InvalidHandle(usize),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while reading the input or persisting the
    /// output file.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
