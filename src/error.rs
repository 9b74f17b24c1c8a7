use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure mode of bytecode decoding and IR construction is represented here. All of
/// these abort translation of the *current method only*; the process and the surrounding
/// compilation pipeline are expected to fall back to a non-speculative execution mode or
/// retry later. Field analysis never surfaces through this type — an analysis attempt that
/// cannot complete degrades to "no information" internally.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::UnsupportedBytecode`] - Opcode unknown, or known but not translatable
/// - [`Error::Malformed`] - Structurally invalid instruction stream
/// - [`Error::OutOfBounds`] - Attempted to read beyond the code buffer
/// - [`Error::Empty`] - Empty code buffer provided
///
/// ## Simulation Errors
/// - [`Error::StackUnderflow`] - Pop from an empty operand stack
/// - [`Error::StackShapeMismatch`] - Inconsistent stack shapes at a control-flow merge
///
/// # Examples
///
/// ```rust
/// use jitfront::{Error, bytecode::BytecodeCursor};
///
/// let code = [0xba, 0x00, 0x01, 0x00, 0x00]; // invokedynamic
/// match BytecodeCursor::new(&code).unwrap().decode(0) {
///     Err(Error::UnsupportedBytecode { opcode, offset }) => {
///         eprintln!("cannot translate opcode {opcode:#x} at {offset}");
///     }
///     other => panic!("expected UnsupportedBytecode, got {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The opcode is unknown or cannot be translated.
    ///
    /// Raised for undefined opcode bytes and for opcodes this front end deliberately
    /// does not handle (the retired subroutine instructions and `invokedynamic`).
    /// Translation of the current method is abandoned; the caller falls back to a
    /// conservative execution mode.
    ///
    /// # Fields
    ///
    /// * `opcode` - The raw opcode byte that was rejected
    /// * `offset` - Byte index of the instruction within the method body
    #[error("Unsupported bytecode {opcode:#04x} at offset {offset}")]
    UnsupportedBytecode {
        /// The raw opcode byte that was rejected
        opcode: u8,
        /// Byte index of the instruction within the method body
        offset: usize,
    },

    /// The instruction stream is damaged and could not be decoded.
    ///
    /// Indicates a structurally invalid method body: truncated operands, switch
    /// tables with inverted bounds, or a wide prefix applied to an opcode that has
    /// no widened form. Includes the source location where the malformation was
    /// detected for debugging purposes.
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

    /// An out of bound access was attempted while decoding the method body.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided code buffer was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A value was popped from an empty simulated operand stack.
    ///
    /// The input is assumed to have passed bytecode verification, so an underflow
    /// indicates either malformed input that slipped past the verifier or an
    /// internal bookkeeping fault. Either way the method cannot be translated.
    #[error("Operand stack underflow at offset {offset}")]
    StackUnderflow {
        /// Byte index of the instruction that attempted the pop
        offset: usize,
    },

    /// Two control-flow paths reached the same join point with incompatible
    /// simulated stacks.
    ///
    /// Verified bytecode guarantees identical stack shapes on every edge into a
    /// join, so a mismatch is a contract violation by the input. The stack is
    /// never silently truncated or padded to force agreement.
    ///
    /// # Fields
    ///
    /// * `target` - Byte index of the join point whose entry shapes disagree
    /// * `message` - Description of the depth or slot-type disagreement
    #[error("Stack shape mismatch at join target {target}: {message}")]
    StackShapeMismatch {
        /// Byte index of the join point whose entry shapes disagree
        target: usize,
        /// Description of the depth or slot-type disagreement
        message: String,
    },
}
