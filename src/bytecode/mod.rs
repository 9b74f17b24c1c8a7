//! Bytecode decoding.
//!
//! This module turns a raw, verified method body into discrete instruction
//! records. It knows nothing about IR, stacks, or blocks; its only jobs are the
//! opcode table and the operand encodings, including the wide prefix and the
//! word-boundary padding of the switch forms.
//!
//! # Key Types
//!
//! - [`Opcode`] - The closed set of defined bytecodes
//! - [`OpcodeRecord`] - One decoded instruction with absolute branch targets
//! - [`BytecodeCursor`] - Stateless decoder over one method body
//! - [`FlowKind`] - Control-flow effect classification for block discovery
//!
//! # Example
//!
//! ```rust
//! use jitfront::bytecode::{BytecodeCursor, Opcode};
//!
//! let code = [0x03, 0xac]; // iconst_0, ireturn
//! let cursor = BytecodeCursor::new(&code)?;
//! let record = cursor.decode(0)?;
//! assert_eq!(record.opcode, Opcode::Iconst0);
//! assert_eq!(record.next, 1);
//! # Ok::<(), jitfront::Error>(())
//! ```

mod decoder;
mod opcode;

pub use decoder::{BytecodeCursor, OpcodeRecord, Operands};
pub use opcode::{FlowKind, Opcode, OperandForm};
