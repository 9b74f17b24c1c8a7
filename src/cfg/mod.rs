//! Control-flow discovery and block assembly.
//!
//! Branch targets found during the bytecode walk become [`Block`] boundaries;
//! [`ControlFlowAssembler`] registers them idempotently, records edges, and
//! finally links everything in address order into a [`ControlFlowGraph`] with
//! every fallthrough made explicit. Backward-branch targets are marked so loop
//! heads run an interruptibility checkpoint.

mod assembler;
mod block;

pub use assembler::{ControlFlowAssembler, ControlFlowGraph};
pub use block::{Block, BlockFlags, BlockId, TreeTop};
