//! Intermediate representation and the bytecode-to-IR translation.
//!
//! The IR is a forest of expression trees over a reference-counted
//! [`arena`](crate::ir::arena): bytecode stack traffic becomes tree edges, and
//! only statement boundaries (stores, calls, control transfers, forced
//! spills) survive as [`Treetop`](IlOp::Treetop)s appended to basic blocks.
//! Duplicated stack values share one node, so common subexpressions fall out
//! of construction instead of a later pass.
//!
//! [`Translator`] is the entry point; everything else in this module is the
//! machinery it drives: the [`TreeBuilder`] context, the simulated
//! [`OperandStack`], and the [`DeoptRecorder`] collecting resumption state for
//! the conservative execution mode.

pub(crate) mod arena;
pub(crate) mod builder;
pub(crate) mod deopt;
pub(crate) mod node;
pub(crate) mod stack;
mod translator;

pub use arena::{IrNode, NodeArena, NodeId};
pub use builder::TreeBuilder;
pub use deopt::{DeoptRecorder, TransitionDecision};
pub use node::{
    ArrayElem, ArraySpec, BranchSpec, CallKind, ClassRef, CmpKind, Condition, ConvKind, FieldRef,
    IlOp, MethodRef, NodeFlags, Payload, SlotId, SwitchSpec, ValueType,
};
pub use stack::{reconcile, OperandStack, PendingSlot, StackShape, StackValue};
pub use translator::{TraceEvent, TraceLog, Translation, Translator};
