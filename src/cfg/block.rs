//! Basic blocks and their statement lists.

use bitflags::bitflags;

use crate::ir::arena::{NodeArena, NodeId};
use crate::ir::node::IlOp;
use crate::ir::stack::StackShape;

bitflags! {
    /// State marks on a [`Block`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Statements have been generated into the block.
        const GENERATED = 0x01;
        /// The block starts at a registered jump target.
        const IS_TARGET = 0x02;
        /// The block is entered by a backward branch and needs an
        /// interruptibility checkpoint at its head.
        const NEEDS_CHECKPOINT = 0x04;
        /// The block was created during linking to disambiguate a fallthrough,
        /// not opened by the bytecode walk.
        const SYNTHETIC = 0x08;
    }
}

/// Handle to a block within one control-flow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// One statement: a root node linked in execution order within its block.
#[derive(Clone, Copy, Debug)]
pub struct TreeTop {
    /// The statement's root node.
    pub root: NodeId,
}

/// A maximal straight-line run of statements with one entry and one exit.
pub struct Block {
    start: usize,
    treetops: Vec<TreeTop>,
    flags: BlockFlags,
    successors: Vec<BlockId>,
    predecessors: Vec<BlockId>,
    entry_shape: Option<StackShape>,
}

impl Block {
    pub(crate) fn new(start: usize, flags: BlockFlags) -> Self {
        Block {
            start,
            treetops: Vec::new(),
            flags,
            successors: Vec::new(),
            predecessors: Vec::new(),
            entry_shape: None,
        }
    }

    /// Bytecode offset of the block's first instruction.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Statements in execution order.
    pub fn treetops(&self) -> &[TreeTop] {
        &self.treetops
    }

    /// State marks.
    pub fn flags(&self) -> BlockFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut BlockFlags {
        &mut self.flags
    }

    /// Successor blocks.
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// Predecessor blocks.
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// The stack shape recorded on first arrival, if any path with live stack
    /// entries has reached the block.
    pub fn entry_shape(&self) -> Option<&StackShape> {
        self.entry_shape.as_ref()
    }

    pub(crate) fn record_entry_shape(&mut self, shape: StackShape) {
        debug_assert!(self.entry_shape.is_none());
        self.entry_shape = Some(shape);
    }

    /// Appends a statement, retaining its root on behalf of the block.
    pub fn append(&mut self, arena: &mut NodeArena, root: NodeId) {
        arena.retain(root);
        self.treetops.push(TreeTop { root });
    }

    pub(crate) fn push_successor(&mut self, id: BlockId) {
        if !self.successors.contains(&id) {
            self.successors.push(id);
        }
    }

    pub(crate) fn push_predecessor(&mut self, id: BlockId) {
        if !self.predecessors.contains(&id) {
            self.predecessors.push(id);
        }
    }

    /// Operation of the last statement's root, if any.
    pub fn last_op(&self, arena: &NodeArena) -> Option<IlOp> {
        self.treetops.last().map(|top| arena.node(top.root).op)
    }

    /// Whether the block already ends in an unconditional control transfer.
    ///
    /// A conditional branch does not count: it falls through.
    pub fn ends_in_transfer(&self, arena: &NodeArena) -> bool {
        matches!(
            self.last_op(arena),
            Some(
                IlOp::Goto
                    | IlOp::Switch
                    | IlOp::ReturnValue
                    | IlOp::ReturnVoid
                    | IlOp::Throw
            )
        )
    }

    pub(crate) fn release_statements(&mut self, arena: &mut NodeArena) {
        for top in self.treetops.drain(..) {
            arena.release(top.root);
        }
    }
}
