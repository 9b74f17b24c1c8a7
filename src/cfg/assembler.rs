//! Branch-target discovery and block linking.
//!
//! During the linear walk the assembler only collects facts: which offsets
//! start blocks, which blocks are reached by branches, which targets sit at or
//! before their branching instruction. [`ControlFlowAssembler::join`] then
//! links the discovered blocks in address order into a finished
//! [`ControlFlowGraph`], making every fallthrough an explicit jump.

use std::collections::HashMap;

use crate::cfg::block::{Block, BlockFlags, BlockId};
use crate::ir::arena::{NodeArena, NodeId};
use crate::ir::node::{IlOp, Payload};

/// Collects blocks and edges during translation.
pub struct ControlFlowAssembler {
    blocks: Vec<Block>,
    by_start: HashMap<usize, BlockId>,
}

impl ControlFlowAssembler {
    /// Creates an assembler with the method-entry block at offset zero.
    pub fn new() -> Self {
        let mut by_start = HashMap::new();
        by_start.insert(0, BlockId(0));
        ControlFlowAssembler {
            blocks: vec![Block::new(0, BlockFlags::empty())],
            by_start,
        }
    }

    /// The method-entry block.
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Idempotently registers `offset` as a block boundary.
    ///
    /// Repeated calls return the same handle; the block's entry-stack
    /// reconciliation happens elsewhere, exactly once per arriving path.
    pub fn target(&mut self, offset: usize) -> BlockId {
        if let Some(&id) = self.by_start.get(&offset) {
            self.blocks[id.index()]
                .flags_mut()
                .insert(BlockFlags::IS_TARGET);
            return id;
        }
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(offset, BlockFlags::IS_TARGET));
        self.by_start.insert(offset, id);
        id
    }

    /// Registers a target of a backward branch.
    ///
    /// Loops must stay preemptible, so the block runs an interruptibility
    /// checkpoint before its first real statement.
    pub fn mark_backward_target(&mut self, offset: usize) -> BlockId {
        let id = self.target(offset);
        self.blocks[id.index()]
            .flags_mut()
            .insert(BlockFlags::NEEDS_CHECKPOINT);
        id
    }

    /// The block starting at `offset`, if one was registered.
    pub fn block_at(&self, offset: usize) -> Option<BlockId> {
        self.by_start.get(&offset).copied()
    }

    /// Borrows a block.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Mutably borrows a block.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Opens a block for statement generation.
    ///
    /// The first open materializes the interruptibility checkpoint of a
    /// backward-branch target; later opens are no-ops.
    pub fn open(&mut self, arena: &mut NodeArena, id: BlockId) {
        let block = &mut self.blocks[id.index()];
        if block.flags().contains(BlockFlags::GENERATED) {
            return;
        }
        block.flags_mut().insert(BlockFlags::GENERATED);
        if block.flags().contains(BlockFlags::NEEDS_CHECKPOINT) {
            let check = arena.create(IlOp::AsyncCheck, None, Vec::new(), Payload::None);
            block.append(arena, check);
        }
    }

    /// Appends a statement to a block.
    pub fn append(&mut self, arena: &mut NodeArena, id: BlockId, root: NodeId) {
        self.blocks[id.index()].append(arena, root);
    }

    /// Records a branch edge discovered during the walk.
    pub fn edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].push_successor(to);
        self.blocks[to.index()].push_predecessor(from);
    }

    /// Links the discovered blocks in address order into a finished graph.
    ///
    /// A block that runs into its address-order successor gets an explicit
    /// jump. When such a block ends in a conditional branch and the next block
    /// is also a jump target reached from elsewhere, the jump lands in a
    /// synthetic block of its own, keeping "fell through" and "jumped in"
    /// paths distinguishable.
    pub fn join(mut self, arena: &mut NodeArena) -> ControlFlowGraph {
        let mut order: Vec<BlockId> = (0..self.blocks.len() as u32).map(BlockId).collect();
        order.sort_by_key(|id| self.blocks[id.index()].start());

        let mut linked = Vec::with_capacity(order.len());
        for position in 0..order.len() {
            let current = order[position];
            linked.push(current);
            let Some(&next) = order.get(position + 1) else {
                continue;
            };
            if self.blocks[current.index()].ends_in_transfer(arena) {
                continue;
            }

            let next_start = self.blocks[next.index()].start();
            let conditional = self.blocks[current.index()].last_op(arena) == Some(IlOp::IfCmp);
            let jumped_in_from_elsewhere = self.blocks[next.index()]
                .flags()
                .contains(BlockFlags::IS_TARGET)
                && self.blocks[next.index()]
                    .predecessors()
                    .iter()
                    .any(|&pred| pred != current);

            // a block ends in at most one transfer: a conditional keeps its
            // not-taken path as a plain edge, and only routes through a
            // synthetic landing pad when the target is shared with other jumps
            if conditional && jumped_in_from_elsewhere {
                let synthetic = BlockId(self.blocks.len() as u32);
                self.blocks.push(Block::new(
                    next_start,
                    BlockFlags::SYNTHETIC | BlockFlags::GENERATED,
                ));
                let goto = arena.create(IlOp::Goto, None, Vec::new(), Payload::Target(next_start));
                self.blocks[synthetic.index()].append(arena, goto);
                self.edge(current, synthetic);
                self.edge(synthetic, next);
                linked.push(synthetic);
            } else if conditional {
                self.edge(current, next);
            } else {
                let goto = arena.create(IlOp::Goto, None, Vec::new(), Payload::Target(next_start));
                self.blocks[current.index()].append(arena, goto);
                self.edge(current, next);
            }
        }

        ControlFlowGraph {
            blocks: self.blocks,
            order: linked,
            entry: BlockId(0),
        }
    }
}

impl Default for ControlFlowAssembler {
    fn default() -> Self {
        ControlFlowAssembler::new()
    }
}

/// The finished graph of linked blocks, in execution-address order.
pub struct ControlFlowGraph {
    blocks: Vec<Block>,
    order: Vec<BlockId>,
    entry: BlockId,
}

impl ControlFlowGraph {
    /// The method-entry block.
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Number of blocks, synthetic ones included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the graph has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Borrows a block.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Blocks in address order, synthetic fallthrough blocks in place.
    pub fn blocks_in_order(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.order.iter().map(|&id| (id, &self.blocks[id.index()]))
    }

    /// Releases every statement in the graph, returning the nodes to the
    /// arena. After this the graph is empty shell state.
    pub fn discard(&mut self, arena: &mut NodeArena) {
        for block in &mut self.blocks {
            block.release_statements(arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::{BranchSpec, Condition, ValueType};

    fn append_return(assembler: &mut ControlFlowAssembler, arena: &mut NodeArena, id: BlockId) {
        let ret = arena.create(IlOp::ReturnVoid, None, Vec::new(), Payload::None);
        assembler.append(arena, id, ret);
    }

    fn append_conditional(
        assembler: &mut ControlFlowAssembler,
        arena: &mut NodeArena,
        id: BlockId,
        target: usize,
    ) {
        let lhs = arena.create(
            IlOp::Const,
            Some(ValueType::Int),
            Vec::new(),
            Payload::Int(0),
        );
        arena.retain(lhs);
        let rhs = arena.create(
            IlOp::LocalLoad,
            Some(ValueType::Int),
            Vec::new(),
            Payload::Local(0),
        );
        arena.retain(rhs);
        let branch = arena.create(
            IlOp::IfCmp,
            None,
            vec![lhs, rhs],
            Payload::Branch(BranchSpec {
                cond: Condition::Eq,
                target,
            }),
        );
        assembler.append(arena, id, branch);
    }

    #[test]
    fn test_target_is_idempotent() {
        let mut assembler = ControlFlowAssembler::new();
        let first = assembler.target(8);
        let second = assembler.target(8);
        assert_eq!(first, second);
        assert_eq!(assembler.block_at(8), Some(first));
        assert!(assembler
            .block(first)
            .flags()
            .contains(BlockFlags::IS_TARGET));
        // entry plus the one registered target
        assert_eq!(assembler.target(0), assembler.entry());
    }

    #[test]
    fn test_backward_target_gets_one_checkpoint() {
        let mut arena = NodeArena::new();
        let mut assembler = ControlFlowAssembler::new();
        let loop_head = assembler.mark_backward_target(4);

        assembler.open(&mut arena, loop_head);
        assembler.open(&mut arena, loop_head);

        let block = assembler.block(loop_head);
        assert_eq!(block.treetops().len(), 1);
        assert_eq!(block.last_op(&arena), Some(IlOp::AsyncCheck));
        assert!(block.flags().contains(BlockFlags::GENERATED));
    }

    #[test]
    fn test_join_makes_fallthrough_explicit() {
        let mut arena = NodeArena::new();
        let mut assembler = ControlFlowAssembler::new();
        let entry = assembler.entry();
        let tail = assembler.target(6);
        append_return(&mut assembler, &mut arena, tail);

        let mut graph = assembler.join(&mut arena);

        let entry_block = graph.block(entry);
        assert_eq!(entry_block.last_op(&arena), Some(IlOp::Goto));
        assert_eq!(entry_block.successors(), &[tail]);
        match &arena.node(entry_block.treetops()[0].root).payload {
            Payload::Target(offset) => assert_eq!(*offset, 6),
            other => panic!("expected a jump target payload, got {other:?}"),
        }

        graph.discard(&mut arena);
        assert_eq!(arena.live_count(), 0);
        assert_eq!(arena.retains(), arena.releases());
    }

    #[test]
    fn test_join_inserts_synthetic_block_for_ambiguous_fallthrough() {
        let mut arena = NodeArena::new();
        let mut assembler = ControlFlowAssembler::new();
        let entry = assembler.entry();
        let shared = assembler.target(4);
        let far = assembler.target(10);

        // the far block branches back to the shared target
        append_conditional(&mut assembler, &mut arena, entry, 10);
        assembler.edge(entry, far);
        append_return(&mut assembler, &mut arena, shared);
        append_return(&mut assembler, &mut arena, far);
        assembler.edge(far, shared);

        let mut graph = assembler.join(&mut arena);
        assert_eq!(graph.len(), 4);

        let order: Vec<BlockId> = graph.blocks_in_order().map(|(id, _)| id).collect();
        let synthetic = order[1];
        let block = graph.block(synthetic);
        assert!(block.flags().contains(BlockFlags::SYNTHETIC));
        assert_eq!(block.start(), 4);
        assert_eq!(block.treetops().len(), 1);
        assert_eq!(block.last_op(&arena), Some(IlOp::Goto));
        assert_eq!(graph.block(entry).successors(), &[far, synthetic]);
        assert_eq!(block.successors(), &[shared]);

        graph.discard(&mut arena);
        assert_eq!(arena.live_count(), 0);
        assert_eq!(arena.retains(), arena.releases());
    }

    #[test]
    fn test_join_keeps_conditional_fallthrough_as_a_plain_edge() {
        let mut arena = NodeArena::new();
        let mut assembler = ControlFlowAssembler::new();
        let entry = assembler.entry();
        let taken = assembler.target(10);
        let fallthrough = assembler.target(4);

        append_conditional(&mut assembler, &mut arena, entry, 10);
        assembler.edge(entry, taken);
        append_return(&mut assembler, &mut arena, fallthrough);
        append_return(&mut assembler, &mut arena, taken);

        let mut graph = assembler.join(&mut arena);
        assert_eq!(graph.len(), 3);

        // no trailing goto: the conditional is the block's only transfer
        let block = graph.block(entry);
        assert_eq!(block.treetops().len(), 1);
        assert_eq!(block.last_op(&arena), Some(IlOp::IfCmp));
        assert_eq!(block.successors(), &[taken, fallthrough]);

        graph.discard(&mut arena);
        assert_eq!(arena.live_count(), 0);
        assert_eq!(arena.retains(), arena.releases());
    }

    #[test]
    fn test_blocks_come_out_in_address_order() {
        let mut arena = NodeArena::new();
        let mut assembler = ControlFlowAssembler::new();
        let entry = assembler.entry();
        let late = assembler.target(20);
        let early = assembler.target(5);
        append_return(&mut assembler, &mut arena, entry);
        append_return(&mut assembler, &mut arena, early);
        append_return(&mut assembler, &mut arena, late);

        let graph = assembler.join(&mut arena);
        let starts: Vec<usize> = graph.blocks_in_order().map(|(_, b)| b.start()).collect();
        assert_eq!(starts, vec![0, 5, 20]);
    }
}
