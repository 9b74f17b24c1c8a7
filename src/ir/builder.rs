//! Expression and statement tree construction.
//!
//! The builder is the context threaded through every translation step: it owns
//! the node arena, the simulated operand stack, the control-flow assembler,
//! and the deoptimization recorder, and it enforces the two ordering protocols
//! the IR depends on.
//!
//! *Side-effect protocol*: before a statement that writes memory is appended,
//! every stack-resident value whose tree reads what the statement is about to
//! write gets anchored as a statement of its own, pinning its evaluation
//! before the write. Without this, commoned subtrees would be evaluated at
//! their (later) first reference and read the overwritten state.
//!
//! *Transition protocol*: before a statement that may hand control to the
//! conservative execution mode is appended, the whole simulated stack is
//! persisted to pending slots and the live slot set is recorded
//! ([`DeoptRecorder`]); sites that fail the cost heuristic are marked
//! [`NodeFlags::CANNOT_RESUME`] instead.

use crate::cfg::{BlockId, ControlFlowAssembler};
use crate::config::DeoptHeuristics;
use crate::ir::arena::{NodeArena, NodeId};
use crate::ir::deopt::{DeoptRecorder, TransitionDecision};
use crate::ir::node::{IlOp, NodeFlags, Payload, ValueType};
use crate::ir::stack::{reconcile, OperandStack, StackValue};
use crate::resolver::MethodDescriptor;
use crate::{Error, Result};

/// What a side-effecting statement is about to write, for the aliasing scan.
enum Effect {
    Field(u16),
    Static(u16),
    Element,
    Local(u16),
    Slot(crate::ir::node::SlotId),
    AnyMemory,
}

/// Builds trees, blocks, and resumption state for one method translation.
pub struct TreeBuilder {
    pub(crate) arena: NodeArena,
    pub(crate) stack: OperandStack,
    pub(crate) assembler: ControlFlowAssembler,
    pub(crate) recorder: DeoptRecorder,
    current: BlockId,
    deopt_recording: bool,
}

impl TreeBuilder {
    /// Creates a builder positioned at the method-entry block.
    pub fn new(heuristics: DeoptHeuristics, deopt_recording: bool) -> Self {
        let assembler = ControlFlowAssembler::new();
        let current = assembler.entry();
        TreeBuilder {
            arena: NodeArena::new(),
            stack: OperandStack::new(),
            assembler,
            recorder: DeoptRecorder::new(heuristics),
            current,
            deopt_recording,
        }
    }

    /// The block statements are currently appended to.
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Switches statement generation to `block`, materializing its
    /// interruptibility checkpoint on first open.
    pub fn open_block(&mut self, block: BlockId) {
        self.assembler.open(&mut self.arena, block);
        self.current = block;
    }

    /// Pushes a value node onto the simulated stack.
    pub fn push(&mut self, node: NodeId) {
        self.stack.push(&mut self.arena, node);
    }

    /// Pops the top stack entry.
    pub fn pop(&mut self, at: usize) -> Result<StackValue> {
        self.stack
            .pop()
            .ok_or(Error::StackUnderflow { offset: at })
    }

    /// Creates a value node and pushes it in one step.
    pub fn push_new(
        &mut self,
        op: IlOp,
        dtype: ValueType,
        children: Vec<NodeId>,
        payload: Payload,
    ) -> NodeId {
        let node = self.arena.create(op, Some(dtype), children, payload);
        self.push(node);
        node
    }

    /// Pops one operand, builds `op` over it, pushes the result.
    pub fn gen_unary(
        &mut self,
        op: IlOp,
        dtype: ValueType,
        payload: Payload,
        at: usize,
    ) -> Result<NodeId> {
        let operand = self.pop(at)?;
        Ok(self.push_new(op, dtype, vec![operand.node], payload))
    }

    /// Pops two operands, builds `op` over them, pushes the result.
    ///
    /// Construction canonicalizes operand order: a constant left operand of a
    /// commutative operation is swapped to the right, so downstream matching
    /// only ever looks for the constant on one side.
    pub fn gen_binary(
        &mut self,
        op: IlOp,
        dtype: ValueType,
        payload: Payload,
        at: usize,
    ) -> Result<NodeId> {
        let rhs = self.pop(at)?;
        let lhs = self.pop(at)?;
        let (left, right) = if op.commutative() && self.arena.node(lhs.node).op == IlOp::Const {
            (rhs.node, lhs.node)
        } else {
            (lhs.node, rhs.node)
        };
        Ok(self.push_new(op, dtype, vec![left, right], payload))
    }

    /// Promotes `root` to a statement and appends it to the current block.
    ///
    /// Value-shaped roots are wrapped in a treetop; statement-shaped roots are
    /// appended as they are. The builder's reference accounting is untouched:
    /// a caller owning a reference to `root` still owns it afterwards.
    ///
    /// `target` is the resolved descriptor for call statements; it feeds the
    /// transition-point cost check.
    pub fn gen_treetop(&mut self, root: NodeId, at: usize, target: Option<&MethodDescriptor>) {
        let op = self.arena.node(root).op;

        if op.has_side_effect() {
            self.anchor_aliasing_residents(root);
        }

        if self.deopt_recording {
            match self
                .recorder
                .classify(op, self.stack.depth(), target)
            {
                TransitionDecision::Record => {
                    let statements = self.stack.save(&mut self.arena, 0, true);
                    for statement in statements {
                        self.assembler.append(&mut self.arena, self.current, statement);
                    }
                    self.recorder.record_liveness(at, &self.stack.shape());
                }
                TransitionDecision::CannotResume => {
                    self.arena
                        .node_mut(root)
                        .flags
                        .insert(NodeFlags::CANNOT_RESUME);
                }
                TransitionDecision::NotCandidate => {}
            }
        }

        let statement = if self.arena.node(root).dtype.is_some() {
            self.arena.retain(root);
            self.arena.create(IlOp::Treetop, None, vec![root], Payload::None)
        } else {
            root
        };
        self.assembler.append(&mut self.arena, self.current, statement);
    }

    /// Disposes of a popped value.
    ///
    /// A tree containing an observable operation survives as a statement;
    /// anything else is released. Values already sequenced as statements
    /// (anchored call results and allocations) are not sequenced twice.
    /// Consumes the caller's reference either way.
    pub fn discard(&mut self, value: StackValue, at: usize) {
        if !self.arena.node(value.node).flags.contains(NodeFlags::ANCHORED)
            && self.subtree_has_observable_op(value.node)
        {
            self.gen_treetop(value.node, at, None);
        }
        self.arena.release(value.node);
    }

    /// Persists the stack ahead of a branch, appending the spill statements to
    /// the current block.
    pub fn persist_for_branch(&mut self) {
        let statements = self.stack.save(&mut self.arena, 0, false);
        for statement in statements {
            self.assembler.append(&mut self.arena, self.current, statement);
        }
    }

    /// Reconciles the current (persisted) stack shape with the block at
    /// `target_offset`.
    ///
    /// The first arriving path records the shape as the block's entry stack;
    /// every later path must match it exactly.
    pub fn reconcile(&mut self, target_offset: usize) -> Result<BlockId> {
        let block = self.assembler.target(target_offset);
        let incoming = self.stack.shape();
        match self.assembler.block(block).entry_shape() {
            None => {
                self.assembler
                    .block_mut(block)
                    .record_entry_shape(incoming);
            }
            Some(recorded) => reconcile(recorded, &incoming, target_offset)?,
        }
        Ok(block)
    }

    /// Tears the builder apart once the walk is done.
    pub(crate) fn finish(self) -> (NodeArena, ControlFlowAssembler, DeoptRecorder) {
        (self.arena, self.assembler, self.recorder)
    }

    /// Anchors every stack-resident value whose tree reads state the statement
    /// at `root` is about to write.
    fn anchor_aliasing_residents(&mut self, root: NodeId) {
        let Some(effect) = self.effect_of(root) else {
            return;
        };
        for down in 0..self.stack.depth() {
            let resident = match self.stack.peek(down) {
                Some(value) => value.node,
                None => break,
            };
            if self.arena.node(resident).flags.contains(NodeFlags::ANCHORED) {
                continue;
            }
            if resident == root || !self.subtree_reads_effect(resident, &effect) {
                continue;
            }
            self.arena.retain(resident);
            let anchor = self
                .arena
                .create(IlOp::Anchor, None, vec![resident], Payload::None);
            self.arena
                .node_mut(resident)
                .flags
                .insert(NodeFlags::ANCHORED);
            self.assembler.append(&mut self.arena, self.current, anchor);
        }
    }

    fn effect_of(&self, root: NodeId) -> Option<Effect> {
        let node = self.arena.node(root);
        match node.op {
            IlOp::FieldStore => match &node.payload {
                Payload::Field(field) => Some(Effect::Field(field.index)),
                _ => None,
            },
            IlOp::StaticStore => match &node.payload {
                Payload::Field(field) => Some(Effect::Static(field.index)),
                _ => None,
            },
            IlOp::ElemStore => Some(Effect::Element),
            IlOp::LocalStore => match &node.payload {
                Payload::Local(index) => Some(Effect::Local(*index)),
                _ => None,
            },
            IlOp::SlotStore => match &node.payload {
                Payload::Slot(slot) => Some(Effect::Slot(*slot)),
                _ => None,
            },
            IlOp::Call | IlOp::MonitorEnter | IlOp::MonitorExit | IlOp::Throw => {
                Some(Effect::AnyMemory)
            }
            _ => None,
        }
    }

    fn subtree_reads_effect(&mut self, value: NodeId, effect: &Effect) -> bool {
        self.arena.begin_pass();
        let mut worklist = vec![value];
        while let Some(id) = worklist.pop() {
            if !self.arena.mark_visited(id) {
                continue;
            }
            let node = self.arena.node(id);
            let reads = match (effect, node.op) {
                (Effect::Field(index), IlOp::FieldLoad) => {
                    matches!(&node.payload, Payload::Field(field) if field.index == *index)
                }
                (Effect::Static(index), IlOp::StaticLoad) => {
                    matches!(&node.payload, Payload::Field(field) if field.index == *index)
                }
                (Effect::Element, IlOp::ElemLoad) => true,
                (Effect::Local(index), IlOp::LocalLoad) => {
                    matches!(&node.payload, Payload::Local(local) if local == index)
                }
                (Effect::Slot(slot), IlOp::SlotLoad) => {
                    matches!(&node.payload, Payload::Slot(s) if s == slot)
                }
                (Effect::AnyMemory, IlOp::FieldLoad | IlOp::StaticLoad | IlOp::ElemLoad) => true,
                _ => false,
            };
            if reads {
                return true;
            }
            worklist.extend(node.children.iter().copied());
        }
        false
    }

    fn subtree_has_observable_op(&mut self, value: NodeId) -> bool {
        self.arena.begin_pass();
        let mut worklist = vec![value];
        while let Some(id) = worklist.pop() {
            if !self.arena.mark_visited(id) {
                continue;
            }
            let node = self.arena.node(id);
            if node.flags.contains(NodeFlags::ANCHORED) {
                continue;
            }
            if node.op.observable() {
                return true;
            }
            worklist.extend(node.children.iter().copied());
        }
        false
    }
}
