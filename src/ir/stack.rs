//! Simulated operand stack.
//!
//! Translation walks the bytecode with a compile-time model of the JVM operand
//! stack: pushes and pops move IR node handles instead of runtime values.
//! Duplication bytecodes do not copy trees, they push the same node a second
//! time, which is where expression commoning comes from.
//!
//! The stack participates in the arena ownership protocol
//! ([`crate::ir::arena`]): [`OperandStack::push`] retains the node on behalf of
//! the stack, [`OperandStack::pop`] transfers that reference to the caller
//! without touching the counter.
//!
//! Values survive control-flow edges and transition points only in persisted
//! form: [`OperandStack::save`] spills entries to depth-numbered pending slots
//! and replaces each with a load of its slot, so every path into a label
//! observes the same slot-indexed shape. A per-slot memo of the last value
//! persisted makes repeated saves cheap: a slot whose resident value has not
//! changed gets no second store, only (on request) an anchor statement that
//! pins its evaluation before the current point.
//!
//! Category-2 values (long, double) occupy a single simulated entry. The
//! word-oriented shuffling bytecodes (`dup2`, `pop2`, ...) account for their
//! two-word width explicitly; an operation that would split a two-word value
//! in half reports the method as malformed.

use crate::ir::arena::{NodeArena, NodeId};
use crate::ir::node::{IlOp, NodeFlags, Payload, SlotId, ValueType};
use crate::{Error, Result};

/// One simulated stack entry.
#[derive(Clone, Copy, Debug)]
pub struct StackValue {
    /// The IR node computing the value.
    pub node: NodeId,
    /// Its value category.
    pub dtype: ValueType,
}

/// Recorded slot and type of one persisted stack entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingSlot {
    /// The persisted slot, numbered by stack depth from the bottom.
    pub slot: SlotId,
    /// Value category stored in the slot.
    pub dtype: ValueType,
}

/// Stack shape at a program point, bottom entry first.
pub type StackShape = Vec<PendingSlot>;

/// Checks an incoming stack shape against the shape recorded at a target.
pub fn reconcile(recorded: &StackShape, incoming: &StackShape, target: usize) -> Result<()> {
    if recorded.len() != incoming.len() {
        return Err(Error::StackShapeMismatch {
            target,
            message: format!(
                "depth {} arrived where depth {} was recorded",
                incoming.len(),
                recorded.len()
            ),
        });
    }
    for (expected, found) in recorded.iter().zip(incoming) {
        if expected.dtype != found.dtype {
            return Err(Error::StackShapeMismatch {
                target,
                message: format!(
                    "slot {} holds {:?} where {:?} was recorded",
                    expected.slot.0, found.dtype, expected.dtype
                ),
            });
        }
    }
    Ok(())
}

/// The compile-time operand stack.
#[derive(Default)]
pub struct OperandStack {
    entries: Vec<StackValue>,
    /// Last value stored to each pending slot, indexed by slot number.
    ///
    /// Held without a retain: the slot-store statement appended when the
    /// value was persisted keeps the node alive for the rest of the pass.
    persisted: Vec<Option<NodeId>>,
}

impl OperandStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        OperandStack {
            entries: Vec::new(),
            persisted: Vec::new(),
        }
    }

    /// Current depth in entries (not words).
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes a value node, retaining it on behalf of the stack.
    ///
    /// # Panics
    /// Panics when handed a statement node, which has no value category.
    pub fn push(&mut self, arena: &mut NodeArena, node: NodeId) {
        let dtype = match arena.node(node).dtype {
            Some(dtype) => dtype,
            None => panic!("pushed statement node {node}"),
        };
        arena.retain(node);
        self.entries.push(StackValue { node, dtype });
    }

    /// Pops the top entry, transferring the stack's reference to the caller.
    pub fn pop(&mut self) -> Option<StackValue> {
        self.entries.pop()
    }

    /// Reads the entry `down` positions below the top without popping.
    pub fn peek(&self, down: usize) -> Option<StackValue> {
        let len = self.entries.len();
        if down < len {
            Some(self.entries[len - 1 - down])
        } else {
            None
        }
    }

    /// The current shape: one depth-numbered slot per entry, bottom first.
    pub fn shape(&self) -> StackShape {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| PendingSlot {
                slot: SlotId(index as u16),
                dtype: entry.dtype,
            })
            .collect()
    }

    /// Pops whole entries covering exactly `words` stack words, bottom entry
    /// first. Backs the untyped `pop`/`pop2` bytecodes.
    pub fn pop_words(&mut self, words: usize, at: usize) -> Result<Vec<StackValue>> {
        let start = self.span_below(self.entries.len(), words, at)?;
        Ok(self.entries.split_off(start))
    }

    /// `dup`: duplicates the top word.
    pub fn dup(&mut self, arena: &mut NodeArena, at: usize) -> Result<()> {
        self.shuffle(arena, at, 1, 0)
    }

    /// `dup_x1`: duplicates the top word below the next word.
    pub fn dup_x1(&mut self, arena: &mut NodeArena, at: usize) -> Result<()> {
        self.shuffle(arena, at, 1, 1)
    }

    /// `dup_x2`: duplicates the top word below the next two words.
    pub fn dup_x2(&mut self, arena: &mut NodeArena, at: usize) -> Result<()> {
        self.shuffle(arena, at, 1, 2)
    }

    /// `dup2`: duplicates the top two words.
    pub fn dup2(&mut self, arena: &mut NodeArena, at: usize) -> Result<()> {
        self.shuffle(arena, at, 2, 0)
    }

    /// `dup2_x1`: duplicates the top two words below the next word.
    pub fn dup2_x1(&mut self, arena: &mut NodeArena, at: usize) -> Result<()> {
        self.shuffle(arena, at, 2, 1)
    }

    /// `dup2_x2`: duplicates the top two words below the next two words.
    pub fn dup2_x2(&mut self, arena: &mut NodeArena, at: usize) -> Result<()> {
        self.shuffle(arena, at, 2, 2)
    }

    /// `swap`: exchanges the top two one-word entries.
    pub fn swap(&mut self, at: usize) -> Result<()> {
        let len = self.entries.len();
        if len < 2 {
            return Err(Error::StackUnderflow { offset: at });
        }
        if self.entries[len - 1].dtype.is_category2()
            || self.entries[len - 2].dtype.is_category2()
        {
            return Err(malformed_error!("swap of a two-word value at byte {at}"));
        }
        self.entries.swap(len - 1, len - 2);
        Ok(())
    }

    /// Persists every entry at depth `from_depth` or above to its pending
    /// slot, returning the statements to append before the current point.
    ///
    /// A slot whose resident value was already persisted there gets no second
    /// store. When `anchor_unchanged` is set, such an entry instead gets an
    /// anchor statement pinning its evaluation before this point, unless the
    /// value carries [`NodeFlags::ANCHORED`] from an earlier anchor.
    ///
    /// Persisted entries are replaced on the stack by loads of their slots, so
    /// the fall-through path and any branch target agree on the persisted
    /// shape.
    pub fn save(
        &mut self,
        arena: &mut NodeArena,
        from_depth: usize,
        anchor_unchanged: bool,
    ) -> Vec<NodeId> {
        let mut statements = Vec::new();
        for index in from_depth..self.entries.len() {
            let entry = self.entries[index];
            let slot = SlotId(index as u16);
            if self.persisted.len() <= index {
                self.persisted.resize(index + 1, None);
            }

            let unchanged = self.persisted[index] == Some(entry.node) || {
                let node = arena.node(entry.node);
                node.op == IlOp::SlotLoad && matches!(node.payload, Payload::Slot(s) if s == slot)
            };
            if unchanged {
                if anchor_unchanged && !arena.node(entry.node).flags.contains(NodeFlags::ANCHORED)
                {
                    arena.retain(entry.node);
                    let anchor =
                        arena.create(IlOp::Anchor, None, vec![entry.node], Payload::None);
                    arena.node_mut(entry.node).flags.insert(NodeFlags::ANCHORED);
                    statements.push(anchor);
                }
                continue;
            }

            // a resident load of this slot evaluated after the store would read
            // the new value; pin its evaluation first
            for other in 0..self.entries.len() {
                if other == index {
                    continue;
                }
                let resident = self.entries[other].node;
                let stale_load = {
                    let node = arena.node(resident);
                    node.op == IlOp::SlotLoad
                        && matches!(node.payload, Payload::Slot(s) if s == slot)
                        && !node.flags.contains(NodeFlags::ANCHORED)
                };
                if stale_load {
                    arena.retain(resident);
                    let anchor = arena.create(IlOp::Anchor, None, vec![resident], Payload::None);
                    arena.node_mut(resident).flags.insert(NodeFlags::ANCHORED);
                    statements.push(anchor);
                }
            }

            // the stack's reference to the value moves into the store
            let store = arena.create(
                IlOp::SlotStore,
                None,
                vec![entry.node],
                Payload::Slot(slot),
            );
            self.persisted[index] = Some(entry.node);
            let load = arena.create(
                IlOp::SlotLoad,
                Some(entry.dtype),
                Vec::new(),
                Payload::Slot(slot),
            );
            arena.retain(load);
            self.entries[index].node = load;
            statements.push(store);
        }
        statements
    }

    /// Refills an empty stack from a recorded shape with pending-slot loads.
    pub fn restore(&mut self, arena: &mut NodeArena, shape: &StackShape) {
        debug_assert!(self.entries.is_empty(), "restore over live entries");
        for pending in shape {
            let load = arena.create(
                IlOp::SlotLoad,
                Some(pending.dtype),
                Vec::new(),
                Payload::Slot(pending.slot),
            );
            arena.retain(load);
            self.entries.push(StackValue {
                node: load,
                dtype: pending.dtype,
            });
        }
    }

    /// Releases and drops every entry. Used when control leaves the method.
    pub fn discard_all(&mut self, arena: &mut NodeArena) {
        for entry in self.entries.drain(..) {
            arena.release(entry.node);
        }
    }

    /// Duplicates the span of `dup_words` top words below the span of
    /// `skip_words` words under it, retaining each duplicated entry.
    fn shuffle(
        &mut self,
        arena: &mut NodeArena,
        at: usize,
        dup_words: usize,
        skip_words: usize,
    ) -> Result<()> {
        let len = self.entries.len();
        let dup_start = self.span_below(len, dup_words, at)?;
        let skip_start = self.span_below(dup_start, skip_words, at)?;

        let duplicated: Vec<StackValue> = self.entries[dup_start..len].to_vec();
        for value in &duplicated {
            arena.retain(value.node);
        }
        let tail = self.entries.split_off(skip_start);
        self.entries.extend(duplicated);
        self.entries.extend(tail);
        Ok(())
    }

    /// Finds where a span of `words` stack words ending at entry index `from`
    /// begins.
    fn span_below(&self, from: usize, words: usize, at: usize) -> Result<usize> {
        let mut index = from;
        let mut remaining = words;
        while remaining > 0 {
            if index == 0 {
                return Err(Error::StackUnderflow { offset: at });
            }
            index -= 1;
            let width = if self.entries[index].dtype.is_category2() {
                2
            } else {
                1
            };
            if width > remaining {
                return Err(malformed_error!(
                    "stack shuffle at byte {at} splits a two-word value"
                ));
            }
            remaining -= width;
        }
        Ok(index)
    }
}
