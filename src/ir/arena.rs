//! Arena storage for IR nodes.
//!
//! Shared ("commoned") nodes are modeled as reference-counted arena slots
//! rather than language-level aliasing: a node referenced by N consumers has N
//! owning edges (stack entries, parent child links, statement roots) recorded
//! in one counter. The counting protocol is strict ownership transfer:
//!
//! - [`NodeArena::create`] returns the node at refcount zero and *consumes* one
//!   owned reference per child passed in (the edge moves from the caller to the
//!   new parent).
//! - [`NodeArena::retain`] adds an owned reference; pushing to the simulated
//!   operand stack and appending a statement root both retain.
//! - Popping the stack transfers the stack's reference to the caller without
//!   touching the counter; a holder that keeps a value alive *in addition* to
//!   the stack must retain explicitly.
//! - [`NodeArena::release`] gives up one owned reference; at zero the slot is
//!   freed and the node's child edges are released in cascade.
//!
//! Under this protocol the retain and release totals agree for any node graph
//! that has been fully discarded, which is the conservation invariant the
//! translation tests check.
//!
//! Traversal under sharing uses a monotonically increasing epoch stamped per
//! node instead of mutable visited sets; [`NodeArena::begin_pass`] bumps the
//! epoch, making repeated walks from different statement roots idempotent
//! within one pass.

use crate::ir::node::{IlOp, NodeFlags, Payload, ValueType};

/// Handle to a node in a [`NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One IR node.
#[derive(Clone, Debug)]
pub struct IrNode {
    /// The operation.
    pub op: IlOp,
    /// Result value category, `None` for statements.
    pub dtype: Option<ValueType>,
    /// Ordered operand edges.
    pub children: Vec<NodeId>,
    /// Operation-specific payload.
    pub payload: Payload,
    /// Speculation and bookkeeping marks.
    pub flags: NodeFlags,
    refcount: u32,
    visited: u64,
}

impl IrNode {
    /// Number of owned references currently held on this node.
    pub fn refcount(&self) -> u32 {
        self.refcount
    }
}

enum Slot {
    Occupied(IrNode),
    Free(Option<u32>),
}

/// Arena owning every node of one translation pass.
pub struct NodeArena {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    epoch: u64,
    live: usize,
    retains: u64,
    releases: u64,
}

impl NodeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        NodeArena {
            slots: Vec::new(),
            free_head: None,
            epoch: 0,
            live: 0,
            retains: 0,
            releases: 0,
        }
    }

    /// Allocates a node at refcount zero, consuming one owned reference per
    /// child.
    pub fn create(
        &mut self,
        op: IlOp,
        dtype: Option<ValueType>,
        children: Vec<NodeId>,
        payload: Payload,
    ) -> NodeId {
        let node = IrNode {
            op,
            dtype,
            children,
            payload,
            flags: NodeFlags::empty(),
            refcount: 0,
            visited: 0,
        };
        self.live += 1;
        match self.free_head {
            Some(index) => {
                let next = match self.slots[index as usize] {
                    Slot::Free(next) => next,
                    Slot::Occupied(_) => unreachable!(),
                };
                self.free_head = next;
                self.slots[index as usize] = Slot::Occupied(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Adds one owned reference.
    pub fn retain(&mut self, id: NodeId) {
        self.retains += 1;
        self.occupied_mut(id).refcount += 1;
    }

    /// Gives up one owned reference; frees the node and cascades into its
    /// children when the count reaches zero.
    ///
    /// # Panics
    /// Panics on a reference-count underflow, which indicates a broken
    /// ownership transfer somewhere in the caller.
    pub fn release(&mut self, id: NodeId) {
        let mut worklist = vec![id];
        while let Some(id) = worklist.pop() {
            self.releases += 1;
            let node = self.occupied_mut(id);
            assert!(node.refcount > 0, "refcount underflow on {id}");
            node.refcount -= 1;
            if node.refcount == 0 {
                let children = std::mem::take(&mut node.children);
                self.slots[id.index()] = Slot::Free(self.free_head);
                self.free_head = Some(id.0);
                self.live -= 1;
                worklist.extend(children);
            }
        }
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> &IrNode {
        match &self.slots[id.index()] {
            Slot::Occupied(node) => node,
            Slot::Free(_) => panic!("use of released node {id}"),
        }
    }

    /// Mutably borrows a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut IrNode {
        self.occupied_mut(id)
    }

    /// Current owned-reference count of a node.
    pub fn refcount(&self, id: NodeId) -> u32 {
        self.node(id).refcount
    }

    /// Starts a new traversal pass and returns its epoch.
    ///
    /// Visited marks stamped in earlier passes become stale wholesale; no
    /// per-node clearing happens.
    pub fn begin_pass(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Stamps the node with the current epoch.
    ///
    /// Returns `true` on the first visit within the current pass, `false` on
    /// every revisit through another sharing edge.
    pub fn mark_visited(&mut self, id: NodeId) -> bool {
        let epoch = self.epoch;
        let node = self.occupied_mut(id);
        if node.visited == epoch {
            false
        } else {
            node.visited = epoch;
            true
        }
    }

    /// Whether the node has been visited in the current pass.
    pub fn was_visited(&self, id: NodeId) -> bool {
        self.node(id).visited == self.epoch
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Total owned references handed out.
    pub fn retains(&self) -> u64 {
        self.retains
    }

    /// Total owned references given up.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    fn occupied_mut(&mut self, id: NodeId) -> &mut IrNode {
        match &mut self.slots[id.index()] {
            Slot::Occupied(node) => node,
            Slot::Free(_) => panic!("use of released node {id}"),
        }
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        NodeArena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_const(arena: &mut NodeArena, value: i32) -> NodeId {
        arena.create(
            IlOp::Const,
            Some(ValueType::Int),
            Vec::new(),
            Payload::Int(value),
        )
    }

    #[test]
    fn create_starts_at_zero_references() {
        let mut arena = NodeArena::new();
        let node = int_const(&mut arena, 1);
        assert_eq!(arena.refcount(node), 0);
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    fn release_cascades_into_children() {
        let mut arena = NodeArena::new();
        let lhs = int_const(&mut arena, 1);
        let rhs = int_const(&mut arena, 2);
        arena.retain(lhs);
        arena.retain(rhs);

        let add = arena.create(
            IlOp::Add,
            Some(ValueType::Int),
            vec![lhs, rhs],
            Payload::None,
        );
        arena.retain(add);
        assert_eq!(arena.live_count(), 3);

        arena.release(add);
        assert_eq!(arena.live_count(), 0);
        assert_eq!(arena.retains(), arena.releases());
    }

    #[test]
    fn shared_child_survives_one_parent() {
        let mut arena = NodeArena::new();
        let shared = int_const(&mut arena, 7);
        arena.retain(shared);
        arena.retain(shared); // second consumer

        let neg = arena.create(IlOp::Neg, Some(ValueType::Int), vec![shared], Payload::None);
        arena.retain(neg);

        arena.release(neg);
        assert_eq!(arena.live_count(), 1);
        assert_eq!(arena.refcount(shared), 1);

        arena.release(shared);
        assert_eq!(arena.live_count(), 0);
        assert_eq!(arena.retains(), arena.releases());
    }

    #[test]
    fn slots_are_reused_after_free() {
        let mut arena = NodeArena::new();
        let first = int_const(&mut arena, 1);
        arena.retain(first);
        arena.release(first);

        let second = int_const(&mut arena, 2);
        assert_eq!(first, second); // same slot recycled
        assert_eq!(arena.live_count(), 1);
    }

    #[test]
    #[should_panic(expected = "refcount underflow")]
    fn underflow_panics() {
        let mut arena = NodeArena::new();
        let node = int_const(&mut arena, 1);
        arena.release(node);
    }

    #[test]
    fn visited_marks_are_per_pass() {
        let mut arena = NodeArena::new();
        let node = int_const(&mut arena, 1);
        arena.retain(node);

        arena.begin_pass();
        assert!(arena.mark_visited(node));
        assert!(!arena.mark_visited(node));
        assert!(arena.was_visited(node));

        arena.begin_pass();
        assert!(!arena.was_visited(node));
        assert!(arena.mark_visited(node));
    }
}
