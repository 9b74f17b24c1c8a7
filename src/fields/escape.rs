//! Escaping-load classification.
//!
//! The analyzer's "never read" fact survives only while every observed load of
//! the field is provably inconsequential. Classification is structural: the
//! load's reference count must match exactly the owning edges the IR graph
//! accounts for (any surplus means an unseen holder), and its single real
//! consumer must be one of a short allow-list of pass-through patterns.
//! Everything else is an escape and clears the fact.

use std::collections::{HashMap, HashSet};

use crate::cfg::ControlFlowGraph;
use crate::fields::info::FieldKey;
use crate::ir::{ConvKind, IlOp, NodeArena, NodeId, Payload};
use crate::resolver::{FieldDescriptor, RecognizedMethod};

/// How a single load of a tracked field is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoadUse {
    /// The value never leaves the field's own orbit; `NEVER_READ` survives.
    PassThrough,
    /// Receiver of an allow-listed numeric-wrapper operation whose result
    /// flows back into the field; refines the wrapped-arithmetic assumption.
    Refines(RecognizedMethod),
    /// Any other use; the field counts as read.
    Escaping,
}

/// Reverse edges of one translated method's IR forest.
pub(crate) struct UseSites {
    parents: HashMap<NodeId, Vec<(NodeId, usize)>>,
    roots: HashSet<NodeId>,
}

impl UseSites {
    /// Collects parent edges and statement roots across the whole graph.
    ///
    /// Shared subtrees are walked once via the visited epoch, but every parent
    /// edge is recorded, including the sharing ones.
    pub(crate) fn collect(arena: &mut NodeArena, cfg: &ControlFlowGraph) -> Self {
        let mut parents: HashMap<NodeId, Vec<(NodeId, usize)>> = HashMap::new();
        let mut roots = HashSet::new();
        arena.begin_pass();

        let mut worklist = Vec::new();
        for (_, block) in cfg.blocks_in_order() {
            for top in block.treetops() {
                roots.insert(top.root);
                worklist.push(top.root);
            }
        }
        while let Some(id) = worklist.pop() {
            if !arena.mark_visited(id) {
                continue;
            }
            for (position, &child) in arena.node(id).children.iter().enumerate() {
                parents.entry(child).or_default().push((id, position));
                worklist.push(child);
            }
        }
        UseSites { parents, roots }
    }

    fn all_parents(&self, id: NodeId) -> &[(NodeId, usize)] {
        self.parents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parent edges that consume the value, anchor statements excluded.
    fn consumers<'a>(
        &'a self,
        arena: &'a NodeArena,
        id: NodeId,
    ) -> impl Iterator<Item = (NodeId, usize)> + 'a {
        self.all_parents(id)
            .iter()
            .copied()
            .filter(|&(parent, _)| arena.node(parent).op != IlOp::Anchor)
    }
}

/// Classifies one load of the field identified by `key`.
pub(crate) fn classify_load(
    arena: &NodeArena,
    uses: &UseSites,
    load: NodeId,
    descriptor: &FieldDescriptor,
    key: &FieldKey,
) -> LoadUse {
    // every owning reference must be a graph edge we can see
    let owned_edges = uses.all_parents(load).len() as u32
        + u32::from(uses.roots.contains(&load));
    if arena.refcount(load) != owned_edges {
        return LoadUse::Escaping;
    }

    let consumers: Vec<(NodeId, usize)> = uses.consumers(arena, load).collect();
    let [(parent, position)] = consumers[..] else {
        // zero consumers (anchor only) is a bare keep-alive; more than one is
        // a real read
        return if consumers.is_empty() {
            LoadUse::PassThrough
        } else {
            LoadUse::Escaping
        };
    };

    let parent_node = arena.node(parent);
    match parent_node.op {
        IlOp::Treetop => LoadUse::PassThrough,
        IlOp::FieldStore | IlOp::StaticStore => {
            if is_store_back(arena, parent, position, key) {
                LoadUse::PassThrough
            } else {
                LoadUse::Escaping
            }
        }
        IlOp::ArrayLength if descriptor.is_array() => LoadUse::PassThrough,
        IlOp::ElemLoad | IlOp::ElemStore if descriptor.is_array() && position == 0 => {
            LoadUse::PassThrough
        }
        IlOp::Call => classify_wrapper_call(arena, uses, parent, position, key),
        IlOp::Add | IlOp::Sub | IlOp::Mul => {
            if stores_back_through_narrowing(arena, uses, parent, key) {
                LoadUse::PassThrough
            } else {
                LoadUse::Escaping
            }
        }
        _ => LoadUse::Escaping,
    }
}

/// Whether `store` writes the same field and consumes the value at `position`.
fn is_store_back(arena: &NodeArena, store: NodeId, position: usize, key: &FieldKey) -> bool {
    let node = arena.node(store);
    let value_position = match node.op {
        IlOp::FieldStore => 1,
        IlOp::StaticStore => 0,
        _ => return false,
    };
    position == value_position && store_targets_key(arena, store, key)
}

fn store_targets_key(arena: &NodeArena, store: NodeId, key: &FieldKey) -> bool {
    match &arena.node(store).payload {
        Payload::Field(field) => field
            .target
            .as_ref()
            .is_some_and(|descriptor| &FieldKey::of(descriptor) == key),
        _ => false,
    }
}

/// A call escapes unless it is an allow-listed wrapper operation with the load
/// as receiver, and its result is itself discarded or stored straight back.
fn classify_wrapper_call(
    arena: &NodeArena,
    uses: &UseSites,
    call: NodeId,
    position: usize,
    key: &FieldKey,
) -> LoadUse {
    if position != 0 {
        return LoadUse::Escaping;
    }
    let recognized = match &arena.node(call).payload {
        Payload::Method(method) => method
            .target
            .as_ref()
            .and_then(|descriptor| descriptor.recognized),
        _ => None,
    };
    let Some(recognized) = recognized else {
        return LoadUse::Escaping;
    };

    for (parent, at) in uses.consumers(arena, call) {
        let op = arena.node(parent).op;
        let discarded = op == IlOp::Treetop;
        let stored_back = matches!(op, IlOp::FieldStore | IlOp::StaticStore)
            && is_store_back(arena, parent, at, key);
        if !discarded && !stored_back {
            return LoadUse::Escaping;
        }
    }
    LoadUse::Refines(recognized)
}

/// Whether the arithmetic result at `node` flows into a store back to the same
/// field, optionally through one chain of int-narrowing conversions.
fn stores_back_through_narrowing(
    arena: &NodeArena,
    uses: &UseSites,
    mut node: NodeId,
    key: &FieldKey,
) -> bool {
    loop {
        let consumers: Vec<(NodeId, usize)> = uses.consumers(arena, node).collect();
        let [(parent, position)] = consumers[..] else {
            return false;
        };
        let parent_node = arena.node(parent);
        match parent_node.op {
            IlOp::Conv => {
                let narrows = matches!(
                    parent_node.payload,
                    Payload::Conversion(kind) if ConvKind::narrows_int(kind)
                );
                if !narrows {
                    return false;
                }
                node = parent;
            }
            IlOp::FieldStore | IlOp::StaticStore => {
                return is_store_back(arena, parent, position, key);
            }
            _ => return false,
        }
    }
}
