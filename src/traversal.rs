//! Phase-1 traversal strategies.
//!
//! A traversal is seeded with one or more roots and drains scheduled nodes
//! in nondecreasing rank order. Because a derived node's rank strictly
//! exceeds every parent's rank, visiting by rank guarantees that all of a
//! node's parents are final before it recomputes; a node reachable through
//! two paths (a diamond) is scheduled twice but inserted once, so it
//! recomputes exactly once per commit.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::schedule::RankBucket;
use crate::NodeRef;

pub(crate) trait Traversal {
    /// Queues `node` for a later send-down. Idempotent: scheduling an
    /// already scheduled node is a no-op.
    fn schedule(&mut self, node: &NodeRef);
    /// Drains the schedule, sending scheduled nodes down in nondecreasing
    /// rank order.
    fn visit(&mut self);
}

/// Plain recursive send-down, no scheduling.
///
/// Cheaper for chain- and tree-shaped graphs, but a diamond-merged node
/// recomputes once per path that reaches it.
pub(crate) struct DfsTraversal {
    root: NodeRef,
}

impl DfsTraversal {
    pub(crate) fn new(root: NodeRef) -> Self {
        Self { root }
    }
}

impl Traversal for DfsTraversal {
    fn schedule(&mut self, _node: &NodeRef) {}

    fn visit(&mut self) {
        self.root.send_down();
    }
}

/// Rank-ordered traversal over a map of rank buckets.
///
/// The map is keyed by rank; each bucket carries the scheduled nodes of
/// that rank. Nodes and buckets both carry membership hooks, so `schedule`
/// is a pair of flag tests in the common case and never allocates per
/// node — bucket storage is owned by the graph and recycled across
/// commits.
pub(crate) struct TopoTraversal {
    rank_map: BTreeMap<usize, Rc<RankBucket>>,
    /// Scratch buffer the current lowest bucket is drained into.
    frontier: Vec<NodeRef>,
}

impl TopoTraversal {
    pub(crate) fn new(root: &NodeRef) -> Self {
        let mut traversal = Self {
            rank_map: BTreeMap::new(),
            frontier: Vec::new(),
        };
        traversal.schedule(root);
        traversal
    }
}

impl Traversal for TopoTraversal {
    fn schedule(&mut self, node: &NodeRef) {
        if node.schedule_hook().get() {
            // already linked into some bucket of this traversal
            return;
        }
        let bucket = node.rank_bucket();
        let slot = match self.rank_map.entry(bucket.rank()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                bucket.set_linked(true);
                entry.insert(bucket.clone())
            }
        };
        tracing::trace!(rank = bucket.rank(), "schedule");
        node.schedule_hook().set(true);
        slot.push(node.clone());
    }

    fn visit(&mut self) {
        while let Some((rank, bucket)) = self.rank_map.pop_first() {
            let _span = tracing::debug_span!("visit_rank", rank).entered();
            bucket.set_linked(false);
            let mut frontier = std::mem::take(&mut self.frontier);
            bucket.swap_nodes(&mut frontier);
            for node in frontier.drain(..) {
                node.schedule_hook().set(false);
                node.send_down_in(self);
            }
            self.frontier = frontier;
        }
    }
}
