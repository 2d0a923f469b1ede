use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::NodeRef;

/// A schedule slot shared by all nodes of one rank along a dependency
/// chain.
///
/// Buckets form a lazily grown chain: `next` has rank exactly one greater
/// and is created the first time a derived node is built on top of this
/// rank. A traversal links whole buckets into its rank map instead of
/// individual nodes, so nodes that share an immediate-dominant parent
/// share a slot.
pub(crate) struct RankBucket {
    rank: usize,
    /// Nodes of this rank awaiting a send-down in the current traversal.
    /// Emptied by every visit; capacity is retained across commits.
    nodes: RefCell<Vec<NodeRef>>,
    /// Set-membership hook: whether this bucket is linked into a
    /// traversal's rank map right now.
    linked: Cell<bool>,
    next: RefCell<Option<Rc<RankBucket>>>,
}

impl RankBucket {
    pub(crate) fn new(rank: usize) -> Rc<Self> {
        Rc::new(Self {
            rank,
            nodes: RefCell::new(Vec::new()),
            linked: Cell::new(false),
            next: RefCell::new(None),
        })
    }

    pub(crate) fn rank(&self) -> usize {
        self.rank
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.linked.get()
    }

    pub(crate) fn set_linked(&self, linked: bool) {
        self.linked.set(linked);
    }

    pub(crate) fn push(&self, node: NodeRef) {
        self.nodes.borrow_mut().push(node);
    }

    /// Swaps the scheduled nodes out into `into`, leaving this bucket
    /// empty. The caller hands back a drained vector, so bucket storage is
    /// recycled rather than reallocated every commit.
    pub(crate) fn swap_nodes(&self, into: &mut Vec<NodeRef>) {
        std::mem::swap(&mut *self.nodes.borrow_mut(), into);
    }

    #[cfg(test)]
    pub(crate) fn scheduled_len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// The bucket for `rank + 1`, created on first use and shared by
    /// every caller thereafter.
    pub(crate) fn get_or_create_next(&self) -> Rc<RankBucket> {
        self.next
            .borrow_mut()
            .get_or_insert_with(|| RankBucket::new(self.rank + 1))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_init() {
        let bucket = RankBucket::new(0);
        assert_eq!(bucket.rank(), 0);
        assert_eq!(bucket.scheduled_len(), 0);
        assert!(!bucket.is_linked());
    }

    #[test]
    fn next_bucket_is_unique_and_one_rank_above() {
        let bucket = RankBucket::new(3);
        let next1 = bucket.get_or_create_next();
        let next2 = bucket.get_or_create_next();
        assert!(Rc::ptr_eq(&next1, &next2));
        assert_eq!(next1.rank(), 4);
    }
}
