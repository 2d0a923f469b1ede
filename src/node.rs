//! The node core.
//!
//! Nodes form a directed acyclic graph in which values flow down from
//! roots to derived nodes. A commit runs in two phases so that the outside
//! world only ever observes a consistent snapshot: `send_down` propagates
//! pending values and records which nodes changed, then `notify` delivers
//! the committed values to observers. Derived nodes strongly own their
//! parents; parents hold weak links back, so destroying the last handle to
//! a subtree tears it down without upsetting the rest of the graph.

use std::cell::{Cell, Ref};
use std::fmt::{self, Debug};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::cell::ValueCell;
use crate::children::ChildRegistry;
use crate::cutoff::Cutoff;
use crate::schedule::RankBucket;
use crate::signal::Signal;
use crate::traversal::Traversal;
use crate::{NodeRef, Value, WeakNode};

pub(crate) struct Node<T> {
    cell: ValueCell<T>,
    kind: Kind<T>,
    /// `current` differs from `last`; descendants must be visited.
    needs_send_down: Cell<bool>,
    /// Observers should fire in the notify phase.
    needs_notify: Cell<bool>,
    /// Re-entrancy flag for `notify`; guards child-list compaction.
    notifying: Cell<bool>,
    /// List-membership hook: true while linked into a traversal's rank
    /// bucket.
    in_schedule: Cell<bool>,
    children: ChildRegistry,
    bucket: Rc<RankBucket>,
    observers: Signal<T>,
}

/// What a node is, and therefore how it recomputes.
pub(crate) enum Kind<T> {
    /// Root written from outside via `send_up`; recompute is a no-op.
    State,
    /// Root that re-invokes its callback on every refresh and send-down.
    Sensor(Box<dyn Fn() -> T>),
    /// Derived node; a cursor is an `Xform` carrying a `write_up`.
    Xform(XformKind<T>),
}

pub(crate) struct XformKind<T> {
    /// Applies the user transform to the parents' current values.
    pub(crate) compute: Box<dyn Fn() -> T>,
    /// Present on cursors: decomposes a value written here and forwards
    /// the components to the parents' `send_up`.
    pub(crate) write_up: Option<Box<dyn Fn(T)>>,
    /// Strong links to the parents, fixed at construction.
    pub(crate) parents: SmallVec<[NodeRef; 2]>,
}

impl<T> Kind<T> {
    fn debug_ty(&self) -> &'static str {
        match self {
            Kind::State => "state",
            Kind::Sensor(_) => "sensor",
            Kind::Xform(x) if x.write_up.is_some() => "cursor",
            Kind::Xform(_) => "xform",
        }
    }
}

impl<T: Value> Node<T> {
    /// Builds the node and registers it as a weak child of each parent.
    pub(crate) fn create(init: T, kind: Kind<T>, bucket: Rc<RankBucket>) -> Rc<Self> {
        let node = Rc::new(Node {
            cell: ValueCell::new(init),
            kind,
            needs_send_down: Cell::new(false),
            needs_notify: Cell::new(false),
            notifying: Cell::new(false),
            in_schedule: Cell::new(false),
            children: ChildRegistry::new(),
            bucket,
            observers: Signal::new(),
        });
        if let Kind::Xform(x) = &node.kind {
            let erased: NodeRef = node.clone();
            let weak: WeakNode = Rc::downgrade(&erased);
            for parent in &x.parents {
                parent.link_child(weak.clone());
            }
        }
        node
    }

    pub(crate) fn current(&self) -> Ref<'_, T> {
        self.cell.current()
    }

    pub(crate) fn last(&self) -> Ref<'_, T> {
        self.cell.last()
    }

    /// Stores a pending value if it survives the change predicate. The
    /// flag is monotonic within a commit: once set it is only cleared by
    /// an actual send-down.
    pub(crate) fn push_down(&self, value: T) {
        if self.cell.push_down(value) {
            self.needs_send_down.set(true);
        }
    }

    fn recompute(&self) {
        match &self.kind {
            Kind::State => {}
            Kind::Sensor(f) => self.push_down(f()),
            Kind::Xform(x) => self.push_down((x.compute)()),
        }
    }

    /// Accepts an upward write. States absorb it directly; cursors
    /// decompose it towards their parents.
    pub(crate) fn send_up(&self, value: T) {
        match &self.kind {
            Kind::State => self.push_down(value),
            Kind::Sensor(_) => unreachable!("sensor roots are not writable"),
            Kind::Xform(x) => {
                let write_up = x
                    .write_up
                    .as_ref()
                    .expect("node does not accept upward writes");
                write_up(value);
            }
        }
    }

    pub(crate) fn observers(&self) -> &Signal<T> {
        &self.observers
    }

    pub(crate) fn set_cutoff(&self, cutoff: Cutoff<T>) {
        self.cell.set_cutoff(cutoff);
    }

    #[cfg(test)]
    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Shared tail of both send-down forms: commit the pending value and
    /// decide whether descendants need visiting.
    fn commit_pending(&self) -> bool {
        if !self.needs_send_down.get() {
            return false;
        }
        self.cell.commit();
        self.needs_send_down.set(false);
        self.needs_notify.set(true);
        true
    }
}

/// Restores the prior value of a node's `notifying` flag at scope exit,
/// so nested notifications observe that an outer frame is still iterating.
struct NotifyingGuard<'a> {
    flag: &'a Cell<bool>,
    prior: bool,
}

impl<'a> NotifyingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let prior = flag.replace(true);
        Self { flag, prior }
    }

    fn was_notifying(&self) -> bool {
        self.prior
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.prior);
    }
}

/// The type-erased node surface the engine traverses.
pub(crate) trait ErasedNode: Debug {
    fn rank(&self) -> usize;
    fn rank_bucket(&self) -> &Rc<RankBucket>;
    /// List-membership hook used by the topological traversal.
    fn schedule_hook(&self) -> &Cell<bool>;
    /// Registers a freshly constructed derived node.
    fn link_child(&self, child: WeakNode);
    /// Materializes `current` on demand: parents first, then self.
    fn refresh(&self);
    /// Phase 1, depth-first: propagate and recurse into children.
    fn send_down(&self);
    /// Phase 1, topological: propagate and hand children to `traversal`.
    fn send_down_in(&self, traversal: &mut dyn Traversal);
    /// Single-parent nodes are sent down directly (they cannot be reached
    /// twice in one commit); multi-parent nodes are scheduled so diamonds
    /// coalesce.
    fn schedule_or_send_down(self: Rc<Self>, traversal: &mut dyn Traversal);
    /// Phase 2: deliver committed values to observers, pre-order.
    fn notify(&self);
}

impl<T: Value> ErasedNode for Node<T> {
    fn rank(&self) -> usize {
        self.bucket.rank()
    }

    fn rank_bucket(&self) -> &Rc<RankBucket> {
        &self.bucket
    }

    fn schedule_hook(&self) -> &Cell<bool> {
        &self.in_schedule
    }

    fn link_child(&self, child: WeakNode) {
        self.children.link(child);
    }

    fn refresh(&self) {
        match &self.kind {
            Kind::State => {}
            Kind::Sensor(f) => self.push_down(f()),
            Kind::Xform(x) => {
                for parent in &x.parents {
                    parent.refresh();
                }
                self.recompute();
            }
        }
    }

    fn send_down(&self) {
        self.recompute();
        if self.commit_pending() {
            let len = self.children.len();
            for ix in 0..len {
                if let Some(child) = self.children.get(ix) {
                    child.send_down();
                }
            }
        }
    }

    fn send_down_in(&self, traversal: &mut dyn Traversal) {
        self.recompute();
        if self.commit_pending() {
            let len = self.children.len();
            for ix in 0..len {
                if let Some(child) = self.children.get(ix) {
                    child.schedule_or_send_down(traversal);
                }
            }
        }
    }

    fn schedule_or_send_down(self: Rc<Self>, traversal: &mut dyn Traversal) {
        let multi_parent = match &self.kind {
            Kind::Xform(x) => x.parents.len() > 1,
            _ => false,
        };
        if multi_parent {
            let packed: NodeRef = self;
            traversal.schedule(&packed);
        } else {
            self.send_down_in(traversal);
        }
    }

    fn notify(&self) {
        // a pending send-down may have flagged us but not run yet; wait
        // until it resolves
        if !self.needs_notify.get() || self.needs_send_down.get() {
            return;
        }
        self.needs_notify.set(false);

        let guard = NotifyingGuard::enter(&self.notifying);
        let mut garbage = false;

        self.observers.emit(&self.cell.last());

        let len = self.children.len();
        for ix in 0..len {
            match self.children.get(ix) {
                Some(child) => child.notify(),
                None => garbage = true,
            }
        }

        if garbage && !guard.was_notifying() {
            tracing::trace!(kind = self.kind.debug_ty(), "compacting expired children");
            self.children.compact();
        }
    }
}

impl<T: Value> Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind.debug_ty())
            .field("rank", &self.bucket.rank())
            .field("current", &*self.cell.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commit, make_state, make_xform_reader, Readable, Writable};
    use std::cell::Cell;

    fn thin_eq(one: &NodeRef, two: &NodeRef) -> bool {
        Rc::as_ptr(one) as *const () == Rc::as_ptr(two) as *const ()
    }

    struct SpyTraversal {
        calls: Vec<NodeRef>,
    }

    impl Traversal for SpyTraversal {
        fn schedule(&mut self, node: &NodeRef) {
            self.calls.push(node.clone());
        }
        fn visit(&mut self) {}
    }

    #[test]
    fn multi_parent_children_are_scheduled_not_recursed() {
        let x = make_state(12);
        let y = make_xform_reader(|v| v, (x.clone(),));
        let z = make_xform_reader(|(a, b): (i32, i32)| a + b, (x.clone(), y.clone()));

        x.node.push_down(13);
        let mut spy = SpyTraversal { calls: Vec::new() };
        x.node.send_down_in(&mut spy);

        // z is reachable from x both directly and through y, and must be
        // handed to the traversal both times
        let z_node: NodeRef = z.node.clone();
        assert_eq!(spy.calls.len(), 2);
        assert!(thin_eq(&spy.calls[0], &z_node));
        assert!(thin_eq(&spy.calls[1], &z_node));
    }

    #[test]
    fn expired_children_are_compacted_after_notify() {
        let x = make_state(1);
        {
            let _y = make_xform_reader(|v| v + 1, (x.clone(),));
        }
        assert_eq!(x.node.child_count(), 1);

        x.send_up(2);
        commit(&x);
        assert_eq!(x.node.child_count(), 0);
    }

    #[test]
    #[should_panic(expected = "linked twice")]
    fn duplicate_child_link_is_rejected() {
        let x = make_state(1);
        let y = make_xform_reader(|v| v, (x.clone(),));
        let y_erased: NodeRef = y.node.clone();
        let duplicate: WeakNode = Rc::downgrade(&y_erased);
        x.node.link_child(duplicate);
    }

    #[test]
    fn observer_may_re_enter_notify() {
        let x = make_state(1);
        let x_ = x.clone();
        let hits = Rc::new(Cell::new(0));
        let hits_ = hits.clone();
        let _sub = x.observers().connect(move |_| {
            hits_.set(hits_.get() + 1);
            // needs_notify is already cleared, so this is a no-op
            x_.node.notify();
        });

        x.send_up(2);
        commit(&x);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn notifying_guard_restores_prior_value() {
        let flag = Cell::new(false);
        {
            let outer = NotifyingGuard::enter(&flag);
            assert!(flag.get());
            {
                let inner = NotifyingGuard::enter(&flag);
                assert!(inner.was_notifying());
            }
            assert!(flag.get());
            assert!(!outer.was_notifying());
        }
        assert!(!flag.get());
    }
}
