//! The user-facing surface: node handles and constructors.
//!
//! Handles are cheap reference-counted clones. A handle (or a derived
//! node) is the only thing keeping its node alive; once the last strong
//! reference goes, the node dies and its parents forget it.

use std::fmt;
use std::rc::Rc;

use crate::node::{ErasedNode, Kind, Node, XformKind};
use crate::schedule::RankBucket;
use crate::Value;

pub use crate::commit::{commit, commit_depth_first, commit_topological, Roots};
pub use crate::cutoff::{Cutoff, CutoffClosure};
pub use crate::parents::{PackedNode, PackedParents, Parents, WriteParents};
pub use crate::signal::{Signal, Slot, Subscription};

/// Read access shared by every node handle.
pub trait Readable: Clone + 'static {
    type Value: Value;

    /// The pending value, possibly mid-commit. Equal to [`last`](Self::last)
    /// whenever no commit is in flight.
    fn current(&self) -> Self::Value;

    /// The committed value: what observers last saw.
    fn last(&self) -> Self::Value;

    /// Distance from the roots: 0 for roots, `1 + max(parent ranks)` for
    /// derived nodes.
    fn rank(&self) -> usize;

    /// Recomputes `current` on demand, parents first, outside any commit.
    fn refresh(&self);

    /// The node's observer sink. Callbacks fire once per commit in which
    /// the node's committed value changed.
    fn observers(&self) -> &Signal<Self::Value>;

    /// Replaces the node's change predicate.
    fn set_cutoff(&self, cutoff: Cutoff<Self::Value>);

    #[doc(hidden)]
    fn packed(&self) -> PackedNode;
}

/// Handles that accept upward writes: state roots and cursors.
pub trait Writable: Readable {
    /// Stages `value` as the node's pending value (for a state root) or
    /// decomposes it towards the parents (for a cursor). Nothing is
    /// visible to `last` or observers until the next commit.
    fn send_up(&self, value: Self::Value);
}

/// A root node written from outside the graph.
#[derive(Clone)]
pub struct State<T: Value> {
    pub(crate) node: Rc<Node<T>>,
}

/// A root node that recomputes by polling a callback on every commit.
#[derive(Clone)]
pub struct Sensor<T: Value> {
    pub(crate) node: Rc<Node<T>>,
}

/// A derived, read-only node.
#[derive(Clone)]
pub struct Reader<T: Value> {
    pub(crate) node: Rc<Node<T>>,
}

/// A derived node that additionally accepts upward writes, reversing the
/// data flow by one edge through an inverse transform.
#[derive(Clone)]
pub struct Cursor<T: Value> {
    pub(crate) node: Rc<Node<T>>,
}

macro_rules! impl_readable {
    ($handle:ident) => {
        impl<T: Value> Readable for $handle<T> {
            type Value = T;

            fn current(&self) -> T {
                self.node.current().clone()
            }

            fn last(&self) -> T {
                self.node.last().clone()
            }

            fn rank(&self) -> usize {
                ErasedNode::rank(&*self.node)
            }

            fn refresh(&self) {
                ErasedNode::refresh(&*self.node)
            }

            fn observers(&self) -> &Signal<T> {
                self.node.observers()
            }

            fn set_cutoff(&self, cutoff: Cutoff<T>) {
                self.node.set_cutoff(cutoff)
            }

            fn packed(&self) -> PackedNode {
                PackedNode(self.node.clone())
            }
        }

        impl<T: Value> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($handle)).field(&self.node).finish()
            }
        }
    };
}

impl_readable!(State);
impl_readable!(Sensor);
impl_readable!(Reader);
impl_readable!(Cursor);

impl<T: Value> Writable for State<T> {
    fn send_up(&self, value: T) {
        self.node.send_up(value);
    }
}

impl<T: Value> Writable for Cursor<T> {
    fn send_up(&self, value: T) {
        self.node.send_up(value);
    }
}

/// Creates a state root holding `init`.
pub fn make_state<T: Value>(init: T) -> State<T> {
    State {
        node: Node::create(init, Kind::State, RankBucket::new(0)),
    }
}

/// Creates a sensor root. The callback is invoked once immediately for the
/// initial value and re-invoked on every refresh and send-down.
pub fn make_sensor<T, F>(sensor: F) -> Sensor<T>
where
    T: Value,
    F: Fn() -> T + 'static,
{
    let init = sensor();
    Sensor {
        node: Node::create(init, Kind::Sensor(Box::new(sensor)), RankBucket::new(0)),
    }
}

/// Creates a derived read-only node computing `transform` over the
/// parents' current values. The initial value is materialized eagerly.
pub fn make_xform_reader<P, T, F>(transform: F, parents: P) -> Reader<T>
where
    P: Parents,
    T: Value,
    F: Fn(P::Values) -> T + 'static,
{
    let packed = parents.pack();
    let bucket = packed.next_rank_bucket();
    let compute: Box<dyn Fn() -> T> = Box::new(move || transform(parents.currents()));
    let init = compute();
    Reader {
        node: Node::create(
            init,
            Kind::Xform(XformKind {
                compute,
                write_up: None,
                parents: packed.nodes,
            }),
            bucket,
        ),
    }
}

/// Creates a derived read/write node. Reads go through `transform` like a
/// reader; a [`send_up`](Writable::send_up) runs
/// `inverse(parents.currents(), value)` and forwards each component to the
/// matching parent's `send_up`, so the write surfaces at the root(s) and
/// flows back down on the next commit.
pub fn make_xform_cursor<P, T, F, B>(transform: F, inverse: B, parents: P) -> Cursor<T>
where
    P: WriteParents,
    T: Value,
    F: Fn(P::Values) -> T + 'static,
    B: Fn(P::Values, T) -> P::Values + 'static,
{
    let packed = parents.pack();
    let bucket = packed.next_rank_bucket();
    let compute: Box<dyn Fn() -> T> = {
        let parents = parents.clone();
        Box::new(move || transform(parents.currents()))
    };
    let write_up: Box<dyn Fn(T)> = Box::new(move |value| {
        let decomposed = inverse(parents.currents(), value);
        parents.send_up_each(decomposed);
    });
    let init = compute();
    Cursor {
        node: Node::create(
            init,
            Kind::Xform(XformKind {
                compute,
                write_up: Some(write_up),
                parents: packed.nodes,
            }),
            bucket,
        ),
    }
}

/// Merges N parents into one node carrying the tuple of their values,
/// with rank `1 + max(parent ranks)`.
pub fn make_merge_reader<P: Parents>(parents: P) -> Reader<P::Values> {
    make_xform_reader(|values| values, parents)
}
