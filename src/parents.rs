//! Parent tuples.
//!
//! Derived nodes are constructed over a tuple of existing handles. Arity
//! one unpacks to the bare value type; higher arities carry tuples, with
//! cursor writes peeled off per parent by position.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::public::{Readable, Writable};
use crate::schedule::RankBucket;
use crate::{NodeRef, Value};

/// Type-erased handle to a node, used where the engine does not care
/// about the value type.
#[doc(hidden)]
pub struct PackedNode(pub(crate) NodeRef);

/// The erased side of a parent tuple: strong links plus the schedule slot
/// a node built on top of them belongs to.
#[doc(hidden)]
pub struct PackedParents {
    pub(crate) nodes: SmallVec<[NodeRef; 2]>,
}

impl PackedParents {
    /// The bucket for a node derived from these parents: one rank above
    /// the highest-ranked parent, shared with every other node derived on
    /// top of it.
    pub(crate) fn next_rank_bucket(&self) -> Rc<RankBucket> {
        let max = self
            .nodes
            .iter()
            .max_by_key(|node| node.rank())
            .expect("a derived node needs at least one parent");
        max.rank_bucket().get_or_create_next()
    }
}

/// A tuple of node handles usable as the parents of a derived node.
///
/// Implemented for tuples of up to eight [`Readable`] handles. The handles
/// are captured by the derived node's transform, so pass owned clones:
/// `(x.clone(), y.clone())`.
pub trait Parents: Clone + 'static {
    /// The parents' value types: the bare type for a single parent, a
    /// tuple otherwise.
    type Values: Value;

    /// Clones of the parents' current values.
    fn currents(&self) -> Self::Values;

    #[doc(hidden)]
    fn pack(&self) -> PackedParents;
}

/// Parent tuples whose members all accept upward writes (state roots and
/// cursors), required to build a cursor on top of them.
pub trait WriteParents: Parents {
    /// Forwards each component of `values` to the matching parent's
    /// `send_up`.
    fn send_up_each(&self, values: Self::Values);
}

impl<P0: Readable> Parents for (P0,) {
    type Values = P0::Value;

    fn currents(&self) -> Self::Values {
        self.0.current()
    }

    fn pack(&self) -> PackedParents {
        let mut nodes = SmallVec::new();
        nodes.push(self.0.packed().0);
        PackedParents { nodes }
    }
}

impl<P0: Writable> WriteParents for (P0,) {
    fn send_up_each(&self, values: Self::Values) {
        self.0.send_up(values);
    }
}

macro_rules! impl_parents_tuple {
    ($(($P:ident, $idx:tt)),+) => {
        impl<$($P: Readable),+> Parents for ($($P,)+) {
            type Values = ($($P::Value,)+);

            fn currents(&self) -> Self::Values {
                ($(self.$idx.current(),)+)
            }

            fn pack(&self) -> PackedParents {
                let mut nodes = SmallVec::new();
                $(nodes.push(self.$idx.packed().0);)+
                PackedParents { nodes }
            }
        }

        impl<$($P: Writable),+> WriteParents for ($($P,)+) {
            fn send_up_each(&self, values: Self::Values) {
                $(self.$idx.send_up(values.$idx);)+
            }
        }
    };
}

impl_parents_tuple!((P0, 0), (P1, 1));
impl_parents_tuple!((P0, 0), (P1, 1), (P2, 2));
impl_parents_tuple!((P0, 0), (P1, 1), (P2, 2), (P3, 3));
impl_parents_tuple!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4));
impl_parents_tuple!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4), (P5, 5));
impl_parents_tuple!((P0, 0), (P1, 1), (P2, 2), (P3, 3), (P4, 4), (P5, 5), (P6, 6));
impl_parents_tuple!(
    (P0, 0),
    (P1, 1),
    (P2, 2),
    (P3, 3),
    (P4, 4),
    (P5, 5),
    (P6, 6),
    (P7, 7)
);
