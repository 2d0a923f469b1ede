#![doc = include_str!("../README.md")]
#![allow(clippy::type_complexity)]

mod cell;
mod children;
mod commit;
mod cutoff;
mod node;
mod parents;
mod schedule;
mod signal;
mod traversal;

mod public;
pub use public::*;

use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::node::ErasedNode;

/// Trait alias for `Debug + Clone + PartialEq + 'static`.
///
/// Every value carried by a node satisfies this automatically. `PartialEq`
/// backs the default change predicate; value types whose equality is
/// meaningless can opt out per node with [`Cutoff::Never`](crate::Cutoff).
pub trait Value: Debug + Clone + PartialEq + 'static {}
impl<T> Value for T where T: Debug + Clone + PartialEq + 'static {}

pub(crate) type NodeRef = Rc<dyn ErasedNode>;
pub(crate) type WeakNode = Weak<dyn ErasedNode>;

/// Compares `Weak<dyn Trait>` by data pointer only.
///
/// `Weak::ptr_eq` on trait objects compares fat pointers, and vtable
/// pointers for the same underlying type may differ between codegen units.
pub(crate) fn weak_thin_ptr_eq<T: ?Sized>(one: &Weak<T>, two: &Weak<T>) -> bool {
    let one_: *const () = Weak::as_ptr(one).cast();
    let two_: *const () = Weak::as_ptr(two).cast();
    one_ == two_
}
