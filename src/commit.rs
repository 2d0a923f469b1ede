//! The commit driver.
//!
//! A commit runs phase 1 (send-down) over every given root before any
//! phase 2 (notify) begins, so an observer anywhere in the graph reads a
//! world in which every affected node has already settled.

use smallvec::SmallVec;

use crate::parents::PackedNode;
use crate::public::Readable;
use crate::traversal::{DfsTraversal, TopoTraversal, Traversal};

/// One or more root handles to commit together: a single `&root`, or a
/// tuple like `(&a, &b)`.
pub trait Roots {
    #[doc(hidden)]
    fn append_to(&self, out: &mut SmallVec<[PackedNode; 4]>);
}

impl<'a, R: Readable> Roots for &'a R {
    fn append_to(&self, out: &mut SmallVec<[PackedNode; 4]>) {
        out.push(self.packed());
    }
}

macro_rules! impl_roots_tuple {
    ($($R:ident . $idx:tt),+) => {
        impl<$($R: Roots),+> Roots for ($($R,)+) {
            fn append_to(&self, out: &mut SmallVec<[PackedNode; 4]>) {
                $(self.$idx.append_to(out);)+
            }
        }
    };
}

impl_roots_tuple!(R0.0);
impl_roots_tuple!(R0.0, R1.1);
impl_roots_tuple!(R0.0, R1.1, R2.2);
impl_roots_tuple!(R0.0, R1.1, R2.2, R3.3);
impl_roots_tuple!(R0.0, R1.1, R2.2, R3.3, R4.4);
impl_roots_tuple!(R0.0, R1.1, R2.2, R3.3, R4.4, R5.5);
impl_roots_tuple!(R0.0, R1.1, R2.2, R3.3, R4.4, R5.5, R6.6);
impl_roots_tuple!(R0.0, R1.1, R2.2, R3.3, R4.4, R5.5, R6.6, R7.7);

/// Commits pending changes on the given roots. Topological: a node
/// reachable through several paths recomputes once, after all of its
/// parents.
pub fn commit(roots: impl Roots) {
    commit_topological(roots)
}

/// The explicit spelling of the default strategy driven by [`commit`]:
/// one rank-ordered traversal seeded with every root, then notify.
pub fn commit_topological(roots: impl Roots) {
    let mut set: SmallVec<[PackedNode; 4]> = SmallVec::new();
    roots.append_to(&mut set);
    let _span = tracing::debug_span!("commit", strategy = "topological", roots = set.len()).entered();

    let mut nodes = set.iter();
    if let Some(first) = nodes.next() {
        let mut traversal = TopoTraversal::new(&first.0);
        for root in nodes {
            traversal.schedule(&root.0);
        }
        traversal.visit();
    }

    for root in &set {
        root.0.notify();
    }
}

/// Depth-first commit. Cheaper for chain- and tree-shaped graphs, but a
/// diamond-merged node recomputes once per path reaching it; prefer
/// [`commit`] unless the graph is known to be diamond-free.
pub fn commit_depth_first(roots: impl Roots) {
    let mut set: SmallVec<[PackedNode; 4]> = SmallVec::new();
    roots.append_to(&mut set);
    let _span = tracing::debug_span!("commit", strategy = "depth_first", roots = set.len()).entered();

    for root in &set {
        DfsTraversal::new(root.0.clone()).visit();
    }

    for root in &set {
        root.0.notify();
    }
}
