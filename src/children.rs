use std::cell::RefCell;
use std::rc::Weak;

use crate::{weak_thin_ptr_eq, NodeRef, WeakNode};

/// Weak links from a node to the nodes derived from it.
///
/// Children are appended as derived nodes are constructed and never
/// removed eagerly; a dead child leaves an expired entry behind, filtered
/// on access and erased by [`compact`](Self::compact) once it is safe to
/// disturb indices.
pub(crate) struct ChildRegistry {
    children: RefCell<Vec<WeakNode>>,
}

impl ChildRegistry {
    pub(crate) fn new() -> Self {
        Self {
            children: RefCell::new(Vec::new()),
        }
    }

    /// Registers a freshly constructed child.
    pub(crate) fn link(&self, child: WeakNode) {
        let mut children = self.children.borrow_mut();
        assert!(
            !children.iter().any(|c| weak_thin_ptr_eq(c, &child)),
            "child node must not be linked twice"
        );
        children.push(child);
    }

    pub(crate) fn len(&self) -> usize {
        self.children.borrow().len()
    }

    /// The child at `ix`, if it is still alive.
    pub(crate) fn get(&self, ix: usize) -> Option<NodeRef> {
        self.children.borrow().get(ix).and_then(Weak::upgrade)
    }

    /// Erases expired entries. Must not run while an index-based walk over
    /// the registry is in progress.
    pub(crate) fn compact(&self) {
        self.children
            .borrow_mut()
            .retain(|c| c.strong_count() > 0);
    }
}
