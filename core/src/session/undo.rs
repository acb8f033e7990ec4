//! Per-stage record of acquired resources.
//!
//! A stage pushes each resource as it is acquired. If the stage fails the
//! list is rolled back in reverse acquisition order. Once the stage has
//! succeeded the list is kept by the session and released at shutdown in the
//! resource type's own order, which is the order of its variants.

use std::fmt::Debug;

use tracing::trace;

#[derive(Debug)]
pub struct UndoList<R> {
    acquired: Vec<R>,
}

impl<R: Copy + Ord + Debug> UndoList<R> {
    pub fn new() -> Self {
        Self {
            acquired: Vec::new(),
        }
    }

    pub fn push(&mut self, resource: R) {
        trace!(?resource, "acquired");
        self.acquired.push(resource);
    }

    /// Release in reverse order of acquisition.
    pub fn rollback(self, mut release: impl FnMut(R)) {
        for resource in self.acquired.into_iter().rev() {
            trace!(?resource, "rolling back");
            release(resource);
        }
    }

    /// Release in shutdown order.
    pub fn teardown(mut self, mut release: impl FnMut(R)) {
        self.acquired.sort();
        for resource in self.acquired {
            trace!(?resource, "releasing");
            release(resource);
        }
    }
}

impl<R: Copy + Ord + Debug> Default for UndoList<R> {
    fn default() -> Self {
        Self::new()
    }
}
