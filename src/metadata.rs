//! Registry entries tracking enrolled nodes and how to free them.

use crate::collector::Collectable;
use crate::gc_box::{GcBox, GcHeader};
use crate::pointers::HeaderPtr;
use std::ptr::NonNull;

/// Entry for one enrolled node: its header address, its type-erased box pointer, and the
/// monomorphized drop function that can reconstitute and free the box.
pub(crate) struct NodeRef {
    header: HeaderPtr,
    object: NonNull<()>,
    drop_fn: unsafe fn(NonNull<()>),
}

// Safety: NodeRef is created from an allocation the collector exclusively owns. The pointers are
// only dereferenced by the collector thread (trace, sweep, teardown) while the node is known to
// be alive, and `free` consumes the allocation exactly once.
unsafe impl Send for NodeRef {}

impl NodeRef {
    /// Creates the registry entry for a freshly allocated node.
    ///
    /// # Safety
    ///
    /// `node` must point at a live `GcBox<T>` produced by `Box::into_raw` (or an equivalent
    /// leak) and not yet tracked by any other entry.
    pub(crate) unsafe fn new<T>(node: NonNull<GcBox<T>>) -> Self {
        unsafe fn drop_node<T>(object: NonNull<()>) {
            // Safety: `object` is the pointer captured in `new`, reconstituted with the same
            // type it was allocated with; `free` is called at most once per entry
            unsafe { drop(Box::from_raw(object.cast::<GcBox<T>>().as_ptr())) };
        }

        // Safety: the caller guarantees the node is alive
        let header = HeaderPtr::new(unsafe { node.as_ref() }.header());
        Self {
            header,
            object: node.cast::<()>(),
            drop_fn: drop_node::<T>,
        }
    }

    /// Header of the tracked node, for color inspection during sweep.
    pub(crate) fn header(&self) -> &GcHeader {
        // Safety: entries only exist for nodes that have not been freed; `free` consumes the
        // entry's slot in the live set in the same pass
        unsafe { self.header.as_ref() }
    }

    pub(crate) fn addr(&self) -> usize {
        self.object.as_ptr() as usize
    }

    /// Drops the node, running the application type's destructor and releasing its storage.
    ///
    /// # Safety
    ///
    /// Must be called at most once, and only when no live handle chain from the root can still
    /// reach the node (an unreached node during sweep, or any node during collector teardown).
    pub(crate) unsafe fn free(&self) {
        unsafe { (self.drop_fn)(self.object) };
    }
}
