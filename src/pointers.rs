//! Pointer wrappers used to key and traverse the reachability graph.

use crate::gc_box::GcHeader;
use std::ptr::NonNull;

/// Address of a node header; the currency of the edge multiset and the trace stack.
///
/// Edges are keyed by header address so that removing an edge never dereferences the child:
/// during sweep a parent may erase edges that point at nodes freed earlier in the same pass.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct HeaderPtr(NonNull<GcHeader>);

// Safety: HeaderPtr is only an address. It is dereferenced exclusively through `as_ref`, whose
// callers document why the header is still alive; everywhere else it is compared and hashed as
// an integer. Sending or sharing the address itself is therefore sound.
unsafe impl Send for HeaderPtr {}
unsafe impl Sync for HeaderPtr {}

impl HeaderPtr {
    pub(crate) fn new(header: &GcHeader) -> Self {
        Self(NonNull::from(header))
    }

    /// Reborrows the header behind this address.
    ///
    /// # Safety
    ///
    /// The header must still be alive: either the node is enrolled and no sweep can free it
    /// (the marking phase excludes sweeps), or the caller holds the graph invariant that the
    /// parent outlives every handle referencing it.
    pub(crate) unsafe fn as_ref<'a>(self) -> &'a GcHeader {
        unsafe { self.0.as_ref() }
    }

    pub(crate) fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}
