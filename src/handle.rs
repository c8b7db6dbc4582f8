//! Managed handles: smart references whose lifecycle maintains the reachability graph.
//!
//! A handle is the sole source of edge insertions and deletions. Constructing one inserts an
//! edge into its parent's child multiset; dropping it erases exactly one occurrence. Cloning
//! asserts a fresh edge, so the multiset stays an exact census of live handles.

use crate::collector::Collectable;
use crate::gc_box::GcBox;
use crate::pointers::HeaderPtr;
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;

/// Untyped handle kernel: the parent/edge pair of header addresses.
///
/// Owns one occurrence in `parent`'s child multiset whenever `edge` is set, and removes it on
/// drop. Edge removal never dereferences the child; only the parent header is touched.
pub(crate) struct RawHandle {
    parent: Option<HeaderPtr>,
    edge: Option<HeaderPtr>,
}

impl RawHandle {
    pub(crate) const fn empty() -> Self {
        Self {
            parent: None,
            edge: None,
        }
    }

    /// Inserts the edge into the parent and takes ownership of that occurrence.
    ///
    /// # Safety
    ///
    /// Both headers must be alive, and the parent must outlive the returned kernel.
    pub(crate) unsafe fn assert_edge(parent: HeaderPtr, edge: HeaderPtr) -> Self {
        // Safety: per this function's contract the parent header is alive
        unsafe { parent.as_ref() }.insert(edge);
        Self {
            parent: Some(parent),
            edge: Some(edge),
        }
    }

    /// Asserts an additional occurrence of the same edge.
    fn dup(&self) -> Self {
        if let (Some(parent), Some(edge)) = (self.parent, self.edge) {
            // Safety: the parent outlives every handle that references it (graph invariant)
            unsafe { parent.as_ref() }.insert(edge);
        }
        Self {
            parent: self.parent,
            edge: self.edge,
        }
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        if let (Some(parent), Some(edge)) = (self.parent, self.edge) {
            // Safety: the parent outlives every handle that references it (graph invariant)
            unsafe { parent.as_ref() }.erase(edge);
        }
    }
}

/// A smart reference to a managed node, parented by another collectable (or the collector root).
///
/// The handle does not own its referent; it asserts an edge in the reachability graph and
/// guarantees the edge is removed on destruction. The referenced node stays valid for as long
/// as any chain of live handles connects it to the collector root.
///
/// A single handle value must not be mutated from two threads at once; distinct handles to the
/// same node may be used from any number of threads (edge mutations are serialized by the
/// parent's lock).
pub struct Handle<T> {
    raw: RawHandle,
    core: Option<NonNull<GcBox<T>>>,
}

impl<T> Handle<T> {
    /// Creates a handle to `node`, parented by `parent`, inserting one edge.
    ///
    /// # Safety
    ///
    /// `node` must have been returned by [`Collector::allocate`](crate::Collector::allocate) on
    /// the collector that owns `parent`, and must still be live. The parent, and the collector
    /// itself, must outlive the handle.
    pub unsafe fn new<P: Collectable>(parent: &P, node: NonNull<GcBox<T>>) -> Self {
        let parent_ptr = HeaderPtr::new(parent.header());
        // Safety: the caller guarantees `node` is live
        let edge = HeaderPtr::new(unsafe { node.as_ref() }.header());
        // Safety: both headers are alive; lifetime obligations forwarded to the caller
        let raw = unsafe { RawHandle::assert_edge(parent_ptr, edge) };
        Self {
            raw,
            core: Some(node),
        }
    }

    /// Returns the referenced node, or `None` for an empty handle.
    pub fn get(&self) -> Option<&GcBox<T>> {
        // Safety: a non-empty handle's edge keeps the node reachable, so the collector will not
        // free it while the handle is alive
        self.core.map(|core| unsafe { &*core.as_ptr() })
    }

    /// Raw pointer to the referenced node; null for an empty handle.
    pub fn as_ptr(&self) -> *const GcBox<T> {
        self.core
            .map_or(std::ptr::null(), |core| core.as_ptr().cast_const())
    }

    /// `true` if this handle references no node and asserts no edge.
    pub fn is_empty(&self) -> bool {
        self.core.is_none()
    }

    /// `true` if both handles reference the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.core == other.core
    }
}

impl<T> Default for Handle<T> {
    /// An empty handle: no parent, no edge. Dropping it has no effect on the graph.
    fn default() -> Self {
        Self {
            raw: RawHandle::empty(),
            core: None,
        }
    }
}

impl<T> Clone for Handle<T> {
    /// Copies the parent and referent and asserts a fresh edge: after the clone, each handle
    /// independently keeps the referent reachable.
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.dup(),
            core: self.core,
        }
    }
}

impl<T> Deref for Handle<T> {
    type Target = GcBox<T>;

    /// # Panics
    ///
    /// Panics when the handle is empty.
    fn deref(&self) -> &GcBox<T> {
        match self.get() {
            Some(node) => node,
            None => panic!("dereferenced an empty handle"),
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("node", &self.as_ptr())
            .finish()
    }
}

// Safety: a handle is an address pair plus edge bookkeeping. Edge mutations are serialized by
// the parent's spin-lock, and shared access to the referent goes through `&T`, so the usual
// `T: Send + Sync` bounds make the handle itself transferable and shareable.
unsafe impl<T: Send + Sync> Send for Handle<T> {}
unsafe impl<T: Send + Sync> Sync for Handle<T> {}
