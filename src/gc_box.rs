//! Node header and the managed box composing it into application objects.

use crate::collector::Collectable;
use crate::pointers::HeaderPtr;
use crate::spin::{SpinGuard, SpinLock};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};

/// Mark state of a managed node in the tri-color scheme.
///
/// - `White`: not proven reachable in the current cycle, candidate for reclamation.
/// - `Gray`: discovered by the trace, children not yet scanned.
/// - `Black`: discovered and fully scanned.
/// - `Unknown`: freshly allocated, not yet through its first full cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Color {
    White = 0,
    Gray = 1,
    Black = 2,
    Unknown = 3,
}

impl Color {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Color::White,
            1 => Color::Gray,
            2 => Color::Black,
            _ => Color::Unknown,
        }
    }
}

/// Child-edge multiset, represented as a multiplicity map keyed by header address. Two handles
/// from the same parent to the same child are two distinct edges; dropping one removes one.
type ChildSet = HashMap<HeaderPtr, usize>;

/// Per-node collection metadata: the color mark and the spin-locked child-edge multiset.
///
/// Every managed object carries exactly one header (via [`GcBox`]); the collector itself
/// carries one as the trace root. The trace operates on headers only.
pub struct GcHeader {
    color: AtomicU8,
    children: SpinLock<ChildSet>,
}

impl GcHeader {
    pub(crate) fn new() -> Self {
        Self {
            color: AtomicU8::new(Color::Unknown as u8),
            children: SpinLock::new(HashMap::new()),
        }
    }

    /// Current color of this node.
    pub fn color(&self) -> Color {
        Color::from_u8(self.color.load(Ordering::Acquire))
    }

    pub(crate) fn set_color(&self, color: Color) {
        self.color.store(color as u8, Ordering::Release);
    }

    /// Adds one edge to `child`. Duplicate entries are intentional.
    pub(crate) fn insert(&self, child: HeaderPtr) {
        let mut children = self.children.lock();
        *children.entry(child).or_insert(0) += 1;
    }

    /// Removes exactly one occurrence of `child`. An absent entry is a silent no-op; a second
    /// release of the same edge during teardown races is tolerated.
    pub(crate) fn erase(&self, child: HeaderPtr) {
        let mut children = self.children.lock();
        if let Some(multiplicity) = children.get_mut(&child) {
            *multiplicity -= 1;
            if *multiplicity == 0 {
                children.remove(&child);
            }
        }
    }

    /// Locks and returns the child set for traversal.
    pub(crate) fn children(&self) -> SpinGuard<'_, ChildSet> {
        self.children.lock()
    }

    /// Total number of edges out of this node, multiplicity included.
    pub fn child_count(&self) -> usize {
        self.children.lock().values().sum()
    }
}

impl fmt::Debug for GcHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcHeader")
            .field("color", &self.color())
            .field("child_count", &self.child_count())
            .finish()
    }
}

/// A managed node: application data with the collection header composed in.
///
/// `data` must stay declared before `header`: when the box is dropped, the data's fields
/// (including any handles it holds) are destroyed first, while this node's own header is still
/// alive, so a handle parented by its containing node can erase its edge during sweep and
/// collector teardown.
pub struct GcBox<T> {
    data: T,
    header: GcHeader,
}

impl<T> GcBox<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            data,
            header: GcHeader::new(),
        }
    }
}

impl<T> Collectable for GcBox<T> {
    fn header(&self) -> &GcHeader {
        &self.header
    }
}

impl<T> Deref for GcBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T: fmt::Debug> fmt::Debug for GcBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcBox")
            .field("data", &self.data)
            .field("header", &self.header)
            .finish()
    }
}
