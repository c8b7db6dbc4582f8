//! Core collection behavior: enrollment, chain tracing, reclamation, and teardown.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tricolor_gc::{Collectable, Collector, Color, Handle};

/// Chain link whose destruction is observable through a shared flag.
struct Link {
    next: Mutex<Option<Handle<Link>>>,
    dropped: Arc<AtomicBool>,
}

impl Link {
    fn new() -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let link = Self {
            next: Mutex::new(None),
            dropped: dropped.clone(),
        };
        (link, dropped)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::Release);
    }
}

/// One full collection cycle. The sweep is unconditional, unlike the scheduler's tick.
fn cycle(collector: &Collector) {
    collector.mark();
    collector.sweep();
}

#[test_log::test]
fn linear_chain_is_traced_and_retained() {
    let collector = Collector::new();

    let (link, a_dropped) = Link::new();
    let a = collector.allocate(link);
    let (link, b_dropped) = Link::new();
    let b = collector.allocate(link);
    let (link, c_dropped) = Link::new();
    let c = collector.allocate(link);

    // Safety: all three nodes were just allocated on this collector and stay reachable from
    // the root through the handles below.
    let root = unsafe { collector.adopt(a) };
    unsafe {
        *root.next.lock() = Some(a.as_ref().adopt(b));
        *b.as_ref().next.lock() = Some(b.as_ref().adopt(c));
    }

    // Enrollment cycle: the fresh nodes pass through Unknown and come out white.
    cycle(&collector);
    assert_eq!(collector.live_objects(), 3);
    unsafe {
        assert_eq!(a.as_ref().header().color(), Color::White);
        assert_eq!(b.as_ref().header().color(), Color::White);
        assert_eq!(c.as_ref().header().color(), Color::White);
    }

    // One mark blackens the whole chain.
    assert_eq!(collector.mark(), Some(3));
    unsafe {
        assert_eq!(a.as_ref().header().color(), Color::Black);
        assert_eq!(b.as_ref().header().color(), Color::Black);
        assert_eq!(c.as_ref().header().color(), Color::Black);
    }

    // The sweep frees nothing and resets the survivors for the next cycle.
    assert_eq!(collector.sweep(), Some(0));
    assert_eq!(collector.live_objects(), 3);
    unsafe {
        assert_eq!(a.as_ref().header().color(), Color::White);
        assert_eq!(b.as_ref().header().color(), Color::White);
        assert_eq!(c.as_ref().header().color(), Color::White);
    }
    assert!(!a_dropped.load(Ordering::Acquire));
    assert!(!b_dropped.load(Ordering::Acquire));
    assert!(!c_dropped.load(Ordering::Acquire));
}

#[test_log::test]
fn dropping_the_root_edge_reclaims_the_whole_chain() {
    let collector = Collector::new();

    let (link, a_dropped) = Link::new();
    let a = collector.allocate(link);
    let (link, b_dropped) = Link::new();
    let b = collector.allocate(link);
    let (link, c_dropped) = Link::new();
    let c = collector.allocate(link);

    // Safety: same reachability argument as above
    let root = unsafe { collector.adopt(a) };
    unsafe {
        *root.next.lock() = Some(a.as_ref().adopt(b));
        *b.as_ref().next.lock() = Some(b.as_ref().adopt(c));
    }

    cycle(&collector);
    cycle(&collector);
    assert_eq!(collector.live_objects(), 3);

    drop(root);
    cycle(&collector);

    assert_eq!(collector.live_objects(), 0);
    assert!(a_dropped.load(Ordering::Acquire));
    assert!(b_dropped.load(Ordering::Acquire));
    assert!(c_dropped.load(Ordering::Acquire));
}

#[test_log::test]
fn unreferenced_allocation_is_reclaimed_after_two_cycles() {
    let collector = Collector::new();
    let (link, dropped) = Link::new();
    let _node = collector.allocate(link);

    // The first cycle enrolls the node and demotes it from Unknown to white.
    cycle(&collector);
    assert!(!dropped.load(Ordering::Acquire));
    assert_eq!(collector.live_objects(), 1);

    // The second cycle observes it white and unreached, and frees it.
    cycle(&collector);
    assert!(dropped.load(Ordering::Acquire));
    assert_eq!(collector.live_objects(), 0);
}

#[test_log::test]
fn rooted_node_survives_arbitrary_cycles() {
    let collector = Collector::new();
    let (link, dropped) = Link::new();
    let node = collector.allocate(link);
    // Safety: freshly allocated on this collector; the root outlives the handle
    let _root = unsafe { collector.adopt(node) };

    for _ in 0..10 {
        cycle(&collector);
    }

    assert!(!dropped.load(Ordering::Acquire));
    assert_eq!(collector.live_objects(), 1);
}

#[test_log::test]
fn teardown_frees_enrolled_and_pending_nodes() {
    let mut flags = Vec::new();

    {
        let collector = Collector::new();

        // An enrolled chain, still rooted at teardown.
        let (link, flag) = Link::new();
        flags.push(flag);
        let head = collector.allocate(link);
        // Safety: freshly allocated on this collector; the root handle drops before the
        // collector does
        let _root = unsafe { collector.adopt(head) };
        let mut tail = head;
        for _ in 0..9 {
            let (link, flag) = Link::new();
            flags.push(flag);
            let next = collector.allocate(link);
            // Safety: `tail` and `next` are live nodes of this collector; each handle is
            // stored in its own parent
            unsafe {
                *tail.as_ref().next.lock() = Some(tail.as_ref().adopt(next));
            }
            tail = next;
        }
        cycle(&collector);

        // Plus allocations that never made it into the live set.
        for _ in 0..5 {
            let (link, flag) = Link::new();
            flags.push(flag);
            let _pending = collector.allocate(link);
        }

        assert_eq!(collector.live_objects(), 15);
    }

    // Collector destruction frees every remaining node, regardless of color or reachability.
    assert_eq!(flags.len(), 15);
    for flag in &flags {
        assert!(flag.load(Ordering::Acquire));
    }
}

#[test_log::test]
fn collect_runs_the_scheduler_predicate() {
    let collector = Collector::new();

    let (link, retained_dropped) = Link::new();
    let retained = collector.allocate(link);
    // Safety: freshly allocated on this collector; the root outlives the handle
    let _root = unsafe { collector.adopt(retained) };
    let (link, garbage_dropped) = Link::new();
    let _garbage = collector.allocate(link);

    // Warm up so both nodes are enrolled and white.
    cycle(&collector);

    // The trace discovers the rooted node but not all of the live set, so collect sweeps.
    collector.collect();
    assert!(!retained_dropped.load(Ordering::Acquire));
    assert!(garbage_dropped.load(Ordering::Acquire));
    assert_eq!(collector.live_objects(), 1);
}
