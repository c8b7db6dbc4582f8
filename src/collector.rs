//! The collector: owner of the managed population, root of the reachability graph, and driver
//! of the mark and sweep phases.

use crate::config::{Configuration, Statistics};
use crate::error::{Error, Result};
use crate::gc_box::{Color, GcBox, GcHeader};
use crate::handle::Handle;
use crate::metadata::NodeRef;
use crate::pointers::HeaderPtr;
use crate::scheduler::{self, TickSignal};
use crate::spin::SpinLock;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, trace, warn};

/// Types that can parent a managed edge: every [`GcBox`] and the [`Collector`] itself (handles
/// parented by the collector are the application's root references).
pub trait Collectable {
    /// Node header holding the color mark and the child-edge multiset.
    fn header(&self) -> &GcHeader;

    /// Produces a handle to `node` with this collectable as the parent.
    ///
    /// # Safety
    ///
    /// Same contract as [`Handle::new`]: `node` must be a live allocation from the collector
    /// that owns this parent, and the parent must outlive the handle.
    unsafe fn adopt<T>(&self, node: NonNull<GcBox<T>>) -> Handle<T>
    where
        Self: Sized,
    {
        unsafe { Handle::new(self, node) }
    }
}

const PHASE_IDLE: u8 = 0;
const PHASE_MARKING: u8 = 1;
const PHASE_SWEEPING: u8 = 2;

/// Holds the collection phase word for the duration of a scope; released on every exit path.
struct PhaseGuard<'a> {
    phase: &'a AtomicU8,
}

impl<'a> PhaseGuard<'a> {
    /// Attempts to move the collector from idle into `phase`. `None` means another phase is in
    /// progress and the caller should skip this tick.
    fn try_enter(word: &'a AtomicU8, phase: u8) -> Option<Self> {
        word.compare_exchange(PHASE_IDLE, phase, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { phase: word })
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(PHASE_IDLE, Ordering::Release);
    }
}

/// A concurrent tracing garbage collector for a managed object graph.
///
/// The collector owns the storage of every enrolled node and reclaims nodes that are no longer
/// reachable from it through chains of live [`Handle`]s, cyclic structures included. It is
/// itself a [`Collectable`]: its child multiset is the root edge set of every trace.
pub struct Collector {
    this: Weak<Self>,
    root: GcHeader,
    new_objects: SpinLock<Vec<NodeRef>>,
    objects: Mutex<Vec<NodeRef>>,
    phase: AtomicU8,
    traced: AtomicBool,
    allocations: AtomicUsize,
    signal: Arc<TickSignal>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    stats: RwLock<Statistics>,
}

impl Collector {
    /// Creates a new collector. The background thread is not started; call
    /// [`run_thread`](Self::run_thread), or drive [`mark`](Self::mark) and
    /// [`sweep`](Self::sweep) manually.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            root: GcHeader::new(),
            new_objects: SpinLock::new(Vec::new()),
            objects: Mutex::new(Vec::new()),
            phase: AtomicU8::new(PHASE_IDLE),
            traced: AtomicBool::new(false),
            allocations: AtomicUsize::new(0),
            signal: Arc::new(TickSignal::new()),
            thread: Mutex::new(None),
            stats: RwLock::new(Statistics::default()),
        })
    }

    /// Allocates a managed node and enrolls it for collection.
    ///
    /// The returned pointer must be wrapped in a [`Handle`] parented by an existing collectable
    /// (commonly the collector itself) before the node has been through a full collection
    /// cycle; an allocation no edge ever reaches is treated as unreachable and freed.
    pub fn allocate<T: Send + Sync + 'static>(&self, data: T) -> NonNull<GcBox<T>> {
        let node = NonNull::from(Box::leak(Box::new(GcBox::new(data))));
        // Safety: `node` was just leaked from a fresh Box and is tracked by exactly this entry
        let node_ref = unsafe { NodeRef::new(node) };
        {
            let mut new_objects = self.new_objects.lock();
            new_objects.push(node_ref);
        }
        self.allocations.fetch_add(1, Ordering::Relaxed);
        trace!("allocated node at {:#x}", node.as_ptr() as usize);
        node
    }

    /// Drains the new-objects buffer into the live set. Runs at the start of every mark.
    fn transfer_new_to_objects(&self) {
        let mut objects = self.objects.lock();
        let mut new_objects = self.new_objects.lock();
        if !new_objects.is_empty() {
            trace!("enrolling {} new nodes", new_objects.len());
        }
        objects.append(&mut new_objects);
    }

    /// Traces the graph from the root, coloring reachable nodes.
    ///
    /// Returns the number of nodes newly discovered by this trace (the root excluded), or
    /// `None` when a sweep is in progress and the mark was skipped; the next tick is the retry.
    pub fn mark(&self) -> Option<usize> {
        let _marking = PhaseGuard::try_enter(&self.phase, PHASE_MARKING)?;
        self.transfer_new_to_objects();

        let mut marked = 0_usize;
        let mut stack = vec![HeaderPtr::new(&self.root)];
        while let Some(current) = stack.pop() {
            // Safety: enrolled headers stay alive for the whole trace; the phase word excludes
            // sweeps, and only sweeps free nodes
            let header = unsafe { current.as_ref() };
            header.set_color(Color::Gray);
            {
                let children = header.children();
                for (&child, _multiplicity) in children.iter() {
                    // Safety: an edge out of a live node points at a live node; nothing is
                    // freed while marking holds the phase word
                    let child_header = unsafe { child.as_ref() };
                    if child_header.color() == Color::White {
                        child_header.set_color(Color::Gray);
                        stack.push(child);
                        marked += 1;
                    }
                }
            }
            header.set_color(Color::Black);
        }

        self.traced.store(true, Ordering::Release);
        let mut stats = self.stats.write();
        stats.marks_completed += 1;
        stats.last_marked = marked;
        drop(stats);
        trace!("mark discovered {marked} reachable nodes");
        Some(marked)
    }

    /// Walks the live set, freeing nodes the preceding trace left white and resetting every
    /// survivor to white for the next cycle.
    ///
    /// Returns the number of nodes freed, or `None` when the sweep was skipped: either a mark
    /// is in progress, or no trace has completed since the last sweep. The latter guard keeps
    /// "white" meaning "unreached by the preceding trace"; a second sweep in a row would
    /// otherwise free nodes whose colors were just reset.
    pub fn sweep(&self) -> Option<usize> {
        let _sweeping = PhaseGuard::try_enter(&self.phase, PHASE_SWEEPING)?;
        if !self.traced.swap(false, Ordering::AcqRel) {
            return None;
        }

        let mut objects = self.objects.lock();
        let before = objects.len();
        objects.retain(|node| match node.header().color() {
            Color::White => {
                trace!("freeing unreachable node at {:#x}", node.addr());
                // Safety: a white node was not reached from the root by the preceding trace,
                // so no live handle chain can still use it; each entry is freed at most once
                unsafe { node.free() };
                false
            }
            _ => {
                node.header().set_color(Color::White);
                true
            }
        });
        let swept = before - objects.len();
        drop(objects);

        let mut stats = self.stats.write();
        stats.sweeps_completed += 1;
        stats.objects_swept += swept;
        drop(stats);
        trace!("sweep reclaimed {swept} nodes");
        Some(swept)
    }

    /// Runs one collection cycle synchronously: a mark, followed by a sweep when the trace
    /// found activity and part of the live set was left behind (the same predicate the
    /// background scheduler uses).
    pub fn collect(&self) {
        let Some(marked) = self.mark() else {
            return;
        };
        if marked > 0 && marked != self.enrolled_len() {
            self.sweep();
        }
    }

    /// Number of nodes in the live set plus the not-yet-enrolled buffer.
    pub fn live_objects(&self) -> usize {
        self.objects.lock().len() + self.new_objects.lock().len()
    }

    pub(crate) fn enrolled_len(&self) -> usize {
        self.objects.lock().len()
    }

    /// `true` while a trace holds the collection phase.
    pub fn is_marking(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PHASE_MARKING
    }

    /// `true` while a sweep holds the collection phase.
    pub fn is_sweeping(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PHASE_SWEEPING
    }

    /// Snapshot of collector activity counters.
    pub fn statistics(&self) -> Statistics {
        let mut statistics = self.stats.read().clone();
        statistics.objects_allocated = self.allocations.load(Ordering::Relaxed);
        statistics
    }

    pub(crate) fn note_poll_interval(&self, interval: std::time::Duration) {
        self.stats.write().last_poll_interval = Some(interval);
    }

    /// Starts the background collection thread. A no-op if the thread is already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the thread cannot be spawned.
    pub fn run_thread(&self, config: Configuration) -> Result<()> {
        config.validate()?;
        let mut thread = self.thread.lock();
        if thread.is_some() {
            debug!("collector thread already running");
            return Ok(());
        }
        let Some(collector) = self.this.upgrade() else {
            return Err(Error::Sync(
                "collector is not owned by an Arc".to_string(),
            ));
        };

        self.signal.reset();
        let weak = Arc::downgrade(&collector);
        let signal = Arc::clone(&self.signal);
        let handle = thread::Builder::new()
            .name("gc-scheduler".to_string())
            .spawn(move || scheduler::run(&weak, &signal, config))
            .map_err(|error| Error::Sync(format!("failed to spawn collector thread: {error}")))?;
        *thread = Some(handle);
        debug!(
            "collector thread started with poll interval {:?}",
            config.poll_interval
        );
        Ok(())
    }

    /// Stops the background collection thread and joins it. The current tick, including any
    /// in-progress mark or sweep, completes first. A no-op if the thread is not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread fails to join.
    pub fn stop_thread(&self) -> Result<()> {
        let handle = self.thread.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        self.signal.request_suspend();
        if handle.thread().id() == thread::current().id() {
            // The last Arc was dropped from inside a tick, so the destructor is running on
            // the collector thread itself; the loop observes the suspend flag and exits on
            // its own, and there is nothing to join.
            return Ok(());
        }
        handle
            .join()
            .map_err(|_| Error::Sync("failed to join collector thread".to_string()))?;
        debug!("collector thread stopped");
        Ok(())
    }
}

impl Collectable for Collector {
    fn header(&self) -> &GcHeader {
        &self.root
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("enrolled", &self.enrolled_len())
            .field("pending", &self.new_objects.lock().len())
            .field("root_edges", &self.root.child_count())
            .finish_non_exhaustive()
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Err(error) = self.stop_thread() {
            warn!("failed to stop collector thread cleanly: {error}");
        }

        // Teardown frees every remaining node regardless of color. A handle stored in a node
        // erases its edge from that node's own header, which outlives the data during drop
        // (field order in GcBox); erasures aimed at nodes freed earlier in this loop only use
        // the child's address as a key and never dereference it.
        let pending: Vec<NodeRef> = {
            let mut new_objects = self.new_objects.lock();
            new_objects.drain(..).collect()
        };
        let enrolled: Vec<NodeRef> = {
            let mut objects = self.objects.lock();
            objects.drain(..).collect()
        };
        let freed = pending.len() + enrolled.len();
        for node in pending.iter().chain(enrolled.iter()) {
            // Safety: the collector exclusively owns enrolled storage and is going away; each
            // entry is freed exactly once
            unsafe { node.free() };
        }
        if freed > 0 {
            debug!("collector teardown freed {freed} remaining nodes");
        }
    }
}
