//! Background collection worker with an adaptive poll interval.
//!
//! The worker runs one tick at a time: trace the graph, sweep when the trace found activity and
//! left part of the live set behind, adjust the sleep interval from observed allocation
//! pressure, then sleep. The interval contracts while pressure rises and relaxes toward the
//! configured maximum while the heap is quiet.

use crate::collector::Collector;
use crate::config::Configuration;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::{Duration, Instant};
use tracing::debug;

/// Shutdown flag plus the condvar pair the worker sleeps on between ticks, so a stop request
/// interrupts the sleep instead of waiting out a long poll interval.
pub(crate) struct TickSignal {
    suspend: AtomicBool,
    lock: Mutex<()>,
    wakeup: Condvar,
}

impl TickSignal {
    pub(crate) fn new() -> Self {
        Self {
            suspend: AtomicBool::new(false),
            lock: Mutex::new(()),
            wakeup: Condvar::new(),
        }
    }

    pub(crate) fn reset(&self) {
        self.suspend.store(false, Ordering::Release);
    }

    pub(crate) fn suspended(&self) -> bool {
        self.suspend.load(Ordering::Acquire)
    }

    pub(crate) fn request_suspend(&self) {
        self.suspend.store(true, Ordering::Release);
        let _guard = self.lock.lock();
        self.wakeup.notify_all();
    }

    /// Sleeps for `interval`, returning early when suspension is requested.
    pub(crate) fn sleep(&self, interval: Duration) {
        let deadline = Instant::now() + interval;
        let mut guard = self.lock.lock();
        while !self.suspended() {
            if self.wakeup.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
    }
}

/// Main loop of the collector thread. Runs until suspension is requested or the collector has
/// been dropped by the application.
pub(crate) fn run(collector: &Weak<Collector>, signal: &TickSignal, config: Configuration) {
    let maximum = config.poll_interval;
    let minimum = config.minimum_poll_interval;
    let mut interval = maximum;
    let mut last_marked = 0_usize;

    debug!(
        "collector thread {:?} started",
        std::thread::current().id()
    );

    while !signal.suspended() {
        let Some(collector) = collector.upgrade() else {
            break;
        };

        // A skipped tick (mark contended by a manual sweep) leaves the interval and the
        // pressure history untouched; the next tick is the retry.
        if let Some(marked) = collector.mark() {
            if marked > 0 && marked != collector.enrolled_len() {
                collector.sweep();
            }
            interval = next_poll_interval(interval, last_marked, marked, minimum, maximum);
            last_marked = marked;
            collector.note_poll_interval(interval);
        }

        drop(collector);
        signal.sleep(interval);
    }

    debug!(
        "collector thread {:?} shutting down",
        std::thread::current().id()
    );
}

/// Adjusts the poll interval from the last two mark results and clamps it to the configured
/// bounds. The adjustment factors are heuristic and intentionally aggressive: polling speeds up
/// sharply while allocation pressure rises and backs off while it falls.
pub(crate) fn next_poll_interval(
    current: Duration,
    last_marked: usize,
    marked: usize,
    minimum: Duration,
    maximum: Duration,
) -> Duration {
    let adjusted = if last_marked == 0 && marked == 0 {
        // Quiet heap: decay toward the idle interval.
        (current + maximum) / 2
    } else if last_marked == 0 {
        // Activity resumed: accelerate toward the floor.
        (current + minimum) / 2
    } else if marked >= last_marked {
        current / 6
    } else {
        current * 4
    };
    adjusted.clamp(minimum, maximum)
}
