//! # Tricolor GC
//!
//! A concurrent mark-and-sweep tracing garbage collector for a managed object graph embedded in
//! a host program. Objects opt in by being allocated through the collector; the collector owns
//! their storage and reclaims whatever is no longer reachable from its root, cyclic structures
//! included, which reference counting cannot reclaim.
//!
//! ## Architecture
//!
//! - **[`GcBox<T>`]**: a managed node; application data with a [`GcHeader`] composed in. The
//!   header carries the tri-color mark and a spin-locked child-edge multiset.
//! - **[`Handle<T>`]**: a smart reference parented by another collectable. Handle construction,
//!   cloning and destruction are the only operations that mutate graph edges, so the multiset
//!   is an exact census of live handles at all times.
//! - **[`Collector`]**: owns the population of live nodes, serves as the trace root, and
//!   implements the mark and sweep phases.
//! - **Scheduler**: a background thread that periodically drives mark and sweep and adapts its
//!   poll interval to observed allocation pressure.
//!
//! ## Tri-color marking
//!
//! Each node is *white* (not proven reachable this cycle), *gray* (discovered, children not yet
//! scanned), *black* (discovered and scanned), or *unknown* (freshly allocated, not yet through
//! a full cycle). The trace walks depth-first from the collector root, graying white children
//! under the owning node's lock and blackening scanned nodes. The sweep frees white nodes and
//! resets every survivor to white for the next cycle.
//!
//! The mutator never pauses for the collector: per-node child sets are snapshotted under short
//! spin-locked sections, and edges inserted into an already-scanned node are simply picked up
//! by the next cycle.
//!
//! ## Example
//!
//! ```
//! use tricolor_gc::{Collectable, Collector, Configuration};
//!
//! let collector = Collector::new();
//! collector.run_thread(Configuration::default())?;
//!
//! let node = collector.allocate(String::from("managed"));
//! // Safety: `node` was just allocated by this collector, whose root outlives the handle.
//! let handle = unsafe { collector.adopt(node) };
//! assert_eq!(**handle, "managed");
//!
//! // One synchronous collection cycle: enrolls the node and colors the graph.
//! collector.collect();
//! assert_eq!(collector.live_objects(), 1);
//!
//! collector.stop_thread()?;
//! # Ok::<(), tricolor_gc::Error>(())
//! ```
//!
//! ## Ownership model
//!
//! The collector exclusively owns the storage of every enrolled node; application code only
//! references nodes through handles. A handle does not own its referent; it asserts an edge
//! and guarantees the edge is removed on destruction. Handles must not outlive the collector,
//! and a handle's parent must outlive the handle; both hold naturally when handles are stored
//! inside the nodes (or roots) that parent them.

#![allow(dead_code)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::unwrap_used)]

mod collector;
mod config;
mod error;
mod gc_box;
mod handle;
mod metadata;
mod pointers;
mod scheduler;
mod spin;

pub use collector::{Collectable, Collector};
pub use config::{Configuration, DEFAULT_POLL_INTERVAL, MINIMUM_POLL_INTERVAL, Statistics};
pub use error::{Error, Result};
pub use gc_box::{Color, GcBox, GcHeader};
pub use handle::Handle;
