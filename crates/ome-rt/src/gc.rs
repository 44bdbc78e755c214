//! Collection Orchestration
//!
//! One cycle runs mark, then (policy permitting) compact, then the
//! big-object sweep folded into whichever phase reaches it first:
//!
//! ```text
//! Idle ──► Marking ──┬─► Interrupted ─────────────────────► Idle
//!                    └─► Marked ──┬─► SkipCompact (sweep) ─► Idle
//!                                 └─► Compacting ──┬─► Interrupted ─► Idle
//!                                                  └─► Compacted ───► Idle
//! ```
//!
//! Incremental cycles run under the configured latency budget; a pass that
//! yields leaves the heap fully traversable and every reference valid, and
//! the next allocation that crosses a threshold drives another cycle. Full
//! collections run the same phases with no deadline and are reserved for
//! the exhaustion ladder.
//!
//! Compaction is skipped when more than half the heap is live (packing
//! would move a lot to free a little) or when marking already consumed the
//! budget; the big-object sweep still runs on the completed mark so
//! unreachable mappings are not retained. After an interrupted mark
//! nothing is freed, since the mark state is incomplete.

use crate::heap::{Heap, StackRoots};
use crate::stats::PhaseTimer;
use crate::timer::Deadline;

/// How a collection cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Mark and compact both ran to completion.
    Compacted,
    /// Marking finished; compaction was skipped by policy.
    SkippedCompact,
    /// The deadline expired mid-phase.
    Interrupted,
}

impl Heap {
    /// One incremental, deadline-bounded collection cycle.
    pub(crate) fn collect(&mut self, roots: StackRoots) -> CollectOutcome {
        log::debug!("begin collection (heap size: {} KB)", self.size() / 1024);
        let deadline = Deadline::after(self.latency);

        let outcome = if self.mark(roots, deadline) {
            log::debug!("{} bytes marked", self.mark_size);
            if self.mark_size < self.size() / 2 && !deadline.expired() {
                if self.compact(roots, deadline) {
                    log::debug!("{} KB used after collection", self.used() / 1024);
                    CollectOutcome::Compacted
                } else {
                    CollectOutcome::Interrupted
                }
            } else {
                log::debug!("skipping compaction");
                let timer = PhaseTimer::start();
                self.free_big_objects();
                self.stats.compact_time += timer.elapsed();
                CollectOutcome::SkippedCompact
            }
        } else {
            CollectOutcome::Interrupted
        };

        self.stats.collections += 1;
        outcome
    }

    /// A full stop-the-world collection: no deadline, always compacts.
    pub(crate) fn collect_full(&mut self, roots: StackRoots) {
        log::debug!("begin full collection (heap size: {} KB)", self.size() / 1024);
        self.mark(roots, Deadline::NONE);
        self.compact(roots, Deadline::NONE);
        self.stats.collections += 1;
        log::debug!("full collection done ({} KB used)", self.used() / 1024);
    }

    /// Mark, then sweep big objects only. Used when an OS mapping request
    /// fails: inline compaction cannot help, unmapping dead big objects
    /// can.
    pub(crate) fn collect_big_objects(&mut self, roots: StackRoots) {
        self.mark(roots, Deadline::NONE);
        let timer = PhaseTimer::start();
        self.free_big_objects();
        self.stats.compact_time += timer.elapsed();
        self.stats.collections += 1;
    }
}
