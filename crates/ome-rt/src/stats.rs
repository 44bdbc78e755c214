//! GC Statistics
//!
//! Per-context counters and phase timers. Collected unconditionally (the
//! cost is two `Instant` reads per phase) and printed at teardown when the
//! configuration asks for it.

use std::io::Write;
use std::time::{Duration, Instant};

/// Statistics for one context's collector.
#[derive(Debug, Default)]
pub struct GcStats {
    /// Completed collection cycles (incremental, full, and big-object-only).
    pub collections: u64,
    /// Time spent in the mark phase.
    pub mark_time: Duration,
    /// Time spent compacting and sweeping big objects.
    pub compact_time: Duration,
}

impl GcStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gc_time(&self) -> Duration {
        self.mark_time + self.compact_time
    }

    /// Print the teardown summary.
    pub fn print_summary(&self, out: &mut dyn Write, start_time: Instant) {
        let total = start_time.elapsed();
        let gc = self.gc_time();
        let mutator = total.saturating_sub(gc);
        let overhead = if total.as_nanos() > 0 {
            gc.as_nanos() * 100 / total.as_nanos()
        } else {
            0
        };
        let _ = writeln!(out, "collections:  {}", self.collections);
        let _ = writeln!(out, "gc time:      {} ms", gc.as_millis());
        let _ = writeln!(out, "- marking:    {} ms", self.mark_time.as_millis());
        let _ = writeln!(out, "- compacting: {} ms", self.compact_time.as_millis());
        let _ = writeln!(out, "mutator time: {} ms", mutator.as_millis());
        let _ = writeln!(out, "total time:   {} ms", total.as_millis());
        let _ = writeln!(out, "gc overhead:  {}%", overhead);
    }
}

/// Phase timer that accumulates into a stats field on drop sites.
pub struct PhaseTimer {
    start: Instant,
}

impl PhaseTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
