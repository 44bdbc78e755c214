//! Cycle Counting and Deadlines
//!
//! The collector bounds its incremental passes with a cycle-count deadline
//! rather than a clock read per object: one counter read per worklist step
//! is cheap on x86-64 (`rdtsc`) and tolerable on the monotonic-clock
//! fallback. [`estimate_cycles_per_ms`] converts the configured millisecond
//! latency target into counter units with a one-millisecond busy
//! calibration loop at startup.

use std::time::Instant;

/// Read the cycle counter.
///
/// On x86-64 this is `rdtsc`; elsewhere, monotonic nanoseconds since the
/// first read. Values are only ever compared against deadlines derived from
/// the same source.
#[inline]
pub fn cycle_count() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::x86_64::_rdtsc()
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        use std::sync::OnceLock;
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// Busy-spin for one millisecond of wall clock and report how many counter
/// units elapsed.
pub fn estimate_cycles_per_ms() -> u64 {
    let wall = Instant::now();
    let start = cycle_count();
    while wall.elapsed().as_micros() < 1000 {
        std::hint::spin_loop();
    }
    let cycles = cycle_count() - start;
    let elapsed_us = wall.elapsed().as_micros().max(1) as u64;
    cycles * 1000 / elapsed_us
}

/// A point on the cycle counter past which an incremental pass yields.
///
/// [`Deadline::NONE`] never expires; full collections run under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(u64);

impl Deadline {
    pub const NONE: Deadline = Deadline(0);

    /// Deadline `cycles` counter units from now.
    #[inline]
    pub fn after(cycles: u64) -> Deadline {
        // A zero counter read must not alias the unbounded sentinel.
        Deadline((cycle_count() + cycles).max(1))
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn expired(self) -> bool {
        self.0 != 0 && cycle_count() > self.0
    }
}
