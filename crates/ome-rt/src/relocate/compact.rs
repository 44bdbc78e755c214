//! Sliding Compaction
//!
//! Walks the mark bitmap low to high, gathers each contiguous run of
//! marked objects (zero-size padding headers directly before a marked
//! successor ride along), and slides the run down to the packing frontier.
//! `dest` keeps the body-alignment invariant: whenever it would leave a
//! misaligned header, a zero-size padding header fills the slot first.
//!
//! Each moved run appends one relocation entry. The buffer keeps its last
//! slot free for the boundary sentinel; consuming the slot before it
//! triggers a partial fixup and a table reset, which is what lets a
//! bounded table compact an unbounded number of runs. Deadline expiry
//! takes the same exit: fix up, reset, report interrupted. Either way the
//! packed prefix, untouched suffix, stack, and big objects are all
//! consistent when the pass yields.
//!
//! Sliding preserves allocation order and copies header and body bytes
//! verbatim; only reference slots are rewritten afterwards.

use crate::heap::header::{is_header_aligned, Header, HEADER_SIZE};
use crate::heap::{header_at, Heap, StackRoots};
use crate::stats::PhaseTimer;
use crate::timer::Deadline;

impl Heap {
    /// Run a compaction pass. Returns `false` when the deadline expired
    /// before the whole live region was packed.
    pub(crate) fn compact(&mut self, roots: StackRoots, deadline: Deadline) -> bool {
        let timer = PhaseTimer::start();

        self.free_big_objects();
        if deadline.expired() {
            log::debug!("deadline expired while compacting");
            self.stats.compact_time += timer.elapsed();
            return false;
        }

        let base = self.base();
        let end = self.pointer;
        let end_index = (end - base) / HEADER_SIZE;
        let mut dest = base;
        let mut moved = 0usize;
        self.reset_relocations();

        let mut index = 0;
        while index < end_index {
            index = match self.scan_bitmap(index) {
                Some(i) if i < end_index => i,
                _ => break,
            };

            // Extend the run over marked objects and the padding slots
            // that keep a marked successor aligned.
            let src = base + index * HEADER_SIZE;
            let mut cur = src;
            while cur < end {
                let header = unsafe { *header_at(cur) };
                let keep = self.is_marked(cur)
                    || (header.is_padding()
                        && cur + HEADER_SIZE < end
                        && self.is_marked(cur + HEADER_SIZE));
                if !keep {
                    break;
                }
                cur += (header.size() + 1) * HEADER_SIZE;
            }
            let run_bytes = cur - src;

            if !is_header_aligned(dest) {
                unsafe {
                    *header_at(dest) = Header::PADDING;
                }
                dest += HEADER_SIZE;
            }
            if dest != src && run_bytes > 0 {
                unsafe {
                    std::ptr::copy(src as *const u8, dest as *mut u8, run_bytes);
                }
                moved += run_bytes;
                self.append_relocation(src + HEADER_SIZE, dest + HEADER_SIZE);
                if self.relocation_count() >= self.relocs_size - 1 {
                    log::debug!("relocation buffer full");
                    self.relocate_partially_compacted(roots, dest + run_bytes, cur);
                    self.reset_relocations();
                }
            }
            dest += run_bytes;
            index = (cur - base) / HEADER_SIZE;

            if deadline.expired() {
                log::debug!("deadline expired while compacting ({} KB moved)", moved / 1024);
                self.relocate_partially_compacted(roots, dest, cur);
                self.reset_relocations();
                self.stats.compact_time += timer.elapsed();
                return false;
            }
        }

        let freed = self.pointer - dest;
        self.pointer = dest;
        // Zero the reclaimed tail up to the descriptor table, so future
        // bodies start out as all-False words.
        if self.pointer < self.free_limit() {
            unsafe {
                std::ptr::write_bytes(
                    self.pointer as *mut u8,
                    0,
                    self.free_limit() - self.pointer,
                );
            }
        }

        self.relocate_fully_compacted(roots);

        log::debug!("compacted {} KB, freed {} KB", moved / 1024, freed / 1024);
        self.stats.compact_time += timer.elapsed();
        true
    }
}
