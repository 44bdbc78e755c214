//! Mark Phase - Precise, Root-Seeded, Deadline-Bounded
//!
//! Roots are the live operand-stack slice. Marking is iterative: newly
//! reached inline objects are linked into a worklist threaded through the
//! headers' `mark_next` field, so the phase needs no side allocation.
//! References into big objects are resolved against the body-sorted
//! descriptor table and their reference ranges scanned on the spot.
//!
//! A candidate word is treated as a heap reference only when its tag is
//! pointer-class *and* its untagged address lies inside the live region or
//! matches a big-object body. Constants, small integers, and permanent
//! objects allocated outside the heap all fail those checks and are left
//! alone; the collector never dereferences an unvalidated candidate.
//!
//! The drain loop re-checks the deadline after every scanned object. On
//! expiry it unlinks the remaining worklist (restoring the all-zero
//! `mark_next` invariant) and reports the pass interrupted.

pub mod bitmap;

use crate::heap::header::{HEADER_SIZE, HEAP_ALIGNMENT};
use crate::heap::{header_at, value_at, Heap, StackRoots, MARK_LIST_NULL};
use crate::stats::PhaseTimer;
use crate::timer::Deadline;

impl Heap {
    /// Run a mark pass over the heap. Returns `false` when the deadline
    /// expired before the worklist drained.
    pub(crate) fn mark(&mut self, roots: StackRoots, deadline: Deadline) -> bool {
        let timer = PhaseTimer::start();

        self.mark_size = 0;
        self.mark_list = MARK_LIST_NULL;
        self.bitmap_clear();
        self.sort_big_objects();
        // An interrupted cycle can leave stale descriptor marks; a stale
        // mark would short-circuit the scan of that object's children.
        for big in self.big_objects_slice_mut() {
            big.mark = false;
        }

        self.mark_slots(roots.base, roots.end);

        while self.mark_list != MARK_LIST_NULL {
            let body = self.base() + self.mark_list as usize * HEAP_ALIGNMENT;
            let header = header_at(body - HEADER_SIZE);
            let (next, scan_offset, scan_size) = unsafe {
                let h = &mut *header;
                let fields = (h.mark_next(), h.scan_offset(), h.scan_size());
                h.clear_mark_next();
                fields
            };
            self.mark_list = next;
            let scan = body + scan_offset * 8;
            self.mark_slots(scan, scan + scan_size * 8);

            if deadline.expired() {
                log::debug!("deadline expired while marking");
                self.clear_mark_list();
                self.stats.mark_time += timer.elapsed();
                return false;
            }
        }

        self.stats.mark_time += timer.elapsed();
        true
    }

    /// Scan `[start, end)` as candidate reference words, marking newly
    /// reached objects. Inline objects are pushed on the worklist; big
    /// objects are scanned recursively.
    fn mark_slots(&mut self, start: usize, end: usize) {
        let mut slot = start;
        while slot < end {
            let value = unsafe { value_at(slot) };
            slot += 8;
            if value.tag() < self.pointer_tag {
                continue;
            }
            let body = value.untag_pointer();
            if body > self.base() && body <= self.pointer {
                let header_addr = body - HEADER_SIZE;
                if !self.is_marked(header_addr) {
                    self.mark_bitmap(header_addr);
                    let header = unsafe { &mut *header_at(header_addr) };
                    header.set_mark_next(self.mark_list);
                    self.mark_list = ((body - self.base()) / HEAP_ALIGNMENT) as u32;
                    self.mark_size += HEADER_SIZE + header.size_bytes();
                }
            } else if let Some(big) = self.find_big_object(body) {
                let (marked, scan_start, scan_end) = unsafe {
                    let b = &mut *big;
                    let start = b.body + b.scan_offset as usize * 8;
                    (b.mark, start, start + b.scan_size as usize * 8)
                };
                if !marked {
                    unsafe {
                        (*big).mark = true;
                    }
                    self.mark_slots(scan_start, scan_end);
                }
            }
        }
    }

    /// Unlink whatever is left on the worklist, zeroing each `mark_next`.
    fn clear_mark_list(&mut self) {
        while self.mark_list != MARK_LIST_NULL {
            let body = self.base() + self.mark_list as usize * HEAP_ALIGNMENT;
            let header = header_at(body - HEADER_SIZE);
            unsafe {
                self.mark_list = (*header).mark_next();
                (*header).clear_mark_next();
            }
        }
    }
}
