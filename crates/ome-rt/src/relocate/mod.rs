//! Relocation Table and Reference Fixup
//!
//! Compaction records each slide as a `Relocation { src, diff }` pair: the
//! pre-move body address as a 16-byte slot index from `base`, and the
//! distance moved in the same units. Entries are appended in strictly
//! ascending `src` order, so a reference is resolved by binary-searching
//! for the greatest `src` at or below its slot and subtracting `diff`
//! slots. No entry at or below the slot means the object did not move.
//!
//! A sentinel entry with `diff == 0` is appended above the compacted range
//! before any fixup pass (at `limit` after a full pass, just above the
//! current source position after a partial one), so every reference into
//! the unmoved suffix resolves to "unmoved" instead of falling off the
//! table.
//!
//! The table is bounded; when it fills mid-compaction, a partial fixup
//! patches every reference using the entries so far, the table resets, and
//! compaction continues. The same partial fixup runs when the deadline
//! expires, leaving a densely packed prefix, an untouched suffix, and no
//! stale reference anywhere.

pub mod compact;

use crate::heap::header::{is_header_aligned, Header, HEADER_SIZE, HEAP_ALIGNMENT};
use crate::heap::{header_at, set_value_at, value_at, Heap, StackRoots};
use crate::value::Value;

/// One recorded move: `src` is the pre-compaction slot of a body, `diff`
/// the slot distance it slid toward the heap base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Relocation {
    pub src: u32,
    pub diff: u32,
}

impl Heap {
    pub(crate) fn relocation_count(&self) -> usize {
        (self.relocs_end - self.relocs) / std::mem::size_of::<Relocation>()
    }

    fn relocations(&self) -> &[Relocation] {
        unsafe {
            std::slice::from_raw_parts(self.relocs as *const Relocation, self.relocation_count())
        }
    }

    pub(crate) fn reset_relocations(&mut self) {
        self.relocs_end = self.relocs;
    }

    /// Append a move record. Bodies are 16-byte aligned, so both fields are
    /// exact in slot units.
    pub(crate) fn append_relocation(&mut self, from: usize, dest: usize) {
        debug_assert_eq!((from - self.base()) % HEAP_ALIGNMENT, 0);
        debug_assert_eq!((from - dest) % HEAP_ALIGNMENT, 0);
        debug_assert!(self.relocation_count() < self.relocs_size);
        let entry = Relocation {
            src: ((from - self.base()) / HEAP_ALIGNMENT) as u32,
            diff: ((from - dest) / HEAP_ALIGNMENT) as u32,
        };
        unsafe {
            *(self.relocs_end as *mut Relocation) = entry;
        }
        self.relocs_end += std::mem::size_of::<Relocation>();
    }

    /// Distance (in bytes) the body at `body` moved, or 0 if it did not.
    pub(crate) fn find_relocation(&self, body: usize) -> usize {
        let table = self.relocations();
        if table.is_empty() {
            return 0;
        }
        let slot = ((body - self.base()) / HEAP_ALIGNMENT) as u32;
        let index = table.partition_point(|r| r.src <= slot);
        if index == 0 {
            return 0;
        }
        table[index - 1].diff as usize * HEAP_ALIGNMENT
    }

    /// Patch every reference-class word in `[start, end)` whose target
    /// moved in this pass.
    fn relocate_slots(&self, start: usize, end: usize) {
        let mut slot = start;
        while slot < end {
            let value = unsafe { value_at(slot) };
            let tag = value.tag();
            if tag >= self.pointer_tag {
                let body = value.untag_pointer();
                if body >= self.base() && body < self.limit {
                    let diff = self.find_relocation(body);
                    if diff != 0 {
                        unsafe {
                            set_value_at(slot, Value::pointer(tag, body - diff));
                        }
                    }
                }
            }
            slot += 8;
        }
    }

    fn relocate_stack(&self, roots: StackRoots) {
        self.relocate_slots(roots.base, roots.end);
    }

    fn relocate_object(&self, header: Header, body: usize) {
        let start = body + header.scan_offset() * 8;
        self.relocate_slots(start, start + header.scan_size() * 8);
    }

    /// Fix references inside a densely packed range, walking the header
    /// chain.
    fn relocate_compacted(&self, start: usize, end: usize) {
        let mut cur = start;
        while cur < end {
            let header = unsafe { *header_at(cur) };
            if header.scan_size() > 0 {
                self.relocate_object(header, cur + HEADER_SIZE);
            }
            cur += (header.size() + 1) * HEADER_SIZE;
        }
    }

    /// Fix references inside the not-yet-compacted suffix; only marked
    /// objects matter there.
    fn relocate_uncompacted(&self, start: usize, end: usize) {
        let mut cur = start;
        while cur < end {
            let header = unsafe { *header_at(cur) };
            if self.is_marked(cur) && header.scan_size() > 0 {
                self.relocate_object(header, cur + HEADER_SIZE);
            }
            cur += (header.size() + 1) * HEADER_SIZE;
        }
    }

    fn relocate_big_objects(&self) {
        for big in self.big_objects_slice() {
            let start = big.body + big.scan_offset as usize * 8;
            self.relocate_slots(start, start + big.scan_size as usize * 8);
        }
    }

    /// Fixup after a partial pass: `compacted_end` bounds the packed
    /// prefix, `uncompacted` is the first unprocessed source header.
    pub(crate) fn relocate_partially_compacted(
        &mut self,
        roots: StackRoots,
        compacted_end: usize,
        uncompacted: usize,
    ) {
        let from = uncompacted
            + if is_header_aligned(uncompacted) {
                HEADER_SIZE
            } else {
                0
            };
        self.append_relocation(from, from);
        self.relocate_stack(roots);
        self.relocate_compacted(self.base(), compacted_end);
        self.relocate_uncompacted(uncompacted, self.pointer);
        self.relocate_big_objects();
    }

    /// Fixup after a completed pass over the whole live region.
    pub(crate) fn relocate_fully_compacted(&mut self, roots: StackRoots) {
        let limit = self.limit;
        self.append_relocation(limit, limit);
        self.relocate_stack(roots);
        self.relocate_compacted(self.base(), self.pointer);
        self.relocate_big_objects();
    }
}
