//! Allocation Paths
//!
//! The fast path is a bump: round the request to 8 bytes, reserve room for
//! a possible alignment-padding header, write the header, advance
//! `pointer`, hand back the body. Bodies always come from zeroed memory
//! (fresh mappings are zeroed, compaction re-zeroes the reclaimed tail),
//! so an object's reference region reads as all-False until the mutator
//! stores into it.
//!
//! Requests above the inline threshold route to the big-object path: a
//! dedicated page-granular mapping plus a descriptor in the in-heap table.
//!
//! Exhaustion escalates deterministically on both paths:
//! 1. incremental collect (deadline-bounded),
//! 2. if still under half-free, double the heap within the reservation,
//! 3. if growth is impossible, a full collect,
//! 4. abort.

use crate::context::Context;
use crate::error::{invalid_object_size, memory_exhausted};
use crate::heap::big_objects::{BigObject, BIG_OBJECT_SIZE};
use crate::heap::header::{
    is_header_aligned, Header, HEADER_SIZE, MAX_BIG_OBJECT_SIZE, MAX_HEAP_OBJECT_SIZE,
};
use crate::heap::{header_at, memory, Heap, StackRoots};

impl Heap {
    /// Allocate an inline object body. `object_size` is in bytes; the
    /// reference layout goes into the new header verbatim.
    pub(crate) fn allocate(
        &mut self,
        roots: StackRoots,
        object_size: usize,
        scan_offset: usize,
        scan_size: usize,
    ) -> usize {
        let object_size = (object_size + 7) & !7;
        if object_size > MAX_HEAP_OBJECT_SIZE * 8 {
            return self.allocate_big(roots, object_size, scan_offset, scan_size);
        }

        let alloc_size = object_size + HEADER_SIZE;
        // Room for the body plus a possible leading padding header.
        let padded_size = alloc_size + HEADER_SIZE;
        if self.pointer + padded_size >= self.free_limit() {
            self.ensure_allocate(roots, padded_size);
        }

        let mut header = self.pointer;
        if !is_header_aligned(header) {
            unsafe {
                *header_at(header) = Header::PADDING;
            }
            header += HEADER_SIZE;
        }
        unsafe {
            *header_at(header) = Header::new(object_size / 8, scan_offset, scan_size);
        }
        self.pointer = header + alloc_size;

        debug_assert!(is_header_aligned(header));
        header + HEADER_SIZE
    }

    /// Make room for an inline request of `size` bytes, escalating through
    /// the collect / grow / full-collect / abort ladder.
    fn ensure_allocate(&mut self, roots: StackRoots, size: usize) {
        if self.pointer + size < self.free_limit() {
            return;
        }
        self.collect(roots);
        loop {
            let heap_size = self.usable_size();
            if self.pointer + size >= self.base() + heap_size / 2 {
                let doubled = self.size() * 2;
                if doubled <= self.reserved_size() {
                    self.resize(doubled);
                    continue;
                }
                if self.pointer + size >= self.free_limit() {
                    self.collect_full(roots);
                    if self.pointer + size >= self.free_limit() {
                        memory_exhausted();
                    }
                }
            }
            break;
        }
    }

    /// Allocate a big object: an OS mapping tracked by a descriptor. The
    /// descriptor slot is guarded against colliding with the bump pointer
    /// before the mapping is attempted; a failed mapping first tries to
    /// recover by sweeping dead big objects, then by a full collection.
    pub(crate) fn allocate_big(
        &mut self,
        roots: StackRoots,
        object_size: usize,
        scan_offset: usize,
        scan_size: usize,
    ) -> usize {
        if object_size > MAX_BIG_OBJECT_SIZE * 8 {
            invalid_object_size(object_size);
        }

        if self.big_objects - BIG_OBJECT_SIZE < self.pointer {
            self.collect(roots);
            if self.big_objects - BIG_OBJECT_SIZE < self.pointer {
                let doubled = self.size() * 2;
                if doubled <= self.reserved_size() {
                    self.resize(doubled);
                } else {
                    self.collect_full(roots);
                    if self.big_objects - BIG_OBJECT_SIZE < self.pointer {
                        memory_exhausted();
                    }
                }
            }
        }

        let mut body = memory::memory_allocate(object_size);
        if body.is_none() {
            log::debug!("big-object mapping failed, sweeping big objects");
            self.collect_big_objects(roots);
            body = memory::memory_allocate(object_size);
            if body.is_none() {
                self.collect_full(roots);
                body = memory::memory_allocate(object_size);
            }
        }
        let Some(body) = body else {
            memory_exhausted();
        };

        self.push_big_object(BigObject::new(
            body,
            object_size,
            scan_offset as u32,
            scan_size as u32,
        ));
        log::debug!("allocated big object {:#x} ({} bytes)", body, object_size);
        body
    }
}

impl Context {
    /// Allocate `object_size` bytes with the given reference layout.
    /// Returns the body address; the caller tags it.
    pub fn allocate(&mut self, object_size: usize, scan_offset: usize, scan_size: usize) -> usize {
        let roots = self.roots();
        self.heap.allocate(roots, object_size, scan_offset, scan_size)
    }

    /// Allocate a reference-free data object.
    pub fn allocate_data(&mut self, size: usize) -> usize {
        self.allocate(size, 0, 0)
    }

    /// Allocate an object of `num_slots` reference slots.
    pub fn allocate_slots(&mut self, num_slots: usize) -> usize {
        self.allocate(8 * num_slots, 0, num_slots)
    }

    /// Allocate an array of `num_elems` elements; the size field is
    /// filled in, the elements start out False.
    pub fn allocate_array(&mut self, num_elems: usize) -> usize {
        let size = crate::object::ARRAY_ELEMS_OFFSET * 8 + 8 * num_elems;
        let body = self.allocate(size, crate::object::ARRAY_ELEMS_OFFSET, num_elems);
        unsafe {
            crate::object::set_array_size(body, num_elems as u32);
        }
        body
    }

    /// Allocate a string of `size` bytes (plus NUL); the size field is
    /// filled in.
    pub fn allocate_string(&mut self, size: usize) -> usize {
        let body = self.allocate_data(4 + size + 1);
        unsafe {
            crate::object::set_string_size(body, size as u32);
        }
        body
    }
}
