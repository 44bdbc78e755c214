//! Heap Layout and Sizing
//!
//! One reserved address range, carved as:
//!
//! ```text
//! ┌──────────────────────┬────────────┬───────────────┬────────┬────────┐
//! │   allocated objects  │ free space │ big-object    │ reloc  │  mark  │
//! │ [base, pointer)      │            │ descriptors   │ buffer │ bitmap │
//! └──────────────────────┴────────────┴───────────────┴────────┴────────┘
//! base                pointer      big_objects      limit
//! ```
//!
//! Inline objects are header-prefixed and bump-allocated at `pointer`. The
//! big-object descriptor table grows *down* from `limit`, so the effective
//! end of the free region is the table's lowest entry, not `limit` itself.
//! Above `limit` sit the relocation buffer and the mark bitmap, sized from
//! the usable region: one relocation entry per 32 bytes of heap, one bitmap
//! bit per header-sized slot.
//!
//! The live region is always walkable as a chain of header-prefixed objects
//! from `base` to `pointer`.

pub mod big_objects;
pub mod header;
pub mod memory;

use crate::config::{RuntimeConfig, MIN_HEAP_SIZE};
use crate::error::{Result, RuntimeError};
use crate::relocate::Relocation;
use crate::stats::GcStats;
use crate::value::Value;
use header::{Header, HEADER_SIZE, HEAP_ALIGNMENT};
use memory::Reservation;

/// The operand-stack slice the collector treats as roots.
#[derive(Debug, Clone, Copy)]
pub struct StackRoots {
    /// Address of the first root slot.
    pub base: usize,
    /// Address one past the last root slot.
    pub end: usize,
}

/// Sentinel terminating the mark worklist.
pub(crate) const MARK_LIST_NULL: u32 = u32::MAX;

/// The managed heap of one context.
pub struct Heap {
    reservation: Reservation,
    base: usize,
    pub(crate) pointer: usize,
    pub(crate) limit: usize,
    /// Current heap size (metadata included); never exceeds the
    /// reservation.
    size: usize,
    /// Relocation buffer bounds: `relocs_end` is the append position.
    pub(crate) relocs: usize,
    pub(crate) relocs_end: usize,
    pub(crate) relocs_size: usize,
    /// Mark bitmap bounds, in 64-bit words.
    pub(crate) bitmap: usize,
    pub(crate) bitmap_size: usize,
    /// Big-object descriptor table: `[big_objects, big_objects_end)`,
    /// anchored at `limit` and growing down.
    pub(crate) big_objects: usize,
    pub(crate) big_objects_end: usize,
    /// Values tagged at or above this are pointer candidates.
    pub(crate) pointer_tag: u64,
    /// Incremental-pass budget in cycle-counter units.
    pub(crate) latency: u64,
    pub(crate) mark_list: u32,
    pub(crate) mark_size: usize,
    pub stats: GcStats,
}

impl Heap {
    /// Reserve the address range and lay out the initial heap.
    ///
    /// The reservation starts at the configured maximum and halves until
    /// the OS accepts it; below [`MIN_HEAP_SIZE`] the runtime refuses to
    /// start.
    pub fn new(config: &RuntimeConfig, pointer_tag: u64, latency: u64) -> Result<Heap> {
        // Big-object bodies need the raw mapping layer; without it the
        // runtime cannot honor its resource discipline.
        if !cfg!(unix) {
            return Err(RuntimeError::MappingUnsupported);
        }

        let mut reserved_size = config.max_heap_size & !(HEAP_ALIGNMENT - 1);
        let reservation = loop {
            if let Some(r) = Reservation::reserve(reserved_size) {
                break r;
            }
            reserved_size /= 2;
            if reserved_size < MIN_HEAP_SIZE {
                return Err(RuntimeError::HeapReservation {
                    smallest_attempt: reserved_size * 2,
                });
            }
        };

        let base = reservation.base();
        let mut heap = Heap {
            reservation,
            base,
            pointer: base,
            limit: base,
            size: 0,
            relocs: 0,
            relocs_end: 0,
            relocs_size: 0,
            bitmap: 0,
            bitmap_size: 0,
            big_objects: 0,
            big_objects_end: 0,
            pointer_tag,
            latency,
            mark_list: MARK_LIST_NULL,
            mark_size: 0,
            stats: GcStats::new(),
        };
        heap.set_heap_base(config.initial_heap_size.min(reserved_size));
        heap.pointer = heap.base;
        heap.big_objects = heap.limit;
        heap.big_objects_end = heap.limit;

        log::info!(
            "heap reserved {} MB, initial size {} KB",
            reserved_size / (1024 * 1024),
            heap.size / 1024
        );
        Ok(heap)
    }

    /// Master sizing routine: align the usable size down, carve the
    /// relocation buffer and bitmap off the high end, and place `limit`.
    ///
    /// Leaves `pointer` and the big-object table to the caller: creation
    /// resets them, resizing preserves them.
    fn set_heap_base(&mut self, size: usize) {
        let size = size & !(HEAP_ALIGNMENT - 1);
        let relocs_size = (size >> 5) / std::mem::size_of::<Relocation>();
        let bitmap_size = (size / HEADER_SIZE).div_ceil(64);
        let metadata_size = heap_align(
            relocs_size * std::mem::size_of::<Relocation>() + bitmap_size * 8,
        );

        self.size = size;
        self.limit = self.base + size - metadata_size;
        self.relocs = self.limit;
        self.relocs_end = self.relocs;
        self.relocs_size = relocs_size;
        self.bitmap = self.relocs + relocs_size * std::mem::size_of::<Relocation>();
        self.bitmap_size = bitmap_size;

        log::debug!(
            "heap size: {} bytes total, {} bytes usable, {} relocation entries, {} bitmap words",
            size,
            size - metadata_size,
            relocs_size,
            bitmap_size
        );
    }

    /// Grow the live region within the reservation, preserving the bump
    /// offset and re-anchoring the descriptor table at the new `limit`.
    pub(crate) fn resize(&mut self, new_size: usize) {
        debug_assert!(new_size > self.size);
        debug_assert!(new_size <= self.reserved_size());
        log::debug!("resizing heap: {} KB", new_size / 1024);

        let pointer_offset = self.pointer - self.base;
        let table_bytes = self.big_objects_end - self.big_objects;
        let old_table = self.big_objects;

        self.set_heap_base(new_size);
        self.pointer = self.base + pointer_offset;
        self.big_objects_end = self.limit;
        self.big_objects = self.limit - table_bytes;
        if table_bytes > 0 {
            unsafe {
                std::ptr::copy(
                    old_table as *const u8,
                    self.big_objects as *mut u8,
                    table_bytes,
                );
            }
        }
        // Growth exposes the old metadata region to allocation; scrub it so
        // bodies keep starting out as all-False words.
        unsafe {
            std::ptr::write_bytes(
                self.pointer as *mut u8,
                0,
                self.big_objects - self.pointer,
            );
        }
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current heap size, metadata included.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn reserved_size(&self) -> usize {
        self.reservation.size()
    }

    /// Bytes of live-region-plus-free space, i.e. `limit - base`.
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.limit - self.base
    }

    /// End of the free region: the bottom of the descriptor table.
    #[inline]
    pub(crate) fn free_limit(&self) -> usize {
        self.big_objects
    }

    /// Bytes consumed by inline objects.
    #[inline]
    pub fn used(&self) -> usize {
        self.pointer - self.base
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        // Unmap every big-object body; the reservation itself is released
        // by its own drop.
        for big in self.big_objects_slice() {
            memory::memory_free(big.body, big.size);
        }
    }
}

/// Round up to the heap alignment.
#[inline]
pub(crate) fn heap_align(size: usize) -> usize {
    (size + HEAP_ALIGNMENT - 1) & !(HEAP_ALIGNMENT - 1)
}

/// Read a value slot.
#[inline]
pub(crate) unsafe fn value_at(address: usize) -> Value {
    *(address as *const Value)
}

/// Write a value slot.
#[inline]
pub(crate) unsafe fn set_value_at(address: usize, value: Value) {
    *(address as *mut Value) = value;
}

/// View an address as a header.
#[inline]
pub(crate) fn header_at(address: usize) -> *mut Header {
    address as *mut Header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::value::POINTER_TAG;

    fn small_heap() -> Heap {
        let config = RuntimeConfig {
            initial_heap_size: 0x10000,
            max_heap_size: 16 * 1024 * 1024,
            ..Default::default()
        };
        Heap::new(&config, POINTER_TAG, 0).unwrap()
    }

    #[test]
    fn test_layout_invariants() {
        let heap = small_heap();
        assert!(heap.base() <= heap.pointer());
        assert!(heap.pointer() <= heap.limit());
        assert!(heap.limit() < heap.base() + heap.size());
        assert_eq!(heap.relocs, heap.limit());
        assert_eq!(
            heap.bitmap,
            heap.relocs + heap.relocs_size * std::mem::size_of::<Relocation>()
        );
        assert_eq!(heap.big_objects, heap.limit());
        assert_eq!(heap.base() % HEAP_ALIGNMENT, 0);
    }

    #[test]
    fn test_metadata_sizing() {
        let heap = small_heap();
        // One relocation entry per 32 bytes of heap.
        assert_eq!(
            heap.relocs_size,
            (heap.size() >> 5) / std::mem::size_of::<Relocation>()
        );
        // One bit per header slot.
        assert!(heap.bitmap_size * 64 >= heap.size() / HEADER_SIZE);
    }

    #[test]
    fn test_resize_preserves_pointer_offset() {
        let mut heap = small_heap();
        heap.pointer = heap.base() + 0x800;
        let old_size = heap.size();
        heap.resize(old_size * 2);
        assert_eq!(heap.used(), 0x800);
        assert!(heap.size() == old_size * 2);
        assert_eq!(heap.big_objects, heap.limit());
    }

    #[test]
    fn test_reservation_fallback_to_smaller() {
        // An enormous max still yields a working heap on machines that
        // cannot reserve it, via halving.
        let config = RuntimeConfig {
            initial_heap_size: 0x10000,
            ..Default::default()
        };
        let heap = Heap::new(&config, POINTER_TAG, 0).unwrap();
        assert!(heap.reserved_size() >= MIN_HEAP_SIZE);
    }
}
