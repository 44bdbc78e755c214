//! Big-Object Descriptor Table
//!
//! Objects whose bodies exceed the inline threshold are mapped directly
//! from the OS and never move. Each is tracked by a descriptor in a table
//! that grows *down* from `limit`, inside the heap's own address range;
//! the table's lowest entry bounds the inline free region.
//!
//! The table is kept unsorted between collections. The mark phase sorts it
//! by body address so references can be resolved by binary search; the
//! sweep sorts by `(mark, body)` so the unmarked prefix can be unmapped in
//! one pass and the table compacted by advancing its lower bound.

use super::Heap;
use super::memory;

/// Descriptor for one OS-mapped object body.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct BigObject {
    /// Body address; page-aligned, stable for the object's lifetime.
    pub body: usize,
    /// Mapped size in bytes.
    pub size: usize,
    /// Reference-region start, in words.
    pub scan_offset: u32,
    /// Reference-region length, in words.
    pub scan_size: u32,
    /// Liveness flag for the current collection.
    pub mark: bool,
    _pad: [u8; 7],
}

/// Descriptor size in bytes.
pub const BIG_OBJECT_SIZE: usize = std::mem::size_of::<BigObject>();

impl BigObject {
    pub fn new(body: usize, size: usize, scan_offset: u32, scan_size: u32) -> BigObject {
        BigObject {
            body,
            size,
            scan_offset,
            scan_size,
            mark: false,
            _pad: [0; 7],
        }
    }
}

impl Heap {
    pub fn big_object_count(&self) -> usize {
        (self.big_objects_end - self.big_objects) / BIG_OBJECT_SIZE
    }

    pub(crate) fn big_objects_slice(&self) -> &[BigObject] {
        unsafe {
            std::slice::from_raw_parts(
                self.big_objects as *const BigObject,
                self.big_object_count(),
            )
        }
    }

    pub(crate) fn big_objects_slice_mut(&mut self) -> &mut [BigObject] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.big_objects as *mut BigObject,
                self.big_object_count(),
            )
        }
    }

    /// Order the table by body address so [`Heap::find_big_object`] can
    /// binary-search it. Called at the start of every mark phase.
    pub(crate) fn sort_big_objects(&mut self) {
        self.big_objects_slice_mut().sort_unstable_by_key(|b| b.body);
    }

    /// Look up the descriptor for a candidate body address. The table must
    /// be body-sorted.
    pub(crate) fn find_big_object(&self, body: usize) -> Option<*mut BigObject> {
        let table = self.big_objects_slice();
        let index = table.binary_search_by_key(&body, |b| b.body).ok()?;
        Some(&table[index] as *const BigObject as *mut BigObject)
    }

    /// Sweep: unmap every unmarked big object, reclaim its descriptor slot,
    /// and clear survivor marks for the next cycle.
    pub(crate) fn free_big_objects(&mut self) {
        self.big_objects_slice_mut()
            .sort_unstable_by_key(|b| (b.mark, b.body));

        let mut freed = 0;
        for big in self.big_objects_slice() {
            if big.mark {
                break;
            }
            log::debug!("freeing big object {:#x} ({} bytes)", big.body, big.size);
            memory::memory_free(big.body, big.size);
            freed += 1;
        }
        // Vacated slots fall back into the free region; scrub them so it
        // stays all-zero.
        unsafe {
            std::ptr::write_bytes(
                self.big_objects as *mut u8,
                0,
                freed * BIG_OBJECT_SIZE,
            );
        }
        self.big_objects += freed * BIG_OBJECT_SIZE;
        for big in self.big_objects_slice_mut() {
            big.mark = false;
        }
        log::debug!(
            "{} big objects allocated after collection",
            self.big_object_count()
        );
    }

    /// Append a descriptor at the table's lower bound. The caller has
    /// already ensured the slot does not collide with the bump pointer.
    pub(crate) fn push_big_object(&mut self, descriptor: BigObject) {
        let slot = self.big_objects - BIG_OBJECT_SIZE;
        debug_assert!(slot >= self.pointer);
        unsafe {
            *(slot as *mut BigObject) = descriptor;
        }
        self.big_objects = slot;
    }
}
