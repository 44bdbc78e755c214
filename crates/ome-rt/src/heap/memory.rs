//! Page-Granular Memory Mapping
//!
//! Two kinds of mapping with two release disciplines:
//!
//! - The heap **reservation** is one large anonymous mapping held for the
//!   context lifetime; it is released exactly once, by drop at teardown.
//! - **Big-object bodies** are individual anonymous mappings whose release
//!   site is the big-object sweep, so they use raw map/unmap calls and are
//!   tracked by the descriptor table instead of an owning handle.
//!
//! On platforms without an anonymous-mapping primitive the layer returns
//! `None` and the runtime refuses to start.

use memmap2::{MmapMut, MmapOptions};

/// The reserved heap address range. Commit is on demand; untouched pages
/// cost nothing.
pub struct Reservation {
    mmap: MmapMut,
}

impl Reservation {
    /// Reserve `size` bytes of zeroed anonymous memory.
    pub fn reserve(size: usize) -> Option<Reservation> {
        let mmap = MmapOptions::new().len(size).map_anon().ok()?;
        Some(Reservation { mmap })
    }

    pub fn base(&self) -> usize {
        self.mmap.as_ptr() as usize
    }

    pub fn size(&self) -> usize {
        self.mmap.len()
    }
}

/// Map `size` bytes of zeroed anonymous memory for a big-object body.
///
/// Returns the body address, or `None` when the OS refuses (or the platform
/// has no mapping primitive). Paired with [`memory_free`].
#[cfg(unix)]
pub fn memory_allocate(size: usize) -> Option<usize> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        None
    } else {
        Some(ptr as usize)
    }
}

#[cfg(not(unix))]
pub fn memory_allocate(_size: usize) -> Option<usize> {
    None
}

/// Unmap a body previously returned by [`memory_allocate`].
#[cfg(unix)]
pub fn memory_free(address: usize, size: usize) {
    unsafe {
        libc::munmap(address as *mut libc::c_void, size);
    }
}

#[cfg(not(unix))]
pub fn memory_free(_address: usize, _size: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation() {
        let r = Reservation::reserve(1024 * 1024).unwrap();
        assert!(r.base() != 0);
        assert!(r.size() >= 1024 * 1024);
    }

    #[test]
    fn test_allocate_free_roundtrip() {
        let addr = memory_allocate(64 * 1024).unwrap();
        assert!(addr != 0);
        unsafe {
            *(addr as *mut u64) = 0x5a5a_5a5a;
            assert_eq!(*(addr as *const u64), 0x5a5a_5a5a);
        }
        memory_free(addr, 64 * 1024);
    }

    #[test]
    fn test_mapped_memory_is_zeroed() {
        let addr = memory_allocate(4096).unwrap();
        let slice = unsafe { std::slice::from_raw_parts(addr as *const u8, 4096) };
        assert!(slice.iter().all(|&b| b == 0));
        memory_free(addr, 4096);
    }
}
