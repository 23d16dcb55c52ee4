use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "linux")]
pub use linux as sys;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
pub use macos as sys;

/// Bytes currently mapped through this facade. Test support only; the
/// allocator itself never reads it.
static MAPPED_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Map anonymous read-write memory. Returns null on failure.
///
/// # Safety
/// Caller must ensure `size` is page-aligned and non-zero.
#[inline]
pub unsafe fn map_anonymous(size: usize) -> *mut u8 {
    let ptr = sys::map_anonymous(size);
    if !ptr.is_null() {
        MAPPED_BYTES.fetch_add(size, Ordering::Relaxed);
    }
    ptr
}

/// Unmap previously mapped memory.
///
/// # Safety
/// `ptr` must have been returned by `map_anonymous` and `size` must match.
#[inline]
pub unsafe fn unmap(ptr: *mut u8, size: usize) {
    sys::unmap(ptr, size);
    MAPPED_BYTES.fetch_sub(size, Ordering::Relaxed);
}

/// Total bytes currently mapped through this facade.
pub fn mapped_bytes() -> usize {
    MAPPED_BYTES.load(Ordering::Relaxed)
}

/// Get the number of online CPUs.
pub fn num_cpus() -> usize {
    sys::num_cpus()
}
