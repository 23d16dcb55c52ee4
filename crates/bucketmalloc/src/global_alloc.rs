//! `#[global_allocator]` support.
//!
//! Allows Rust programs to route their heap through the bucket allocator:
//!
//! ```rust,ignore
//! use bucketmalloc::BucketMalloc;
//!
//! #[global_allocator]
//! static GLOBAL: BucketMalloc = BucketMalloc;
//! ```

use crate::header::HEADER_SIZE;
use crate::init;
use core::alloc::{GlobalAlloc, Layout};

/// A zero-sized unit struct that implements [`GlobalAlloc`] by delegating to
/// the process-wide arena pool.
///
/// Plain allocations come back 8-aligned (the block header displaces the
/// user pointer by 8 bytes); stricter layouts go through the over-allocate
/// and shift path.
pub struct BucketMalloc;

unsafe impl GlobalAlloc for BucketMalloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        let align = layout.align();

        // Zero-size types: return a well-aligned dangling pointer.
        // This is the standard pattern used by the Rust standard library.
        if size == 0 {
            return align as *mut u8;
        }

        init::ensure_initialized();
        let alloc = init::allocator();

        if align <= HEADER_SIZE {
            alloc.malloc(size)
        } else {
            alloc.alloc_aligned(size, align)
        }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.alloc(layout);
        if !ptr.is_null() && layout.size() != 0 {
            core::ptr::write_bytes(ptr, 0, layout.size());
        }
        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        // ensure_initialized() is not needed here: freeing a pointer means
        // alloc() already ran and initialized the pool.
        init::allocator().free(ptr);
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let old_size = layout.size();
        let align = layout.align();

        // Old allocation was zero-sized: this is effectively a fresh alloc.
        if old_size == 0 {
            return self.alloc(Layout::from_size_align_unchecked(new_size, align));
        }

        let alloc = init::allocator();

        if align <= HEADER_SIZE {
            alloc.realloc(ptr, new_size)
        } else {
            // The plain realloc path only guarantees 8-byte alignment, so
            // over-aligned layouts go through alloc+copy+free.
            let new_ptr = alloc.alloc_aligned(new_size, align);
            if !new_ptr.is_null() {
                let copy = old_size.min(new_size);
                core::ptr::copy_nonoverlapping(ptr, new_ptr, copy);
                alloc.free(ptr);
            }
            new_ptr
        }
    }
}
