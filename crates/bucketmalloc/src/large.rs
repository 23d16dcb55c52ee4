//! Large allocations: one dedicated mapping per request, no bucket or arena
//! involvement.
//!
//! Region layout: `[total span: u64][block header: u64][user data]`, user
//! pointer at +16. The span is page-aligned; free reads it back from the
//! region base and returns the whole mapping at once.

use crate::header::{BlockHeader, HEADER_SIZE};
use crate::platform;
use crate::util::{align_down, PAGE_SIZE};

/// Leading bytes of a large region: span field plus block header.
pub const REGION_PREFIX: usize = 2 * HEADER_SIZE;

/// Map a dedicated region able to hold `size` user bytes.
/// Returns the user pointer, or null if the mapping fails.
///
/// # Safety
/// Caller must treat a null return as allocation failure.
pub unsafe fn create(size: usize) -> *mut u8 {
    let span = match size.checked_add(REGION_PREFIX + PAGE_SIZE - 1) {
        Some(padded) => align_down(padded, PAGE_SIZE),
        None => return core::ptr::null_mut(),
    };

    let base = platform::map_anonymous(span);
    if base.is_null() {
        return core::ptr::null_mut();
    }

    (base as *mut u64).write(span as u64);
    BlockHeader::Region {
        offset: HEADER_SIZE,
    }
    .write(base.add(HEADER_SIZE));
    base.add(REGION_PREFIX)
}

/// Unmap the region starting at `base`, whose span is stored in its first
/// 8 bytes.
///
/// # Safety
/// `base` must be the start of a region previously returned by [`create`].
pub unsafe fn release(base: *mut u8) {
    let span = (base as *const u64).read() as usize;
    platform::unmap(base, span);
}

/// User bytes available in the region starting at `base` for a pointer
/// whose header sits `offset` bytes into the region.
///
/// # Safety
/// `base` must be the start of a live region created by [`create`].
pub unsafe fn usable_size(base: *const u8, offset: usize) -> usize {
    let span = (base as *const u64).read() as usize;
    span - offset - HEADER_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_spans_whole_pages() {
        unsafe {
            let p = create(5000);
            assert!(!p.is_null());
            let base = p.sub(REGION_PREFIX);
            let span = (base as *const u64).read() as usize;
            assert_eq!(span % PAGE_SIZE, 0);
            assert!(span >= 5000 + REGION_PREFIX);
            assert_eq!(usable_size(base, HEADER_SIZE), span - REGION_PREFIX);
            release(base);
        }
    }

    #[test]
    fn header_decodes_back_to_the_base() {
        unsafe {
            let p = create(100);
            let header_ptr = p.sub(HEADER_SIZE);
            match BlockHeader::read(header_ptr) {
                BlockHeader::Region { offset } => {
                    assert_eq!(offset, HEADER_SIZE);
                    release(header_ptr.sub(offset));
                }
                other => panic!("expected a region header, got {other:?}"),
            }
        }
    }
}
