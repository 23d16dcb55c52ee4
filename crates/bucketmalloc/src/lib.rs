extern crate libc;

pub mod allocator;
pub mod api;
pub mod bucket;
pub mod config;
pub mod global_alloc;
pub mod header;
pub mod init;
pub mod large;
pub mod platform;
pub mod sync;
pub mod util;

pub use global_alloc::BucketMalloc;

#[doc(hidden)]
pub mod __test_support {
    pub use crate::allocator::BucketAllocator;
    pub use crate::bucket::BucketHeader;
    pub use crate::init::{allocator, ensure_initialized};
    pub use crate::platform::mapped_bytes;
}
