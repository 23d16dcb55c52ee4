use crate::allocator::BucketAllocator;
use crate::util::MAX_ARENAS;
use crate::{config, platform};
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

static INIT_STATE: AtomicU8 = AtomicU8::new(UNINIT);

struct AllocatorHolder(UnsafeCell<BucketAllocator>);
unsafe impl Sync for AllocatorHolder {}

static ALLOCATOR: AllocatorHolder = AllocatorHolder(UnsafeCell::new(BucketAllocator::new()));

/// One-time process-wide initialization. The CAS elects a single
/// initializing thread; losers spin until the pool is ready. There is no
/// teardown: the pool lives for the process lifetime.
pub unsafe fn ensure_initialized() {
    match INIT_STATE.compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {}
        Err(_) => {
            while INIT_STATE.load(Ordering::Acquire) != READY {
                core::hint::spin_loop();
            }
            return;
        }
    }

    config::read_config();

    let configured = config::arena_count();
    let num_arenas = if configured > 0 {
        configured
    } else {
        platform::num_cpus()
    };
    (*ALLOCATOR.0.get()).init(num_arenas.clamp(1, MAX_ARENAS));

    INIT_STATE.store(READY, Ordering::Release);
}

/// The process-wide allocator instance.
///
/// # Safety
/// [`ensure_initialized`] must have completed first.
#[inline(always)]
pub unsafe fn allocator() -> &'static BucketAllocator {
    &*ALLOCATOR.0.get()
}
