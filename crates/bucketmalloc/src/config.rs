use core::sync::atomic::{AtomicUsize, Ordering};

/// Cached config values (read once at init, never allocate).
static ARENA_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Read configuration from environment variables.
/// Must be called during init, before any allocations.
///
/// # Safety
/// Calls libc::getenv which is not thread-safe, so must be called from the
/// single thread that wins the init race.
pub unsafe fn read_config() {
    if let Some(val) = getenv_usize(b"BUCKETMALLOC_ARENAS\0") {
        ARENA_COUNT.store(val, Ordering::Relaxed);
    }
}

/// Configured arena count, 0 if unset.
pub fn arena_count() -> usize {
    ARENA_COUNT.load(Ordering::Relaxed)
}

/// Parse an environment variable as a usize.
///
/// # Safety
/// Calls libc::getenv.
unsafe fn getenv_usize(key: &[u8]) -> Option<usize> {
    let val = libc::getenv(key.as_ptr() as *const libc::c_char);
    if val.is_null() {
        return None;
    }

    // Parse manually (no std allocation)
    let mut result: usize = 0;
    let mut ptr = val as *const u8;
    loop {
        let byte = *ptr;
        if byte == 0 {
            break;
        }
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((byte - b'0') as usize)?;
        ptr = ptr.add(1);
    }
    Some(result)
}
