use crate::bucket::size_class::{self, NUM_SIZE_CLASSES, SLOTS_PER_BUCKET};
use crate::header::{BlockHeader, HEADER_SIZE};
use crate::platform;
use crate::sync::RawMutex;
use core::cell::UnsafeCell;
use core::mem;
use core::ptr;
use static_assertions::const_assert_eq;

/// Header at the start of every bucket region.
///
/// The header lives inside the region it describes and consumes the first
/// `meta_slots(size)` slots of its own slot space; those slots stay occupied
/// for the bucket's entire lifetime, so `fill` never drops below that count.
#[repr(C)]
pub struct BucketHeader {
    /// Slot size of every slot in this bucket.
    pub size: u64,
    /// Occupied slots, the metadata slots included.
    pub fill: u32,
    /// Index of the arena that owns this bucket.
    pub arena: u32,
    /// One byte per slot, 1 = occupied.
    pub occupancy: [u8; SLOTS_PER_BUCKET],
}

const_assert_eq!(mem::size_of::<BucketHeader>(), 1040);

impl BucketHeader {
    /// Number of slots consumed by the header itself for a given slot size.
    pub fn meta_slots(slot_size: usize) -> usize {
        mem::size_of::<BucketHeader>().div_ceil(slot_size)
    }

    /// Map and initialize a fresh bucket for `class_index`, owned by the
    /// arena with index `arena_index`. Returns null if the mapping fails.
    ///
    /// # Safety
    /// Caller must treat a null return as allocation failure.
    pub unsafe fn create(class_index: usize, arena_index: u32) -> *mut BucketHeader {
        let base = platform::map_anonymous(size_class::bucket_bytes(class_index));
        if base.is_null() {
            return ptr::null_mut();
        }

        let slot_size = size_class::slot_size(class_index);
        let meta = Self::meta_slots(slot_size);

        let bucket = base as *mut BucketHeader;
        (*bucket).size = slot_size as u64;
        (*bucket).fill = meta as u32;
        (*bucket).arena = arena_index;
        // Mapped memory arrives zeroed; only the metadata slots need marking.
        for entry in (*bucket).occupancy.iter_mut().take(meta) {
            *entry = 1;
        }
        bucket
    }

    /// Claim the first free slot. Returns its index, or None if the bucket
    /// is full.
    fn acquire_slot(&mut self) -> Option<usize> {
        let index = self.occupancy.iter().position(|&entry| entry == 0)?;
        self.occupancy[index] = 1;
        self.fill += 1;
        Some(index)
    }

}

struct ArenaInner {
    /// Active bucket per size class, null when none is attached. A full
    /// bucket is detached and reached again only through the offsets
    /// embedded in its issued allocations.
    buckets: [*mut BucketHeader; NUM_SIZE_CLASSES],
}

/// One arena: a lock plus one active bucket pointer per size class.
/// Cache-line aligned to prevent false sharing between arenas.
#[repr(C, align(128))]
pub struct Arena {
    lock: RawMutex,
    inner: UnsafeCell<ArenaInner>,
    index: u32,
}

unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Arena {
            lock: RawMutex::new(),
            inner: UnsafeCell::new(ArenaInner {
                buckets: [ptr::null_mut(); NUM_SIZE_CLASSES],
            }),
            index: 0,
        }
    }

    /// Set the arena index (called during pool init).
    pub fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    /// Attempt to service an allocation without blocking. Returns None if
    /// the arena is busy; Some(null) if the arena was free but the page
    /// mapping failed.
    ///
    /// # Safety
    /// Caller must ensure the pool has been initialized.
    pub unsafe fn try_alloc(&self, class_index: usize) -> Option<*mut u8> {
        if !self.lock.try_lock() {
            return None;
        }
        let result = Self::alloc_inner(&mut *self.inner.get(), class_index, self.index);
        self.lock.unlock();
        Some(result)
    }

    /// Service an allocation, blocking on this arena's lock.
    ///
    /// # Safety
    /// Caller must ensure the pool has been initialized.
    pub unsafe fn alloc(&self, class_index: usize) -> *mut u8 {
        self.lock.lock();
        let result = Self::alloc_inner(&mut *self.inner.get(), class_index, self.index);
        self.lock.unlock();
        result
    }

    unsafe fn alloc_inner(inner: &mut ArenaInner, class_index: usize, arena_index: u32) -> *mut u8 {
        let mut bucket = inner.buckets[class_index];
        if bucket.is_null() {
            bucket = BucketHeader::create(class_index, arena_index);
            if bucket.is_null() {
                return ptr::null_mut();
            }
            inner.buckets[class_index] = bucket;
        }

        // An attached bucket always has a free slot: a bucket is detached
        // the moment its last slot is claimed.
        let index = match (*bucket).acquire_slot() {
            Some(index) => index,
            None => {
                inner.buckets[class_index] = ptr::null_mut();
                return ptr::null_mut();
            }
        };
        if (*bucket).fill as usize == SLOTS_PER_BUCKET {
            inner.buckets[class_index] = ptr::null_mut();
        }

        let offset = index * (*bucket).size as usize;
        let slot = (bucket as *mut u8).add(offset);
        BlockHeader::Slot { offset }.write(slot);
        slot.add(HEADER_SIZE)
    }

    /// Release the slot at `offset` bytes into `bucket`, unmapping the
    /// bucket once only its own metadata remains.
    ///
    /// # Safety
    /// `bucket` must be a live bucket owned by this arena and `offset` must
    /// point into a slot previously issued from it.
    pub unsafe fn free_slot(&self, bucket: *mut BucketHeader, offset: usize) {
        self.lock.lock();

        let b = &mut *bucket;
        let slot_size = b.size as usize;
        let index = offset / slot_size;
        b.occupancy[index] = 0;
        b.fill -= 1;

        if b.fill as usize == BucketHeader::meta_slots(slot_size) {
            // Only the bucket's own metadata is left: recycle the region.
            if let Some(class_index) = size_class::size_class_index(slot_size) {
                let inner = &mut *self.inner.get();
                if inner.buckets[class_index] == bucket {
                    inner.buckets[class_index] = ptr::null_mut();
                }
                platform::unmap(bucket as *mut u8, size_class::bucket_bytes(class_index));
            }
        }

        self.lock.unlock();
    }

    /// The currently attached bucket for a size class, null if none.
    pub fn active_bucket(&self, class_index: usize) -> *mut BucketHeader {
        self.lock.lock();
        let bucket = unsafe { (*self.inner.get()).buckets[class_index] };
        self.lock.unlock();
        bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::size_class::{slot_size, SLOTS_PER_BUCKET};

    #[test]
    fn meta_slot_counts() {
        // 1040-byte header packed into slots of each class size.
        assert_eq!(BucketHeader::meta_slots(16), 65);
        assert_eq!(BucketHeader::meta_slots(32), 33);
        assert_eq!(BucketHeader::meta_slots(64), 17);
        assert_eq!(BucketHeader::meta_slots(128), 9);
        assert_eq!(BucketHeader::meta_slots(256), 5);
        assert_eq!(BucketHeader::meta_slots(512), 3);
        assert_eq!(BucketHeader::meta_slots(1024), 2);
        assert_eq!(BucketHeader::meta_slots(2048), 1);
    }

    #[test]
    fn fresh_bucket_marks_metadata_slots() {
        unsafe {
            let bucket = BucketHeader::create(0, 3);
            assert!(!bucket.is_null());
            let b = &*bucket;
            let meta = BucketHeader::meta_slots(16);
            assert_eq!(b.size, 16);
            assert_eq!(b.arena, 3);
            assert_eq!(b.fill as usize, meta);
            assert!(b.occupancy[..meta].iter().all(|&e| e == 1));
            assert!(b.occupancy[meta..].iter().all(|&e| e == 0));
            platform::unmap(bucket as *mut u8, size_class::bucket_bytes(0));
        }
    }

    #[test]
    fn first_issued_slot_sits_past_the_metadata() {
        unsafe {
            let mut arena = Arena::new();
            arena.set_index(0);

            let p = arena.try_alloc(0).expect("arena is uncontended");
            assert!(!p.is_null());

            let bucket = arena.active_bucket(0);
            let meta = BucketHeader::meta_slots(slot_size(0));
            let expected = (bucket as *mut u8).add(meta * slot_size(0) + HEADER_SIZE);
            assert_eq!(p, expected);

            let offset = p as usize - HEADER_SIZE - bucket as usize;
            arena.free_slot(bucket, offset);
        }
    }

    #[test]
    fn slot_reuse_after_free() {
        unsafe {
            let mut arena = Arena::new();
            arena.set_index(0);

            // Keep one allocation live so the bucket is not recycled.
            let keep = arena.alloc(2);
            let p = arena.alloc(2);
            let bucket = arena.active_bucket(2);

            let offset = p as usize - HEADER_SIZE - bucket as usize;
            arena.free_slot(bucket, offset);

            // First-fit scan hands the same slot back.
            let q = arena.alloc(2);
            assert_eq!(p, q);

            let offset = q as usize - HEADER_SIZE - bucket as usize;
            arena.free_slot(bucket, offset);
            let offset = keep as usize - HEADER_SIZE - bucket as usize;
            arena.free_slot(bucket, offset);
        }
    }

    #[test]
    fn bucket_detaches_when_full_and_unmaps_when_drained() {
        unsafe {
            let mut arena = Arena::new();
            arena.set_index(0);

            // Fill every non-metadata slot of one 2048-byte bucket.
            let data_slots = SLOTS_PER_BUCKET - BucketHeader::meta_slots(slot_size(7));
            let mut ptrs = Vec::with_capacity(data_slots);
            for _ in 0..data_slots {
                let p = arena.alloc(7);
                assert!(!p.is_null());
                ptrs.push(p);
            }

            // The full bucket is no longer attached to the arena.
            assert!(arena.active_bucket(7).is_null());

            let bucket =
                ((ptrs[0] as usize - HEADER_SIZE) - slot_size(7)) as *mut BucketHeader;
            for p in ptrs {
                let offset = p as usize - HEADER_SIZE - bucket as usize;
                arena.free_slot(bucket, offset);
            }
            // Bucket was unmapped on the last free; nothing left attached.
            assert!(arena.active_bucket(7).is_null());
        }
    }
}
