use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::AtomicU32;

/// The index value that never names a real slot. Slot 0 of the arena is reserved so
/// that this can double as the "empty list" head value in the free lists.
pub(crate) const NIL_INDEX: u32 = 0;

/// The `local_next` value marking a slot as currently handed out to a caller.
///
/// Valid slot indices are strictly below `u32::MAX` (the pool enforces this at
/// construction), so this value can never be confused with a real successor link.
pub(crate) const ALLOCATED_LINK: u32 = u32::MAX;

/// Storage for one pooled element plus its intrusive free-list links.
///
/// The element value leads the struct under `repr(C)`, so a pointer to the value is
/// also a pointer to the slot. Pointer-to-handle translation relies on this.
///
/// The value is wrapped in `UnsafeCell` because the pool writes element values
/// through raw pointers while other threads may transiently hold shared references
/// to the slot for link traversal.
#[repr(C)]
pub(crate) struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,

    /// Successor in a local stripe's free list, or [`ALLOCATED_LINK`] while the
    /// slot is handed out. Also carries the intra-batch chain while the slot sits
    /// on the global free list.
    local_next: AtomicU32,

    /// Successor batch head while this slot heads a batch on the global free list.
    global_next: AtomicU32,
}

impl<T> Slot<T> {
    /// A freshly materialized slot: no value yet, marked as handed out, because
    /// growth only happens to satisfy an allocation.
    #[must_use]
    pub(crate) fn new_allocated() -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            local_next: AtomicU32::new(ALLOCATED_LINK),
            global_next: AtomicU32::new(NIL_INDEX),
        }
    }

    /// Pointer to the element storage. Whether the storage holds a live value is
    /// tracked by the pool, not the slot.
    #[must_use]
    pub(crate) fn value_ptr(&self) -> *mut T {
        self.value.get().cast::<T>()
    }

    #[must_use]
    pub(crate) fn local_next(&self) -> &AtomicU32 {
        &self.local_next
    }

    #[must_use]
    pub(crate) fn global_next(&self) -> &AtomicU32 {
        &self.global_next
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;
    use std::sync::atomic::Ordering;

    use super::*;

    #[test]
    fn value_leads_the_slot() {
        // Pointer-to-handle translation assumes the element sits at offset zero.
        assert_eq!(offset_of!(Slot<u64>, value), 0);
        assert_eq!(offset_of!(Slot<[u8; 3]>, value), 0);
    }

    #[test]
    fn fresh_slot_is_marked_allocated() {
        let slot = Slot::<u32>::new_allocated();

        assert_eq!(slot.local_next().load(Ordering::Relaxed), ALLOCATED_LINK);
        assert_eq!(slot.global_next().load(Ordering::Relaxed), NIL_INDEX);
    }

    #[test]
    fn value_write_read_round_trips() {
        let slot = Slot::<u64>::new_allocated();

        // SAFETY: We have exclusive access to the slot in this test.
        unsafe {
            slot.value_ptr().write(1234);
        }

        // SAFETY: The value was initialized just above.
        let value = unsafe { slot.value_ptr().read() };
        assert_eq!(value, 1234);
    }
}
