use std::alloc::{Layout, alloc, dealloc};
use std::any::type_name;
use std::ptr::NonNull;
use std::sync::atomic::AtomicU32;

use num_integer::Integer;

use crate::Slot;
use crate::error::{Error, Result};

/// The backing storage of a pool: one contiguous reservation of `slot_count` slots
/// whose addresses never change for the lifetime of the arena.
///
/// Slots are not initialized at reservation time. A slot's memory is first
/// written when the pool materializes that index, so the operating system
/// commits pages lazily as the pool grows into its reservation.
///
/// The arena does not track which slots hold live element values - that is the
/// pool's job. On drop it releases the raw storage only; any remaining element
/// values must have been dropped by the owner beforehand.
pub(crate) struct SlotArena<T> {
    first_slot_ptr: NonNull<Slot<T>>,
    slot_count: usize,
}

impl<T> SlotArena<T> {
    /// Reserves storage for `slot_count` slots in one contiguous allocation.
    ///
    /// This is the only fallible step of pool construction: if the allocator cannot
    /// provide the region, [`Error::ReservationFailed`] is returned.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized or `slot_count` is zero.
    pub(crate) fn reserve(slot_count: usize) -> Result<Self> {
        assert!(
            size_of::<T>() > 0,
            "SlotArena must have non-zero item size"
        );
        assert!(slot_count > 0, "SlotArena must have non-zero slot count");

        let Ok(layout) = Layout::array::<Slot<T>>(slot_count) else {
            return Err(Error::ReservationFailed {
                slot_count,
                bytes: size_of::<Slot<T>>().saturating_mul(slot_count),
            });
        };

        // SAFETY: The layout is valid and non-zero-sized (guarded by the assertions above).
        let ptr = unsafe { alloc(layout) };

        let Some(first_slot_ptr) = NonNull::new(ptr.cast::<Slot<T>>()) else {
            return Err(Error::ReservationFailed {
                slot_count,
                bytes: layout.size(),
            });
        };

        Ok(Self {
            first_slot_ptr,
            slot_count,
        })
    }

    #[must_use]
    fn layout(slot_count: usize) -> Layout {
        Layout::array::<Slot<T>>(slot_count)
            .expect("layout was already calculated successfully during reservation")
    }

    /// Pointer to the slot at `index`. The address is stable for the arena's lifetime.
    ///
    /// The caller must only pass indices within the reservation; this is checked in
    /// debug builds and unchecked in release builds.
    #[must_use]
    pub(crate) fn slot_ptr(&self, index: u32) -> NonNull<Slot<T>> {
        let index = to_usize(index);

        debug_assert!(
            index < self.slot_count,
            "slot index {index} out of bounds in arena of {}",
            type_name::<T>()
        );

        // SAFETY: The index is within the reservation per the caller contract.
        unsafe { self.first_slot_ptr.add(index) }
    }

    /// Shared reference to a materialized slot.
    ///
    /// # Safety
    ///
    /// The caller must only pass indices that the pool has materialized; only those
    /// slots have initialized link fields.
    #[must_use]
    pub(crate) unsafe fn slot(&self, index: u32) -> &Slot<T> {
        let ptr = self.slot_ptr(index);

        // SAFETY: Materialized slots are fully initialized, per the caller contract.
        unsafe { ptr.as_ref() }
    }

    /// The local free-list link of a materialized slot.
    ///
    /// # Safety
    ///
    /// Same contract as [`slot()`][Self::slot].
    #[must_use]
    pub(crate) unsafe fn local_link(&self, index: u32) -> &AtomicU32 {
        // SAFETY: Forwarding the caller contract.
        unsafe { self.slot(index) }.local_next()
    }

    /// The global free-list link of a materialized slot.
    ///
    /// # Safety
    ///
    /// Same contract as [`slot()`][Self::slot].
    #[must_use]
    pub(crate) unsafe fn global_link(&self, index: u32) -> &AtomicU32 {
        // SAFETY: Forwarding the caller contract.
        unsafe { self.slot(index) }.global_next()
    }

    /// Translates an element pointer back to its slot index.
    ///
    /// Returns `None` for null pointers and for pointers that do not point at a
    /// slot of this arena (out of range or misaligned), so a garbage pointer can
    /// never produce an out-of-range index.
    #[must_use]
    pub(crate) fn index_of_element(&self, ptr: *const T) -> Option<u32> {
        let base = self.first_slot_ptr.as_ptr() as usize;
        let addr = ptr as usize;

        let offset = addr.checked_sub(base)?;
        let (index, remainder) = offset.div_rem(&size_of::<Slot<T>>());

        if remainder != 0 || index >= self.slot_count {
            return None;
        }

        Some(u32::try_from(index).expect("slot counts are always derived from u32 capacities"))
    }
}

impl<T> Drop for SlotArena<T> {
    fn drop(&mut self) {
        // SAFETY: The layout matches the one used at reservation time. Element
        // values were already dropped by the pool, so releasing the raw bytes
        // is all that remains.
        unsafe {
            dealloc(
                self.first_slot_ptr.as_ptr().cast(),
                Self::layout(self.slot_count),
            );
        }
    }
}

#[must_use]
fn to_usize(index: u32) -> usize {
    usize::try_from(index).expect("u32 always fits in usize on supported platforms")
}

#[cfg(test)]
mod tests {
    use std::ptr;
    use std::sync::atomic::Ordering;

    use crate::slot::ALLOCATED_LINK;

    use super::*;

    #[test]
    fn reserve_and_release() {
        let arena = SlotArena::<u64>::reserve(16).unwrap();
        assert_eq!(arena.slot_count, 16);
        drop(arena);
    }

    #[test]
    fn slot_addresses_are_stable_and_distinct() {
        let arena = SlotArena::<u64>::reserve(8).unwrap();

        let first = arena.slot_ptr(1);
        let second = arena.slot_ptr(2);

        assert_ne!(first, second);
        assert_eq!(first, arena.slot_ptr(1));
    }

    #[test]
    fn materialized_slot_is_readable() {
        let arena = SlotArena::<u64>::reserve(4).unwrap();

        // SAFETY: Index 1 is in bounds and we have exclusive access.
        unsafe {
            arena.slot_ptr(1).as_ptr().write(Slot::new_allocated());
        }

        // SAFETY: The slot was initialized just above.
        let slot = unsafe { arena.slot(1) };
        assert_eq!(slot.local_next().load(Ordering::Relaxed), ALLOCATED_LINK);
    }

    #[test]
    fn element_pointer_round_trips_to_index() {
        let arena = SlotArena::<u64>::reserve(4).unwrap();

        // SAFETY: Index 2 is in bounds and we have exclusive access.
        unsafe {
            arena.slot_ptr(2).as_ptr().write(Slot::new_allocated());
        }

        // SAFETY: The slot was initialized just above.
        let element_ptr = unsafe { arena.slot(2) }.value_ptr();

        assert_eq!(arena.index_of_element(element_ptr), Some(2));
    }

    #[test]
    fn foreign_pointers_do_not_translate() {
        let arena = SlotArena::<u64>::reserve(4).unwrap();

        assert_eq!(arena.index_of_element(ptr::null()), None);

        let outside = 1234_u64;
        assert_eq!(arena.index_of_element(&raw const outside), None);
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(SlotArena::<()>::reserve(4));
    }

    #[test]
    #[should_panic]
    fn zero_slots_is_panic() {
        drop(SlotArena::<u64>::reserve(0));
    }
}
