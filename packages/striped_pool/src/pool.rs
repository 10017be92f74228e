use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use crate::arena::SlotArena;
use crate::error::Result;
use crate::global_list::GlobalFreeList;
use crate::slot::{ALLOCATED_LINK, NIL_INDEX, Slot};
use crate::stripe::{LocalStripe, PushOutcome};
use crate::{Eager, Handle, Lazy, Lifecycle, Pooled, StripeSelector, StripedPoolBuilder};

/// A concurrent object pool that hands out 32-bit [`Handle`]s instead of
/// pointers, backed by a single fixed reservation of slots.
///
/// Many threads may allocate and recycle concurrently. All shared state changes
/// go through lock-free compare-and-swap loops; no mutex is held on any path.
/// Cross-core contention is kept low by striping the free list: every thread is
/// deterministically mapped to one of several cache-line-padded list heads, with
/// a shared global list absorbing overflow and refilling stripes that run dry.
///
/// # Handles instead of pointers
///
/// Elements are addressed by opaque 32-bit handles. Slot storage is reserved up
/// front and never returned to the operating system while the pool lives, so a
/// stale handle reads stale contents rather than faulting - a logic error, but
/// never memory unsafety. `Option<Handle>` is 4 bytes, so handles embed cheaply
/// into other data structures.
///
/// # Element lifecycle
///
/// When element values are constructed and destroyed is a compile-time policy:
///
/// * [`Eager`] (default): construct at allocation, drop at recycle.
/// * [`Lazy`]: default-construct when a slot is first materialized, drop at pool
///   teardown; allocation hands out the slot with its previous contents.
///
/// # Exhaustion
///
/// Allocation never panics and never blocks. When the nominal capacity and the
/// over-allocation slack are exhausted, allocation returns `None` (or hands the
/// rejected value back); recycling any element makes allocation succeed again.
///
/// # Out of band access
///
/// The pool never retains references to elements. [`get()`][Self::get] hands out
/// shared references; exclusive access from multiple threads goes through
/// [`value_ptr()`][Self::value_ptr] and unsafe code, with the caller upholding
/// the usual aliasing discipline, exactly like the pinned folo pools.
///
/// # Example
///
/// ```rust
/// use striped_pool::StripedPool;
///
/// let pool = StripedPool::<u64>::new(1024).expect("small reservation always succeeds");
///
/// let handle = pool.allocate(7).ok().expect("pool has free capacity");
/// assert_eq!(*pool.get(handle), 7);
///
/// // SAFETY: The handle is allocated and never used again after this call.
/// unsafe { pool.recycle(handle) };
/// ```
pub struct StripedPool<T, P: Lifecycle = Eager> {
    arena: SlotArena<T>,

    /// The striped free-list heads. Padded so neighboring stripes never share a
    /// cache line.
    stripes: Box<[CachePadded<LocalStripe>]>,

    global: GlobalFreeList,

    /// The growth counter: how many slot indices have ever been materialized.
    /// Indices mint sequentially from 1 (slot 0 is the reserved sentinel), so
    /// this is also the highest index in circulation. Monotonic; bounded by
    /// `reserved`.
    minted: AtomicU32,

    capacity: u32,

    /// The highest index growth may mint: the nominal capacity plus
    /// `stripe_count * stripe_limit` slack, so free indices parked in stripes
    /// never eat into the capacity guarantee.
    reserved: u32,

    stripe_limit: u8,

    selector: StripeSelector,

    _policy: PhantomData<P>,
}

impl<T, P: Lifecycle> StripedPool<T, P> {
    pub(crate) fn new_inner(
        capacity: u32,
        stripe_count: NonZero<u32>,
        stripe_limit: NonZero<u8>,
        selector: StripeSelector,
    ) -> Result<Self> {
        assert!(
            size_of::<T>() > 0,
            "StripedPool must have non-zero item size"
        );

        let slack = stripe_count
            .get()
            .checked_mul(u32::from(stripe_limit.get()))
            .expect("stripe slack must fit in the 32-bit index space");

        let reserved = capacity
            .checked_add(slack)
            .expect("capacity plus stripe slack must fit in the 32-bit index space");

        // Keep the allocated-slot marker distinguishable from every real index.
        assert!(
            reserved < u32::MAX,
            "capacity plus stripe slack must leave the top index value unused"
        );

        let slot_count = usize::try_from(reserved)
            .expect("u32 always fits in usize on supported platforms")
            .checked_add(1)
            .expect("reserved is below u32::MAX so adding the sentinel cannot overflow");

        let arena = SlotArena::reserve(slot_count)?;

        let stripes = (0..stripe_count.get())
            .map(|_| CachePadded::new(LocalStripe::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(
            capacity,
            stripe_count = stripe_count.get(),
            stripe_limit = stripe_limit.get(),
            reserved,
            "pool created"
        );

        Ok(Self {
            arena,
            stripes,
            global: GlobalFreeList::new(),
            minted: AtomicU32::new(0),
            capacity,
            reserved,
            stripe_limit: stripe_limit.get(),
            selector,
            _policy: PhantomData,
        })
    }

    /// Starts building a pool with a custom configuration.
    ///
    /// Use this to change the stripe count, the per-stripe limit or the stripe
    /// selection function; `new()` covers the common case.
    pub fn builder() -> StripedPoolBuilder<T, P> {
        StripedPoolBuilder::new()
    }

    /// The nominal capacity: how many concurrently outstanding elements the pool
    /// guarantees to support before allocation can fail.
    ///
    /// The actual reservation is larger by `stripe_count * stripe_limit` slots of
    /// slack, so somewhat more than `capacity()` allocations may succeed.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The highest slot index ever materialized by growth.
    ///
    /// Indices are minted sequentially from 1, so this is also the number of
    /// slots that have storage committed. It only grows, even as elements are
    /// recycled and reused.
    ///
    /// # Example
    ///
    /// ```rust
    /// use striped_pool::StripedPool;
    ///
    /// // A fixed selector keeps the example deterministic even if the thread
    /// // migrates between processors.
    /// let pool = StripedPool::<u64>::builder()
    ///     .capacity(16)
    ///     .stripe_selector(|| 0)
    ///     .build()
    ///     .expect("reserving a small pool never fails in examples");
    /// assert_eq!(pool.max_minted_index(), 0);
    ///
    /// let handle = pool.allocate(1).ok().expect("pool has free capacity");
    /// assert_eq!(pool.max_minted_index(), 1);
    ///
    /// // Recycling and reallocating reuses the slot instead of minting another.
    /// // SAFETY: The handle is allocated and never used again after this call.
    /// unsafe { pool.recycle(handle) };
    /// let _handle = pool.allocate(2).ok().expect("pool has free capacity");
    /// assert_eq!(pool.max_minted_index(), 1);
    /// ```
    #[must_use]
    pub fn max_minted_index(&self) -> u32 {
        self.minted.load(Ordering::Relaxed)
    }

    /// The number of independent free-list stripes.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// How many free indices one stripe holds before spilling to the global list.
    #[must_use]
    pub fn stripe_limit(&self) -> u8 {
        self.stripe_limit
    }

    /// Shared access to an allocated element.
    ///
    /// To mutate elements while other handles are live, either give `T` interior
    /// mutability or use [`value_ptr()`][Self::value_ptr] with unsafe code.
    ///
    /// Calling this with a handle that was already recycled is a contract
    /// violation: debug builds assert, release builds hand back whatever the slot
    /// currently holds.
    ///
    /// # Example
    ///
    /// ```rust
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<String>::new(16).expect("small reservation always succeeds");
    ///
    /// let handle = pool
    ///     .allocate("stable".to_string())
    ///     .ok()
    ///     .expect("pool has free capacity");
    ///
    /// assert_eq!(*pool.get(handle), "stable");
    /// # // SAFETY: The handle is allocated and never used again after this call.
    /// # unsafe { pool.recycle(handle) };
    /// ```
    #[must_use]
    pub fn get(&self, handle: Handle) -> &T {
        let index = handle.index();
        self.debug_assert_allocated(index);

        // SAFETY: Handles only come from successful allocation, so the slot is
        // materialized and holds an initialized value; the pool exposes no safe
        // way to mutate it while shared references exist.
        unsafe { &*self.value_ptr_raw(index) }
    }

    /// Exclusive access to an allocated element, through an exclusive borrow of
    /// the whole pool.
    #[must_use]
    #[expect(
        clippy::needless_pass_by_ref_mut,
        reason = "the exclusive borrow is the soundness argument, not an implementation need"
    )]
    pub fn get_mut(&mut self, handle: Handle) -> &mut T {
        let index = handle.index();
        self.debug_assert_allocated(index);

        // SAFETY: The exclusive pool borrow guarantees no other references exist
        // through the pool; the slot holds an initialized value per the handle
        // contract.
        unsafe { &mut *self.value_ptr_raw(index) }
    }

    /// Pointer to an allocated element, for out-of-band access.
    ///
    /// The pool keeps no references to elements, so unsafe code may read and
    /// write through this pointer from any thread as long as it does not create
    /// references that conflict with ones handed out by [`get()`][Self::get] and
    /// honors the one-owner-mutates protocol. The pointer stays valid until the
    /// handle is recycled.
    ///
    /// # Example
    ///
    /// ```rust
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<u64>::new(16).expect("small reservation always succeeds");
    /// let handle = pool.allocate(1).ok().expect("pool has free capacity");
    ///
    /// let ptr = pool.value_ptr(handle);
    /// // SAFETY: We are the sole owner of this element and hold no references.
    /// unsafe { ptr.as_ptr().write(2) };
    ///
    /// assert_eq!(*pool.get(handle), 2);
    /// # // SAFETY: The handle is allocated and never used again after this call.
    /// # unsafe { pool.recycle(handle) };
    /// ```
    #[must_use]
    pub fn value_ptr(&self, handle: Handle) -> NonNull<T> {
        let index = handle.index();
        self.debug_assert_allocated(index);

        NonNull::new(self.value_ptr_raw(index)).expect("slot storage is never at address zero")
    }

    /// Translates an element pointer back to the handle that owns it.
    ///
    /// Returns `None` for the null pointer, and for any pointer that does not
    /// point at a slot of this pool. For every allocated handle `h`,
    /// `locate(value_ptr(h).as_ptr()) == Some(h)`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::ptr;
    ///
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<u64>::new(16).expect("small reservation always succeeds");
    /// let handle = pool.allocate(5).ok().expect("pool has free capacity");
    ///
    /// let ptr = pool.value_ptr(handle);
    /// assert_eq!(pool.locate(ptr.as_ptr()), Some(handle));
    /// assert_eq!(pool.locate(ptr::null()), None);
    /// # // SAFETY: The handle is allocated and never used again after this call.
    /// # unsafe { pool.recycle(handle) };
    /// ```
    #[must_use]
    pub fn locate(&self, ptr: *const T) -> Option<Handle> {
        let index = self.arena.index_of_element(ptr)?;

        if index != NIL_INDEX {
            self.debug_assert_allocated(index);
        }

        Handle::from_index(index)
    }

    /// Returns an element to the pool.
    ///
    /// Under the [`Eager`] policy the value is dropped here; under [`Lazy`] it
    /// stays in the slot for the next owner. The freed index goes onto the
    /// calling thread's stripe and may be handed out again by any thread.
    ///
    /// # Safety
    ///
    /// The handle must be currently allocated - obtained from a successful
    /// allocation on this pool and not recycled since - and the caller must not
    /// use the handle, or any pointer or reference to its element, after this
    /// call. Debug builds assert the allocated state, which catches double
    /// recycling and handles from other pools of the same shape.
    ///
    /// The [`Pooled`] guard wraps this call in a safe, misuse-proof interface.
    ///
    /// # Example
    ///
    /// ```rust
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<u64>::new(16).expect("small reservation always succeeds");
    /// let handle = pool.allocate(1).ok().expect("pool has free capacity");
    ///
    /// // SAFETY: The handle is allocated and never used again after this call.
    /// unsafe { pool.recycle(handle) };
    /// ```
    pub unsafe fn recycle(&self, handle: Handle) {
        let index = handle.index();
        self.debug_assert_allocated(index);

        if !P::VALUE_LIVES_WHILE_FREE {
            // SAFETY: The caller guarantees sole ownership of an allocated
            // handle; under this policy the value is live until exactly here.
            unsafe {
                ptr::drop_in_place(self.value_ptr_raw(index));
            }
        }

        let stripe = self.local_stripe();
        self.stripe_push(stripe, index);
    }

    /// Claims a free slot index: the caller's stripe first, then a batch from
    /// the global list, then growth. Returns the index and whether it was
    /// freshly minted.
    fn claim_index(&self) -> Option<(u32, bool)> {
        let stripe = self.local_stripe();

        if let Some(index) = self.stripe_pop(stripe) {
            return Some((index, false));
        }

        if let Some(batch_head) = self.global_pop_batch() {
            let index = self.adopt_batch(stripe, batch_head);
            return Some((index, false));
        }

        self.try_mint().map(|index| (index, true))
    }

    fn stripe_pop(&self, stripe: &LocalStripe) -> Option<u32> {
        let index = stripe.pop(|i| {
            // SAFETY: Free lists only ever carry materialized indices.
            unsafe { self.arena.local_link(i) }
        })?;

        // Mark the slot as handed out. Relaxed: the slot is unreachable from any
        // list now, so only the claiming thread looks at this field until the
        // next recycle publishes it again.
        // SAFETY: The popped index was on a free list, so it is materialized.
        unsafe { self.arena.local_link(index) }.store(ALLOCATED_LINK, Ordering::Relaxed);

        Some(index)
    }

    fn stripe_push(&self, stripe: &LocalStripe, index: u32) {
        loop {
            let outcome = stripe.push(index, self.stripe_limit, |i| {
                // SAFETY: Free lists only ever carry materialized indices.
                unsafe { self.arena.local_link(i) }
            });

            match outcome {
                PushOutcome::Pushed => return,
                PushOutcome::Spilled { batch_head } => {
                    self.global.push_batch(batch_head, |i| {
                        // SAFETY: The spilled batch came off a stripe, so its
                        // head is materialized.
                        unsafe { self.arena.global_link(i) }
                    });
                    trace!(batch_head, "stripe spilled a full batch to the global free list");
                }
            }
        }
    }

    fn global_pop_batch(&self) -> Option<u32> {
        let batch_head = self.global.pop_batch(|i| {
            // SAFETY: The global list only ever carries materialized indices.
            unsafe { self.arena.global_link(i) }
        })?;

        trace!(batch_head, "adopted a batch from the global free list");
        Some(batch_head)
    }

    /// Takes ownership of one freshly popped global batch: the head index goes
    /// to the caller, the remainder becomes the stripe's list if the stripe is
    /// still empty, and is re-pushed element-wise otherwise.
    fn adopt_batch(&self, stripe: &LocalStripe, batch_head: u32) -> u32 {
        // SAFETY: Batch indices are materialized.
        let second = unsafe { self.arena.local_link(batch_head) }.load(Ordering::Relaxed);

        // SAFETY: As above.
        unsafe { self.arena.local_link(batch_head) }.store(ALLOCATED_LINK, Ordering::Relaxed);

        if second != NIL_INDEX {
            // Spills detach exactly at the limit, so a batch always carries
            // `stripe_limit` indices and the remainder is one short of that.
            let remainder_len = self
                .stripe_limit
                .checked_sub(1)
                .expect("stripe limit is nonzero");

            if !stripe.install(second, remainder_len) {
                // The stripe gained entries while we were at the global list;
                // hand the remainder over one index at a time instead.
                let mut cursor = second;
                while cursor != NIL_INDEX {
                    // SAFETY: The remainder chain is materialized and, until
                    // pushed below, reachable only by this thread.
                    let next = unsafe { self.arena.local_link(cursor) }.load(Ordering::Relaxed);
                    self.stripe_push(stripe, cursor);
                    cursor = next;
                }
            }
        }

        batch_head
    }

    /// Materializes one more slot index, bounded by the reservation.
    ///
    /// The counter only moves through this bounded exchange, so it is monotonic
    /// and never exceeds `reserved` even when many threads race here.
    fn try_mint(&self) -> Option<u32> {
        let previous = self
            .minted
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |minted| {
                (minted < self.reserved).then(|| {
                    minted
                        .checked_add(1)
                        .expect("bounded by reserved, which is below u32::MAX")
                })
            })
            .ok()?;

        let index = previous
            .checked_add(1)
            .expect("bounded by reserved, which is below u32::MAX");

        // A freshly minted slot starts in the allocated state, because growth
        // only happens to satisfy an allocation.
        // SAFETY: The growth counter hands each index to exactly one thread, so
        // this first write has exclusive access; other threads see the slot only
        // after a later recycle publishes it through a free list.
        unsafe {
            self.arena.slot_ptr(index).as_ptr().write(Slot::new_allocated());
        }

        trace!(index, "materialized a new slot");
        Some(index)
    }

    fn local_stripe(&self) -> &LocalStripe {
        let token = (self.selector)();

        let stripe_count =
            u32::try_from(self.stripes.len()).expect("stripe count comes from a NonZero<u32>");
        let index = token
            .checked_rem(stripe_count)
            .expect("stripe count is nonzero");
        let index = usize::try_from(index).expect("u32 always fits in usize on supported platforms");

        self.stripes
            .get(index)
            .expect("index was reduced modulo the stripe count")
    }

    /// Pointer to the element storage of a materialized slot. Callers must only
    /// pass materialized indices.
    fn value_ptr_raw(&self, index: u32) -> *mut T {
        // SAFETY: Forwarding the materialized-index contract of the callers.
        unsafe { self.arena.slot(index) }.value_ptr()
    }

    #[cfg_attr(test, mutants::skip)] // Debug-only verification, mutation is meaningless.
    fn debug_assert_allocated(&self, index: u32) {
        if cfg!(debug_assertions) {
            assert!(
                index <= self.minted.load(Ordering::Relaxed),
                "handle {index} does not name a materialized slot of this pool of {}",
                type_name::<T>()
            );

            // SAFETY: Range-checked above.
            let link = unsafe { self.arena.local_link(index) };
            assert!(
                link.load(Ordering::Relaxed) == ALLOCATED_LINK,
                "handle {index} is not currently allocated (stale or double-recycled?) in pool of {}",
                type_name::<T>()
            );
        }
    }
}

impl<T> StripedPool<T, Eager> {
    /// Creates a pool with the given nominal capacity and default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationFailed`][crate::Error::ReservationFailed] if
    /// the backing storage cannot be reserved; this is the only failure mode.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    ///
    /// # Example
    ///
    /// ```rust
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<u64>::new(1024).expect("small reservation always succeeds");
    /// assert_eq!(pool.capacity(), 1024);
    /// ```
    pub fn new(capacity: u32) -> Result<Self> {
        Self::builder().capacity(capacity).build()
    }

    /// Allocates an element, constructing it from `value`.
    ///
    /// On exhaustion the value is handed back unchanged, so nothing is dropped
    /// just because the pool was momentarily full.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::num::NonZero;
    ///
    /// use striped_pool::StripedPool;
    ///
    /// // One nominal slot plus one slot of stripe slack.
    /// let pool = StripedPool::<u32>::builder()
    ///     .capacity(1)
    ///     .stripe_count(NonZero::new(1).unwrap())
    ///     .stripe_limit(NonZero::new(1).unwrap())
    ///     .stripe_selector(|| 0)
    ///     .build()
    ///     .expect("reserving a small pool never fails in examples");
    ///
    /// let first = pool.allocate(1).expect("within nominal capacity");
    /// let second = pool.allocate(2).expect("within the over-allocation slack");
    ///
    /// // Now the reservation is exhausted; the value comes back.
    /// assert_eq!(pool.allocate(3), Err(3));
    ///
    /// // Recycling makes exactly one subsequent allocation succeed.
    /// // SAFETY: The handle is allocated and never used again after this call.
    /// unsafe { pool.recycle(first) };
    /// assert!(pool.allocate(4).is_ok());
    /// # // SAFETY: Still allocated, never used afterwards.
    /// # unsafe { pool.recycle(second) };
    /// ```
    pub fn allocate(&self, value: T) -> std::result::Result<Handle, T> {
        match self.claim_index() {
            Some((index, _)) => {
                // SAFETY: The claimed slot is exclusively ours and holds no live
                // value under this policy.
                unsafe {
                    self.value_ptr_raw(index).write(value);
                }
                Ok(handle_for(index))
            }
            None => Err(value),
        }
    }

    /// Allocates an element, constructing it with `make` only once a slot has
    /// been secured. On exhaustion the constructor never runs.
    #[must_use]
    pub fn allocate_with(&self, make: impl FnOnce() -> T) -> Option<Handle> {
        let (index, _) = self.claim_index()?;

        // SAFETY: The claimed slot is exclusively ours and holds no live value
        // under this policy.
        unsafe {
            self.value_ptr_raw(index).write(make());
        }

        Some(handle_for(index))
    }

    /// Allocates a default-constructed element.
    #[must_use]
    pub fn allocate_default(&self) -> Option<Handle>
    where
        T: Default,
    {
        self.allocate_with(T::default)
    }

    /// Allocates an element behind a [`Pooled`] guard that recycles it when the
    /// guard goes out of scope, so the element cannot leak on any path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<u64>::new(16).expect("small reservation always succeeds");
    ///
    /// let value = pool.allocate_pooled(9).ok().expect("pool has free capacity");
    /// assert_eq!(*value, 9);
    /// // Dropping `value` recycles the element.
    /// ```
    pub fn allocate_pooled(&self, value: T) -> std::result::Result<Pooled<'_, T, Eager>, T> {
        self.allocate(value)
            .map(|handle| Pooled::new(self, handle))
    }
}

impl<T: Default> StripedPool<T, Lazy> {
    /// Creates a lazy-lifecycle pool with the given nominal capacity and default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationFailed`][crate::Error::ReservationFailed] if
    /// the backing storage cannot be reserved; this is the only failure mode.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    pub fn new(capacity: u32) -> Result<Self> {
        Self::builder().capacity(capacity).build()
    }

    /// Allocates an element without constructing anything.
    ///
    /// The first time a slot is handed out its value is default-constructed;
    /// afterwards the slot keeps whatever value its previous owner left behind,
    /// which is the point of this policy - reset it yourself if you need to.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::cell::Cell;
    ///
    /// use striped_pool::{Lazy, StripedPool};
    ///
    /// let pool = StripedPool::<Cell<u32>, Lazy>::builder()
    ///     .capacity(4)
    ///     .stripe_selector(|| 0)
    ///     .build()
    ///     .expect("reserving a small pool never fails in examples");
    ///
    /// let first = pool.allocate().expect("pool has free capacity");
    /// pool.get(first).set(42);
    /// // SAFETY: The handle is allocated and never used again after this call.
    /// unsafe { pool.recycle(first) };
    ///
    /// // The recycled slot comes back with its previous contents.
    /// let second = pool.allocate().expect("pool has free capacity");
    /// assert_eq!(pool.get(second).get(), 42);
    /// # // SAFETY: Still allocated, never used afterwards.
    /// # unsafe { pool.recycle(second) };
    /// ```
    #[must_use]
    pub fn allocate(&self) -> Option<Handle> {
        let (index, fresh) = self.claim_index()?;

        if fresh {
            // SAFETY: A freshly minted slot is exclusively ours and holds no
            // value yet; under this policy it must hold one from now on.
            unsafe {
                self.value_ptr_raw(index).write(T::default());
            }
        }

        Some(handle_for(index))
    }

    /// Allocates an element behind a [`Pooled`] guard that recycles it when the
    /// guard goes out of scope.
    #[must_use]
    pub fn allocate_pooled(&self) -> Option<Pooled<'_, T, Lazy>> {
        self.allocate().map(|handle| Pooled::new(self, handle))
    }
}

impl<T, P: Lifecycle> Drop for StripedPool<T, P> {
    fn drop(&mut self) {
        // Exclusive access: whoever gave us `&mut self` already synchronized
        // with all other threads that used the pool.
        let minted = self.minted.load(Ordering::Relaxed);

        if mem::needs_drop::<T>() {
            // Newest slots first. Under the lazy policy every materialized slot
            // holds a value; under the eager policy only the ones still handed
            // out do (free slots dropped their value at recycle time). Either
            // way each materialized index sees exactly one value drop over the
            // pool's whole lifetime.
            for index in (1..=minted).rev() {
                let value_live = P::VALUE_LIVES_WHILE_FREE || {
                    // SAFETY: index is at most `minted`, so the slot is
                    // materialized.
                    let link = unsafe { self.arena.local_link(index) };
                    link.load(Ordering::Relaxed) == ALLOCATED_LINK
                };

                if value_live {
                    // SAFETY: We have exclusive access during drop and the check
                    // above identifies exactly the slots holding live values.
                    unsafe {
                        ptr::drop_in_place(self.value_ptr_raw(index));
                    }
                }
            }
        }

        debug!(minted, "pool torn down");
    }
}

// SAFETY: The pool may be moved to and dropped on a different thread than the
// one that allocated into it, which moves element values across threads; beyond
// that it only carries raw storage management state.
unsafe impl<T: Send, P: Lifecycle> Send for StripedPool<T, P> {}

// SAFETY: Shared use hands out `&T` across threads (hence `T: Sync`) and lets
// any thread recycle, and thereby drop, values allocated elsewhere (hence
// `T: Send`). All shared pool state is atomic and mutated only through
// compare-and-swap.
unsafe impl<T: Send + Sync, P: Lifecycle> Sync for StripedPool<T, P> {}

#[must_use]
fn handle_for(index: u32) -> Handle {
    Handle::from_index(index).expect("materialized indices are always nonzero")
}

impl<T, P: Lifecycle> fmt::Debug for StripedPool<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripedPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .field("stripe_count", &self.stripes.len())
            .field("stripe_limit", &self.stripe_limit)
            .field("max_minted_index", &self.minted.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
