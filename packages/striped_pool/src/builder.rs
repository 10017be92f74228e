use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::error::Result;
use crate::{Eager, Lifecycle, StripedPool};

const DEFAULT_STRIPE_COUNT: NonZero<u32> = nz!(32_u32);

// Must fit the 8-bit list length carried in each stripe head.
const DEFAULT_STRIPE_LIMIT: NonZero<u8> = nz!(200_u8);

/// Maps the calling thread to a stripe. The returned value is taken modulo the
/// stripe count, so any deterministic per-thread or per-processor value works.
pub type StripeSelector = fn() -> u32;

/// The default stripe selector: the ID of the processor currently executing the
/// calling thread, so threads on different processors land on different stripes
/// and stay off each other's cache lines.
fn current_processor() -> u32 {
    many_cpus::HardwareTracker::current_processor_id()
}

/// Builder for creating an instance of [`StripedPool`].
///
/// You only need to use this builder if you want to customize the pool
/// configuration. The default configuration used by `StripedPool::new()` is
/// sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use striped_pool::StripedPool;
///
/// let pool = StripedPool::<u64>::builder()
///     .capacity(1024)
///     .stripe_count(NonZero::new(8).unwrap())
///     .build()
///     .expect("reserving a small pool never fails in examples");
///
/// assert_eq!(pool.capacity(), 1024);
/// ```
#[must_use]
pub struct StripedPoolBuilder<T, P: Lifecycle = Eager> {
    capacity: u32,
    stripe_count: NonZero<u32>,
    stripe_limit: NonZero<u8>,
    selector: StripeSelector,

    _marker: PhantomData<(T, P)>,
}

impl<T, P: Lifecycle> StripedPoolBuilder<T, P> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: 0,
            stripe_count: DEFAULT_STRIPE_COUNT,
            stripe_limit: DEFAULT_STRIPE_LIMIT,
            selector: current_processor,
            _marker: PhantomData,
        }
    }

    /// Sets the nominal capacity: the number of concurrently outstanding elements
    /// the pool is guaranteed to support. Defaults to 0.
    ///
    /// The pool reserves additional slack on top of this so that free slots parked
    /// in stripes do not eat into the guarantee; see
    /// [`StripedPool::max_minted_index()`] for the observable consequence.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of independent free-list stripes. Defaults to 32.
    ///
    /// More stripes reduce cross-core contention but increase the reserved slack
    /// (`stripe_count * stripe_limit` slots beyond the nominal capacity).
    pub fn stripe_count(mut self, stripe_count: NonZero<u32>) -> Self {
        self.stripe_count = stripe_count;
        self
    }

    /// Sets how many free indices one stripe may hold before it spills its entire
    /// list to the global free list. Defaults to 200; bounded by 255 because the
    /// length is carried in 8 bits of the stripe head.
    pub fn stripe_limit(mut self, stripe_limit: NonZero<u8>) -> Self {
        self.stripe_limit = stripe_limit;
        self
    }

    /// Replaces the stripe selection function.
    ///
    /// The default maps the calling thread to its current processor. Supplying a
    /// constant function pins all threads to one stripe, which is occasionally
    /// useful for deterministic tests.
    ///
    /// # Examples
    ///
    /// ```
    /// use striped_pool::StripedPool;
    ///
    /// let pool = StripedPool::<u64>::builder()
    ///     .capacity(4)
    ///     .stripe_selector(|| 0)
    ///     .build()
    ///     .expect("reserving a small pool never fails in examples");
    /// ```
    pub fn stripe_selector(mut self, selector: StripeSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservationFailed`][crate::Error::ReservationFailed] if
    /// the backing storage cannot be reserved. This is the only runtime failure
    /// mode of construction.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized, or if the capacity plus the stripe slack does
    /// not fit in the 32-bit index space.
    pub fn build(self) -> Result<StripedPool<T, P>> {
        StripedPool::new_inner(
            self.capacity,
            self.stripe_count,
            self.stripe_limit,
            self.selector,
        )
    }
}

impl<T, P: Lifecycle> fmt::Debug for StripedPoolBuilder<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripedPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .field("stripe_count", &self.stripe_count)
            .field("stripe_limit", &self.stripe_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let builder = StripedPoolBuilder::<u64>::new();

        assert_eq!(builder.capacity, 0);
        assert_eq!(builder.stripe_count, DEFAULT_STRIPE_COUNT);
        assert_eq!(builder.stripe_limit, DEFAULT_STRIPE_LIMIT);
    }

    #[test]
    fn knobs_override_defaults() {
        let builder = StripedPoolBuilder::<u64>::new()
            .capacity(64)
            .stripe_count(nz!(2_u32))
            .stripe_limit(nz!(5_u8));

        assert_eq!(builder.capacity, 64);
        assert_eq!(builder.stripe_count, nz!(2_u32));
        assert_eq!(builder.stripe_limit, nz!(5_u8));
    }

    #[test]
    fn debug_names_the_item_type() {
        let builder = StripedPoolBuilder::<u64>::new();

        let rendered = format!("{builder:?}");
        assert!(rendered.contains("u64"));
    }
}
