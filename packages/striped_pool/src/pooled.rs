use std::any::type_name;
use std::fmt;
use std::mem;
use std::ops::Deref;

use crate::{Handle, Lifecycle, StripedPool};

/// Scoped ownership of one pooled element.
///
/// Returned by the `allocate_pooled` methods. The element is recycled
/// automatically when the guard is dropped, so it cannot leak on early returns or
/// panics. This is the safe counterpart of the raw
/// [`recycle()`][StripedPool::recycle] API: the guard is the sole owner of record,
/// so no reference counting is involved.
///
/// # Example
///
/// ```rust
/// use striped_pool::StripedPool;
///
/// let pool = StripedPool::<String>::new(16).expect("small reservation always succeeds");
///
/// {
///     let greeting = pool
///         .allocate_pooled("hello".to_string())
///         .ok()
///         .expect("pool has free capacity");
///
///     assert_eq!(&*greeting, "hello");
/// } // recycled here
///
/// // The slot is free again.
/// let other = pool.allocate_pooled("goodbye".to_string());
/// assert!(other.is_ok());
/// ```
#[must_use = "dropping the guard recycles the element immediately"]
pub struct Pooled<'p, T, P: Lifecycle> {
    pool: &'p StripedPool<T, P>,
    handle: Handle,
}

impl<'p, T, P: Lifecycle> Pooled<'p, T, P> {
    pub(crate) fn new(pool: &'p StripedPool<T, P>, handle: Handle) -> Self {
        Self { pool, handle }
    }

    /// The handle of the guarded element, for storing in other data structures.
    ///
    /// The handle remains owned by this guard: do not recycle it manually and do
    /// not use stored copies after the guard is gone.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Detaches the element from the guard without recycling it.
    ///
    /// The caller takes over the obligation to eventually pass the returned
    /// handle to [`recycle()`][StripedPool::recycle].
    #[must_use]
    pub fn into_handle(self) -> Handle {
        let handle = self.handle;
        mem::forget(self);
        handle
    }
}

impl<T, P: Lifecycle> Deref for Pooled<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        self.pool.get(self.handle)
    }
}

impl<T, P: Lifecycle> Drop for Pooled<'_, T, P> {
    fn drop(&mut self) {
        // SAFETY: The guard is the sole owner of this handle and is going away,
        // so the handle is allocated now and unused afterwards.
        unsafe {
            self.pool.recycle(self.handle);
        }
    }
}

impl<T, P: Lifecycle> fmt::Debug for Pooled<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
