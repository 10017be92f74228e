use std::num::NonZero;

/// An opaque handle to an element in a [`StripedPool`][crate::StripedPool].
///
/// Handles are returned by the allocation methods and provide access to elements via
/// [`get()`][crate::StripedPool::get] and [`get_mut()`][crate::StripedPool::get_mut].
/// A handle is a 32-bit index under the hood, so it is `Copy` and cheap to store in
/// other data structures; `Option<Handle>` is the same size as the handle itself,
/// with `None` playing the role of the "no element" value.
///
/// # Handle reuse
///
/// A handle is never reissued while its element is allocated. Once the element is
/// recycled, the same handle value may be handed out again for a different element.
/// Using a handle after recycling it therefore accesses whatever element currently
/// occupies that slot - memory-safe, but a logic error.
///
/// # Example
///
/// ```rust
/// use striped_pool::StripedPool;
///
/// let pool = StripedPool::<u64>::new(16).expect("small reservation always succeeds");
///
/// let handle = pool.allocate(42).ok().expect("pool has free capacity");
///
/// // Handles can be copied and stored.
/// let stored = vec![handle];
///
/// for &h in &stored {
///     assert_eq!(*pool.get(h), 42);
/// }
/// # // SAFETY: The handle is allocated and not used after this call.
/// # unsafe { pool.recycle(handle) };
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Handle {
    index: NonZero<u32>,
}

impl Handle {
    /// Wraps a slot index. Index 0 is the reserved sentinel that never names an
    /// element, so it maps to `None`.
    #[must_use]
    pub(crate) fn from_index(index: u32) -> Option<Self> {
        NonZero::new(index).map(|index| Self { index })
    }

    /// The slot index this handle names.
    #[must_use]
    pub(crate) fn index(self) -> u32 {
        self.index.get()
    }
}
