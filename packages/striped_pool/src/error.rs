use thiserror::Error;

/// Errors that can occur when constructing a [`StripedPool`][crate::StripedPool].
///
/// Pool construction is the only fallible part of the API. Steady-state operations
/// never return errors; in particular, exhaustion during allocation is an ordinary
/// `None`/`Err(value)` return, not an error of this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The backing storage for the pool's slots could not be reserved.
    ///
    /// The pool reserves all of its slot storage up front in a single contiguous
    /// allocation, so this is reported at construction time and never later.
    #[error("failed to reserve backing storage for {slot_count} pool slots ({bytes} bytes)")]
    ReservationFailed {
        /// How many slots the reservation would have covered, including the
        /// reserved sentinel slot.
        slot_count: usize,

        /// The size of the reservation that was requested, in bytes.
        bytes: usize,
    },
}

/// A specialized `Result` type for pool construction, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn reservation_failure_is_error() {
        let error = Error::ReservationFailed {
            slot_count: 128,
            bytes: 4096,
        };

        // Verify it is a valid Error that can be used in Result context.
        let result: Result<()> = Err(error);
        assert!(result.is_err());
    }

    #[test]
    fn reservation_failure_mentions_sizes() {
        let error = Error::ReservationFailed {
            slot_count: 128,
            bytes: 4096,
        };

        let message = error.to_string();
        assert!(message.contains("128"));
        assert!(message.contains("4096"));
    }
}
