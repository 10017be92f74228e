//! A concurrent object pool that hands out 32-bit handles from a fixed arena,
//! using striped lock-free free lists to keep cross-core contention low.
//!
//! This crate provides [`StripedPool`], a fixed-capacity pool that many threads
//! can allocate from and recycle into concurrently without taking any lock.
//! Elements are addressed through opaque [`Handle`]s - 32-bit indices rather
//! than pointers - and the backing storage is reserved once and never returned
//! to the operating system while the pool lives.
//!
//! # Key features
//!
//! - **Lock-free allocate/recycle**: every shared state change is a single
//!   compare-and-swap over a tagged 64-bit head; some thread always progresses.
//! - **Striped free lists**: each thread is mapped to one of several
//!   cache-line-padded free lists (by default via its current processor), so
//!   unrelated threads rarely contend. Full stripes spill their whole list to a
//!   shared global list in one splice; empty stripes adopt batches back.
//! - **Stable addresses, stale-safe handles**: slot storage never moves and is
//!   never unmapped, so even a handle used after recycling reads initialized
//!   memory rather than faulting - a logic error, never a crash.
//! - **ABA-proof**: every free-list head carries a tag that changes on every
//!   transition, so a stale compare-and-swap fails even when the same index
//!   returns to the top of a list.
//! - **Compile-time lifecycle policy**: [`Eager`] pools construct at allocation
//!   and drop at recycle; [`Lazy`] pools default-construct each slot once and
//!   hand out previous contents on reuse.
//! - **Scoped release**: [`Pooled`] guards recycle automatically on drop.
//!
//! # Quick start
//!
//! ```rust
//! use striped_pool::StripedPool;
//!
//! let pool = StripedPool::<String>::new(1024).expect("small reservation always succeeds");
//!
//! let handle = pool
//!     .allocate("hello".to_string())
//!     .ok()
//!     .expect("pool has free capacity");
//!
//! assert_eq!(*pool.get(handle), "hello");
//!
//! // SAFETY: The handle is allocated and never used again after this call.
//! unsafe { pool.recycle(handle) };
//! ```
//!
//! # Exhaustion is a value, not an error
//!
//! Allocation never panics: when the reservation is exhausted it returns `None`
//! (or hands a rejected value back), and recycling any element makes allocation
//! succeed again. Construction is the only fallible step, failing with
//! [`Error::ReservationFailed`] when the backing storage cannot be reserved.
//!
//! # Sharing across threads
//!
//! The pool is `Sync` for `T: Send + Sync`; share it by reference and allocate
//! from any thread:
//!
//! ```rust
//! use std::thread;
//!
//! use striped_pool::StripedPool;
//!
//! let pool = StripedPool::<u64>::new(1024).expect("small reservation always succeeds");
//!
//! thread::scope(|s| {
//!     for worker in 0..4 {
//!         let pool = &pool;
//!         s.spawn(move || {
//!             for i in 0..100 {
//!                 let handle = pool.allocate(worker * 1000 + i).ok().expect("within capacity");
//!                 assert_eq!(*pool.get(handle), worker * 1000 + i);
//!                 // SAFETY: The handle is allocated and never used again.
//!                 unsafe { pool.recycle(handle) };
//!             }
//!         });
//!     }
//! });
//! ```

mod arena;
mod builder;
mod error;
mod global_list;
mod handle;
mod lifecycle;
mod pool;
mod pooled;
mod slot;
mod stripe;

pub use builder::{StripeSelector, StripedPoolBuilder};
pub use error::Error;
pub use handle::Handle;
pub use lifecycle::{Eager, Lazy, Lifecycle};
pub use pool::StripedPool;
pub use pooled::Pooled;

pub(crate) use slot::Slot;
