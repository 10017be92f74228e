//! Basic usage of the `striped_pool` crate:
//!
//! * Creating a pool.
//! * Allocating elements.
//! * Retrieving elements.
//! * Recycling elements.

use striped_pool::StripedPool;

fn main() {
    let pool = StripedPool::<String>::new(1024).expect("small reservation always succeeds");

    // Allocating an element gives you a handle that you can later use to look
    // the element up again. Handles are 4-byte values, cheap to store anywhere.
    let alice = pool
        .allocate("Alice".to_string())
        .ok()
        .expect("pool has free capacity");
    let bob = pool
        .allocate("Bob".to_string())
        .ok()
        .expect("pool has free capacity");

    println!(
        "Pool of capacity {} has materialized {} slots",
        pool.capacity(),
        pool.max_minted_index()
    );

    println!("Retrieved element: {}", *pool.get(alice));
    println!("Retrieved element: {}", *pool.get(bob));

    // Recycling returns the slot to the pool for reuse. The handle must not be
    // used afterwards - that is the caller's promise.
    // SAFETY: `bob` is allocated and never used again after this call.
    unsafe { pool.recycle(bob) };

    // The freed slot is reused instead of materializing a new one.
    let charlie = pool
        .allocate("Charlie".to_string())
        .ok()
        .expect("pool has free capacity");

    println!("Retrieved element after reuse: {}", *pool.get(charlie));
    println!(
        "Still only {} slots materialized",
        pool.max_minted_index()
    );
}
