//! Concurrent allocation and recycling from multiple threads.
//!
//! Every thread is mapped to its own free-list stripe (by current processor),
//! so the threads mostly stay out of each other's way.

use std::thread;

use striped_pool::StripedPool;

fn main() {
    let pool = StripedPool::<u64>::new(4096).expect("small reservation always succeeds");

    thread::scope(|s| {
        for worker in 0..4_u64 {
            let pool = &pool;
            s.spawn(move || {
                for i in 0..10_000_u64 {
                    let handle = pool
                        .allocate(worker.wrapping_mul(1_000_000).wrapping_add(i))
                        .ok()
                        .expect("well within capacity");

                    // SAFETY: The handle is allocated and never used again.
                    unsafe { pool.recycle(handle) };
                }
            });
        }
    });

    println!(
        "40000 allocations were served by {} materialized slots",
        pool.max_minted_index()
    );
}
