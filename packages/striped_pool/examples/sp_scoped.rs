//! Scope-bound release with the `Pooled` guard: elements are recycled
//! automatically when the guard goes out of scope, even on early returns.

use striped_pool::{Pooled, StripedPool};

fn main() {
    let pool = StripedPool::<Vec<u8>>::new(64).expect("small reservation always succeeds");

    process_request(&pool, b"hello");
    process_request(&pool, b"");

    // Both guards are gone; nothing leaked.
    println!("{} slots materialized in total", pool.max_minted_index());
}

fn process_request(pool: &StripedPool<Vec<u8>>, payload: &[u8]) {
    let Ok(buffer) = pool.allocate_pooled(payload.to_vec()) else {
        println!("pool exhausted, dropping request");
        return;
    };

    if buffer.is_empty() {
        // Early return: the guard still recycles the buffer.
        println!("empty request");
        return;
    }

    consume(&buffer);
}

fn consume(buffer: &Pooled<'_, Vec<u8>, striped_pool::Eager>) {
    println!("processing {} bytes", buffer.len());
}
