//! Basic benchmarks for the `striped_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use striped_pool::StripedPool;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

type TestItem = u64;
const TEST_VALUE: TestItem = 1024;
const POOL_CAPACITY: u32 = 65536;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("striped_basic");

    group.bench_function("build_empty", |b| {
        b.iter(|| {
            drop(black_box(
                StripedPool::<TestItem>::new(POOL_CAPACITY).unwrap(),
            ));
        });
    });

    group.bench_function("allocate_first", |b| {
        b.iter_custom(|iters| {
            let pools = iter::repeat_with(|| StripedPool::<TestItem>::new(POOL_CAPACITY).unwrap())
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &pools {
                _ = black_box(pool.allocate(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_recycle_churn", |b| {
        let pool = StripedPool::<TestItem>::new(POOL_CAPACITY).unwrap();

        // Warm the slot so the loop measures reuse, not growth.
        let warm = pool.allocate(TEST_VALUE).ok().unwrap();
        // SAFETY: The handle is allocated and not used again.
        unsafe { pool.recycle(warm) };

        b.iter(|| {
            let handle = black_box(pool.allocate(black_box(TEST_VALUE)).ok().unwrap());
            // SAFETY: The handle is allocated and not used again.
            unsafe { pool.recycle(handle) };
        });
    });

    group.bench_function("read_one", |b| {
        let pool = StripedPool::<TestItem>::new(POOL_CAPACITY).unwrap();
        let handle = pool.allocate(TEST_VALUE).ok().unwrap();

        b.iter(|| {
            _ = black_box(*pool.get(black_box(handle)));
        });
    });

    group.bench_function("locate_one", |b| {
        let pool = StripedPool::<TestItem>::new(POOL_CAPACITY).unwrap();
        let handle = pool.allocate(TEST_VALUE).ok().unwrap();
        let ptr = pool.value_ptr(handle);

        b.iter(|| {
            _ = black_box(pool.locate(black_box(ptr.as_ptr())));
        });
    });

    group.finish();
}
