//! # Holding Tank Benchmark
//!
//! Measures the hot operations the game loop hits every frame:
//! 1. Alloc/free cycles on a warm pool
//! 2. LRU selection over a full used chain
//! 3. Compaction of a checkerboard-fragmented arena

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use holdtank_core::{ManualClock, MemoryPool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const POOL_BYTES: usize = 1024 * 1024;
const BLOCKS: u32 = 2_000;

fn filled_pool(seed: u64) -> MemoryPool<ManualClock> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pool = MemoryPool::with_clock(POOL_BYTES, ManualClock::default()).unwrap();
    for id in 0..BLOCKS {
        pool.clock().advance(rng.gen_range(1..64));
        if pool.alloc(rng.gen_range(16..=400), id).is_err() {
            break;
        }
    }
    pool
}

fn bench_alloc_free(c: &mut Criterion) {
    let mut pool = filled_pool(1);
    let sizes: Vec<usize> = {
        let mut rng = StdRng::seed_from_u64(2);
        (0..256).map(|_| rng.gen_range(16..=400)).collect()
    };

    c.bench_function("alloc_free_cycle_256", |b| {
        b.iter(|| {
            for (id, &size) in (0u32..).zip(&sizes) {
                if let Ok(handle) = pool.alloc(black_box(size), id) {
                    pool.free(handle).unwrap();
                }
            }
        });
    });
}

fn bench_find_oldest(c: &mut Criterion) {
    let pool = filled_pool(3);
    c.bench_function("find_oldest_full_chain", |b| {
        b.iter(|| black_box(pool.find_oldest()));
    });
}

fn bench_cleanup(c: &mut Criterion) {
    c.bench_function("cleanup_checkerboard", |b| {
        b.iter_batched(
            || {
                let mut pool = filled_pool(4);
                let handles: Vec<_> = pool.iter().map(|info| info.handle).collect();
                for handle in handles.into_iter().step_by(2) {
                    pool.free(handle).unwrap();
                }
                pool
            },
            |mut pool| black_box(pool.cleanup().paragraphs_moved),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_alloc_free, bench_find_oldest, bench_cleanup);
criterion_main!(benches);
