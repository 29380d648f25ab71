//! Randomized churn: every operation mix must leave both chains intact.

use holdtank_core::{ChunkHandle, ManualClock, MemoryPool, PoolError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEEDS: [u64; 4] = [1, 7, 0xDEAD_BEEF, 0x5EED_CAFE];
const STEPS: usize = 2_000;

/// Drops handles the pool no longer recognizes.
fn refresh(live: &mut Vec<ChunkHandle>, pool: &MemoryPool<ManualClock>) {
    live.retain(|handle| pool.contains(*handle));
}

fn churn(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pool = MemoryPool::with_clock(16 * 1024, ManualClock::default()).unwrap();
    let mut live: Vec<ChunkHandle> = Vec::new();

    for step in 0..STEPS {
        pool.clock().advance(rng.gen_range(0..40));

        match rng.gen_range(0..100) {
            0..=44 => {
                let bytes = rng.gen_range(1..=768);
                match pool.alloc(bytes, rng.gen_range(0..64)) {
                    Ok(handle) => {
                        assert_eq!(pool.bytes(handle).unwrap().len(), bytes);
                        live.push(handle);
                    }
                    Err(PoolError::OutOfCapacity { largest, .. }) => {
                        assert!(largest < bytes, "seed {seed} step {step}");
                    }
                    Err(other) => panic!("seed {seed} step {step}: {other}"),
                }
            }
            45..=64 if !live.is_empty() => {
                let handle = live.swap_remove(rng.gen_range(0..live.len()));
                pool.free(handle).unwrap();
                assert!(pool.free(handle).is_err());
            }
            65..=74 => {
                let before = pool.len();
                if let Some(evicted) = pool.free_oldest() {
                    assert_eq!(pool.len(), before - 1);
                    assert!(!pool.contains(evicted));
                }
            }
            75..=84 if !live.is_empty() => {
                let handle = live[rng.gen_range(0..live.len())];
                match rng.gen_range(0..3) {
                    0 => pool.reference(handle).unwrap(),
                    1 => pool.mark_in_use(handle).unwrap(),
                    _ => pool.lock(handle).unwrap(),
                }
            }
            85..=89 => {
                let locked: Vec<_> = pool
                    .iter()
                    .filter(|info| !info.state.is_movable())
                    .map(|info| (info.handle, info.offset))
                    .collect();
                let report = pool.cleanup();
                for (handle, offset) in locked {
                    assert!(pool.contains(handle));
                    assert!(pool.iter().any(|info| info.handle == handle && info.offset == offset));
                }
                for relocation in &report.relocations {
                    if let Some(slot) = live.iter_mut().find(|h| **h == relocation.from) {
                        *slot = relocation.to;
                    }
                }
                assert!(pool.cleanup().is_noop(), "seed {seed} step {step}");
            }
            _ => {
                if let Some(oldest) = pool.find_oldest() {
                    assert!(pool.state(oldest).unwrap().is_evictable());
                }
            }
        }

        refresh(&mut live, &pool);
        assert_eq!(live.len(), pool.len(), "seed {seed} step {step}");
        if let Err(err) = pool.verify() {
            panic!("seed {seed} step {step}: {err}");
        }
    }
}

#[test]
fn test_churn_keeps_invariants() {
    for seed in SEEDS {
        churn(seed);
    }
}

#[test]
fn test_churn_with_full_compaction_recovers_avail() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut pool = MemoryPool::with_clock(8 * 1024, ManualClock::default()).unwrap();
    let mut live = Vec::new();
    while let Ok(handle) = pool.alloc(rng.gen_range(1..=200), 0) {
        live.push(handle);
    }
    for handle in live.iter().step_by(2) {
        pool.free(*handle).unwrap();
    }

    let avail = pool.avail();
    pool.cleanup();
    assert_eq!(pool.largest_avail(), avail);
    assert!(pool.alloc(avail, 1).is_ok());
    pool.verify().unwrap();
}
