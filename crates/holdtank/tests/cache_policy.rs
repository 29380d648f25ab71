//! Integration tests for the cache's evict-and-retry policy under load.

use std::rc::Rc;

use holdtank::{AssetCache, CacheConfig, CacheError};
use holdtank_core::{ManualClock, PoolConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn config(capacity_bytes: usize) -> CacheConfig {
    CacheConfig {
        pool: PoolConfig {
            capacity_bytes,
            debug_fill: true,
            ..PoolConfig::default()
        },
        ..CacheConfig::default()
    }
}

fn offset_of(cache: &AssetCache<Rc<ManualClock>>, id: u32) -> u32 {
    cache
        .pool()
        .iter()
        .find(|info| info.id == id)
        .map(|info| info.offset)
        .unwrap()
}

#[test]
fn test_hot_set_stays_resident() {
    let clock = Rc::new(ManualClock::default());
    let mut cache = AssetCache::new(&config(32 * 1024), Rc::clone(&clock)).unwrap();
    let mut rng = StdRng::seed_from_u64(9);

    for _ in 0..5_000 {
        clock.advance(16);
        let id = if rng.gen_bool(0.8) {
            rng.gen_range(0..4)
        } else {
            rng.gen_range(100..400)
        };
        let len = 256 + (id as usize % 7) * 128;
        cache
            .load_with(id, len, |buf| {
                buf.fill(0x11);
                Ok::<(), String>(())
            })
            .unwrap();
        cache.pool().verify().unwrap();
    }

    for id in 0..4 {
        assert!(cache.contains(id), "hot asset {id} was evicted");
    }
    assert!(cache.stats().hit_rate() > 0.7);
    assert!(cache.stats().evictions > 0);
}

#[test]
fn test_playing_samples_never_move() {
    let clock = Rc::new(ManualClock::default());
    let mut cache = AssetCache::new(&config(8 * 1024), Rc::clone(&clock)).unwrap();
    let mut rng = StdRng::seed_from_u64(77);

    cache.load_with(1000, 500, |_| Ok::<(), String>(())).unwrap();
    cache
        .load_with(1, 700, |buf| {
            buf.fill(0xAA);
            Ok::<(), String>(())
        })
        .unwrap();
    cache.pin(1).unwrap();
    cache.evict(1000).unwrap();
    // The pinned sample sits above a hole compaction would like to close.
    let pinned_at = offset_of(&cache, 1);
    assert_eq!(pinned_at, 33);

    for id in 2..400 {
        clock.advance(16);
        let len = rng.gen_range(100..=1500);
        match cache.load_with(id, len, |buf| {
            buf.fill(0x22);
            Ok::<(), String>(())
        }) {
            Ok(_) | Err(CacheError::Exhausted { .. }) => {}
            Err(other) => panic!("asset {id}: {other}"),
        }
        if id % 25 == 0 {
            cache.compact();
        }
        assert_eq!(offset_of(&cache, 1), pinned_at);
    }

    assert!(cache.bytes(1).unwrap().iter().all(|&b| b == 0xAA));
    cache.release(1).unwrap();
    cache.pool().verify().unwrap();
}

#[test]
fn test_cache_config_from_toml() {
    let config = CacheConfig::from_toml_str(
        r#"
        compact_before_evict = false

        [pool]
        capacity_bytes = 4096
        tick_shift = 0
        "#,
    )
    .unwrap();
    let mut cache = AssetCache::new(&config, ManualClock::default()).unwrap();
    assert_eq!(cache.pool().pool_size(), 4080);

    cache
        .load_with(5, 64, |_| Ok::<(), String>(()))
        .unwrap();
    cache.clear();
    assert!(!cache.contains(5));
}
