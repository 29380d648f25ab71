//! # Cache Churn Simulator
//!
//! Drives a sample cache the way the game loop does: every frame a few
//! sound effects are requested, most from a small hot set, and each one is
//! locked while it plays.
//!
//! ```bash
//! cache_churn                       # 256 KiB sample cache, 36000 frames
//! cache_churn cache.toml 100000     # custom config and frame count
//! ```

use std::convert::Infallible;
use std::rc::Rc;

use holdtank::{AssetCache, CacheConfig, CacheError};
use holdtank_core::ManualClock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Ten minutes at 60 frames per second.
const DEFAULT_FRAMES: u64 = 36_000;
const SEED: u64 = 0x0005_EED5;

/// Distinct samples the level can request.
const SAMPLE_IDS: u32 = 512;
/// Samples requested most of the time.
const HOT_IDS: u32 = 16;

/// Deterministic decoded length for a sample.
const fn sample_len(id: u32) -> usize {
    512 + (id.wrapping_mul(2_654_435_761) % 8192) as usize
}

/// Skewed request distribution: 70% hot, 25% warm, 5% cold.
fn pick_sample(rng: &mut StdRng) -> u32 {
    match rng.gen_range(0..100) {
        0..=69 => rng.gen_range(0..HOT_IDS),
        70..=94 => rng.gen_range(HOT_IDS..HOT_IDS * 8),
        _ => rng.gen_range(HOT_IDS * 8..SAMPLE_IDS),
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match CacheConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("   ✗ {e}");
                std::process::exit(1);
            }
        },
        None => CacheConfig::sample_cache(),
    };
    let frames = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);

    if let Err(e) = run(&config, frames) {
        eprintln!("   ✗ FATAL: {e}");
        std::process::exit(1);
    }
}

fn run(config: &CacheConfig, frames: u64) -> Result<(), CacheError> {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    HOLDTANK CACHE CHURN");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("  Pool:     {} bytes", config.pool.capacity_bytes);
    println!("  Frames:   {frames}");
    println!("  Samples:  {SAMPLE_IDS} ({HOT_IDS} hot)");
    println!();

    let clock = Rc::new(ManualClock::default());
    let mut cache = AssetCache::new(config, Rc::clone(&clock))?;
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut playing: Vec<(u32, u64)> = Vec::new();
    let mut exhausted = 0u64;

    for frame in 0..frames {
        clock.advance(1);

        // Finished voices become evictable again.
        let mut index = 0;
        while index < playing.len() {
            let (id, until) = playing[index];
            if until <= frame {
                cache.release(id)?;
                playing.swap_remove(index);
            } else {
                index += 1;
            }
        }

        for _ in 0..rng.gen_range(0..=3) {
            let id = pick_sample(&mut rng);
            let len = sample_len(id);
            let fill = u8::try_from(id % 256).unwrap_or(0);
            match cache.load_with(id, len, |buf| {
                buf.fill(fill);
                Ok::<(), Infallible>(())
            }) {
                Ok(_) => {
                    if !playing.iter().any(|&(playing_id, _)| playing_id == id) {
                        cache.pin(id)?;
                        playing.push((id, frame + rng.gen_range(6..90)));
                    }
                }
                Err(CacheError::Exhausted { .. }) => exhausted += 1,
                Err(e) => return Err(e),
            }
        }

        if frame > 0 && frame % 6_000 == 0 {
            let stats = cache.stats();
            println!(
                "   📊 Frame: {frame} | Hit rate: {:.1}% | Evictions: {} | Playing: {}",
                stats.hit_rate() * 100.0,
                stats.evictions,
                playing.len()
            );
        }
    }

    cache.pool().verify()?;

    let stats = cache.stats();
    let pool = cache.pool_stats();
    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                         RESULTS");
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Hits:          {}", stats.hits);
    println!("  Misses:        {}", stats.misses);
    println!("  Hit rate:      {:.2}%", stats.hit_rate() * 100.0);
    println!("  Evictions:     {}", stats.evictions);
    println!("  Compactions:   {}", stats.compactions);
    println!("  Exhausted:     {exhausted}");
    println!();
    println!("  Resident:      {} samples", pool.used_chunks);
    println!(
        "  Free:          {} / {} paragraphs in {} chunks",
        pool.free_paragraphs, pool.total_paragraphs, pool.free_chunks
    );
    println!("  Fragmentation: {:.1}%", pool.fragmentation() * 100.0);
    println!("  Integrity:     ✓");
    Ok(())
}
