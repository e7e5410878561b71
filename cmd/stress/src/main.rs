//! Stress test - many small jobs
//!
//! Pushes a large number of jobs through the global pool, half of them
//! from the calling thread and half spawned by root jobs, while the pool
//! is paused, resumed and resized underneath.
//!
//! Usage: `stress [num_jobs] [num_threads]`

use taskpool::{kprintln, submit, ParentRef, PoolConfig, Runtime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const FAN_OUT: usize = 100;

fn main() {
    println!("=== taskpool Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_jobs: usize = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100_000);
    let num_threads: usize = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(taskpool::hardware_concurrency);

    println!("Running {} jobs on {} workers...", num_jobs, num_threads);

    let config = PoolConfig::default().num_threads(num_threads);
    let runtime = match Runtime::new(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            kprintln!("failed to start pool: {}", e);
            std::process::exit(1);
        }
    };

    let completed = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let result = runtime.block_on(|| {
        let pool = match taskpool::global() {
            Ok(pool) => pool,
            Err(e) => {
                kprintln!("no global pool: {}", e);
                return None;
            }
        };

        // Half pushed directly
        let direct = num_jobs / 2;
        for i in 0..direct {
            let completed = completed.clone();
            if let Err(e) = submit(move || {
                std::hint::black_box(i.wrapping_mul(31));
                completed.fetch_add(1, Ordering::Relaxed);
            }) {
                kprintln!("\nsubmit failed: {}", e);
                break;
            }

            if (i + 1) % 10_000 == 0 {
                print!("\rSubmitted: {}/{}", i + 1, direct);
            }
        }

        // Pause and resize mid-flight
        pool.stop();
        let queued = pool.num_jobs();
        if let Err(e) = pool.set_num_threads((num_threads / 2).max(1)) {
            kprintln!("\nresize failed: {}", e);
        }
        if let Err(e) = pool.reactivate() {
            kprintln!("\nreactivate failed: {}", e);
        }

        // The rest spawned by root jobs
        let spawned = num_jobs - direct;
        let roots = spawned.div_ceil(FAN_OUT);
        for r in 0..roots {
            let completed = completed.clone();
            let children = FAN_OUT.min(spawned - r * FAN_OUT);
            if let Err(e) = submit(move |parent: ParentRef<()>| {
                for _ in 0..children {
                    let completed = completed.clone();
                    parent.push_back(move || {
                        completed.fetch_add(1, Ordering::Relaxed);
                    });
                }
            }) {
                kprintln!("\nsubmit failed: {}", e);
                break;
            }
        }

        let spawn_time = start.elapsed();
        Some((queued, spawn_time))
    });

    let total_time = start.elapsed();
    let (queued, spawn_time) = match result {
        Ok(Some(stats)) => stats,
        Ok(None) => std::process::exit(1),
        Err(e) => {
            kprintln!("shutdown failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n\n=== Results ===");
    println!("Total jobs:       {}", num_jobs);
    println!("Completed:        {}", completed.load(Ordering::Relaxed));
    println!("Queued at pause:  {}", queued);
    println!("Submit time:      {:?}", spawn_time);
    println!("Total time:       {:?}", total_time);
    println!("Throughput:       {:.0} jobs/sec",
        num_jobs as f64 / total_time.as_secs_f64());

    println!("\n=== Stress Test Complete ===");
}
