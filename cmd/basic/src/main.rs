//! Basic taskpool example
//!
//! Walks through the pool lifecycle: plain and priority jobs, a job
//! spawning children through its `ParentRef`, pause/resume with new
//! broadcast arguments, resizing and shutdown.
//!
//! # Environment Variables
//!
//! - `TP_FLUSH_EPRINT=1` - Flush log output immediately (useful when a job aborts)
//! - `TP_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use taskpool::{kinfo, kdebug, set_log_level, LogLevel};
use taskpool::{ParentRef, PoolConfig, ThreadPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Args = (Arc<AtomicUsize>, usize);

// TP_LOG_LEVEL=debug TP_FLUSH_EPRINT=1 cargo run -p taskpool-basic
fn main() {
    println!("=== taskpool Basic Example ===\n");

    // Logging reads TP_LOG_LEVEL on first use; show lifecycle messages
    // unless the environment asks for something else
    if std::env::var("TP_LOG_LEVEL").is_err() {
        set_log_level(LogLevel::Info);
    }

    let total = Arc::new(AtomicUsize::new(0));

    // Every job receives (counter, step); start paused so the queue can
    // be inspected first
    let config = PoolConfig::default()
        .num_threads(4)
        .thread_name("basic")
        .delay_start(true);
    config.print();

    let pool: ThreadPool<Args> = match ThreadPool::with_config(config, (total.clone(), 1)) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to build pool: {}", e);
            std::process::exit(1);
        }
    };

    for i in 1..=3 {
        pool.push_back(move |counter: Arc<AtomicUsize>, step: usize| {
            kdebug!("[job {}] adding {}", i, step);
            counter.fetch_add(step, Ordering::SeqCst);
        });
    }
    pool.push_front(|_counter: Arc<AtomicUsize>, _step: usize| {
        kinfo!("[urgent] runs before the queued jobs");
    });
    println!("Queued {} jobs on a stopped pool", pool.num_jobs());

    // A root job that fans out into children
    pool.push_back(|parent: ParentRef<Args>, counter: Arc<AtomicUsize>, step: usize| {
        counter.fetch_add(step, Ordering::SeqCst);
        for child in 0..4 {
            parent.push_back(move |counter: Arc<AtomicUsize>, step: usize| {
                kdebug!("[child {}] adding {}", child, step);
                counter.fetch_add(step, Ordering::SeqCst);
            });
        }
    });

    pool.reactivate().expect("start pool");
    pool.wait();
    println!("After first batch:  total = {}", total.load(Ordering::SeqCst));

    // Pause, queue more, resume with a bigger step
    pool.stop();
    for _ in 0..5 {
        pool.push_back(|counter: Arc<AtomicUsize>, step: usize| {
            counter.fetch_add(step, Ordering::SeqCst);
        });
    }
    println!("Paused with {} jobs queued", pool.num_jobs());
    pool.reactivate_with((total.clone(), 10)).expect("resume pool");
    if !pool.wait_for(Duration::from_secs(10)) {
        println!("WARNING: Timeout!");
    }
    println!("After second batch: total = {}", total.load(Ordering::SeqCst));

    pool.set_num_threads(2).expect("shrink pool");
    println!("Resized to {} workers", pool.num_threads());

    {
        // batch under one lock, one wake-up
        let mut guard = pool.lock();
        for _ in 0..8 {
            guard.push_back(|counter: Arc<AtomicUsize>, _step: usize| {
                counter.fetch_add(100, Ordering::SeqCst);
            });
        }
    }

    match pool.join() {
        Ok(()) => kinfo!("pool joined"),
        Err(e) => eprintln!("join failed: {}", e),
    }
    println!("Final total:        {}", total.load(Ordering::SeqCst));

    println!("\n=== Example Complete ===");
}
