//! Library defaults for `PoolConfig`
//!
//! Overridden at runtime by the `TP_*` environment variables read in
//! `PoolConfig::from_env`.

use super::ShrinkPolicy;

/// Worker count when none is configured
pub fn num_threads() -> usize {
    taskpool_core::hardware_concurrency()
}

/// Upper bound accepted by `validate()`
pub const MAX_THREADS: usize = 1024;

/// Spawn workers at construction
pub const DELAY_START: bool = false;

/// Worker threads are named `{THREAD_NAME}-{id}`
pub const THREAD_NAME: &str = "taskpool-worker";

/// 0 = platform default stack size
pub const STACK_SIZE: usize = 0;

/// Smallest explicit stack size accepted by `validate()`
pub const MIN_STACK_SIZE: usize = 16 * 1024;

pub const SHRINK_POLICY: ShrinkPolicy = ShrinkPolicy::Drain;
