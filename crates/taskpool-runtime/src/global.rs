//! Process-wide pool
//!
//! An explicit replacement for a lazily created singleton: the pool is
//! installed once with `init_global`, fetched with `global`, and torn down
//! with `shutdown_global`. Nothing is created behind the caller's back.

use std::sync::{Arc, Mutex, PoisonError};

use taskpool_core::{kinfo, PoolError, PoolResult};

use crate::config::PoolConfig;
use crate::pool::ThreadPool;

static GLOBAL: Mutex<Option<Arc<ThreadPool>>> = Mutex::new(None);

/// Build the global pool from `config` and install it.
///
/// Fails with `AlreadyInitialized` if one is installed, or with the
/// construction error.
pub fn init_global(config: PoolConfig) -> PoolResult<Arc<ThreadPool>> {
    let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(PoolError::AlreadyInitialized);
    }
    let pool = Arc::new(ThreadPool::with_config(config, ())?);
    *slot = Some(Arc::clone(&pool));
    kinfo!("global thread pool installed");
    Ok(pool)
}

/// The installed global pool
pub fn global() -> PoolResult<Arc<ThreadPool>> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(PoolError::NotInitialized)
}

/// Uninstall the global pool and join it.
///
/// Handles obtained earlier stay valid but refer to a pool without
/// workers. A new pool can be installed afterwards.
pub fn shutdown_global() -> PoolResult<()> {
    let pool = GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .ok_or(PoolError::NotInitialized)?;
    kinfo!("global thread pool shutting down");
    pool.join()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // The global is process-wide, so the whole lifecycle lives in one test.
    #[test]
    fn test_global_lifecycle() {
        assert_eq!(global().err(), Some(PoolError::NotInitialized));
        assert_eq!(shutdown_global(), Err(PoolError::NotInitialized));

        let bad = init_global(PoolConfig::new().num_threads(0));
        assert!(matches!(bad, Err(PoolError::InvalidConfig(_))));

        let pool = init_global(PoolConfig::new().num_threads(2)).unwrap();
        assert!(matches!(
            init_global(PoolConfig::new()),
            Err(PoolError::AlreadyInitialized)
        ));

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let c = counter.clone();
            global().unwrap().push_back(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        global().unwrap().wait();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert!(Arc::ptr_eq(&pool, &global().unwrap()));

        shutdown_global().unwrap();
        assert!(!pool.is_running());
        assert_eq!(global().err(), Some(PoolError::NotInitialized));

        // reinstall after shutdown
        init_global(PoolConfig::new().num_threads(1)).unwrap();
        shutdown_global().unwrap();
    }
}
