//! # taskpool - Thread Pool with a Double-Ended Job Queue
//!
//! A fixed set of worker threads draining one shared job deque.
//!
//! ## Features
//!
//! - **Priorities**: `push_back` for normal work, `push_front` to jump the queue
//! - **Pause/Resume**: `stop()` parks workers without losing queued jobs, `reactivate()` resumes
//! - **Nested Work**: jobs receive a `ParentRef` to push children into the same pool
//! - **Broadcast Arguments**: a tuple cloned into every job, replaceable on reactivate
//! - **Resizing**: grow or shrink a running pool
//! - **Type-Erased Callables**: `UniqueFunction` / `Function` store small closures inline
//!
//! ## Quick Start
//!
//! ```ignore
//! use taskpool::{ParentRef, ThreadPool};
//!
//! fn main() {
//!     let pool = ThreadPool::new(4);
//!
//!     pool.push_back(|| println!("plain job"));
//!
//!     pool.push_back(|parent: ParentRef<()>| {
//!         // children land in the same queue
//!         parent.push_front(|| println!("urgent child"));
//!         parent.push_back(|| println!("normal child"));
//!     });
//!
//!     pool.wait();
//!     pool.join().unwrap();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │       push_back / push_front / lock() batch / wait          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Shared Job Deque                           │
//! │   Mutex<VecDeque<Job>> + broadcast args + busy/idle counts  │
//! └─────────────────────────────────────────────────────────────┘
//!          │ work_cv           │ work_cv           │ done_cv
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │      │  Worker   │      │  wait()   │
//!    │  Thread   │      │  Thread   │      │  callers  │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │
//!          └──── ParentRef ────┘  (jobs push back into the deque)
//! ```

// Re-export core types
pub use taskpool_core::{
    hardware_concurrency,
    CallError,
    Callable,
    Function,
    PoolError,
    PoolResult,
    UniqueFunction,
    WorkerError,
};

// Re-export kprint macros for debug logging
pub use taskpool_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use taskpool_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_thread_enabled};

// Re-export env utilities
pub use taskpool_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use taskpool_runtime::{
    current_pool_id,
    global,
    init_global,
    shutdown_global,
    BroadcastArgs,
    ConfigError,
    Job,
    ParentRef,
    PoolConfig,
    PoolGuard,
    ShrinkPolicy,
    Task,
    ThreadPool,
};
pub use taskpool_runtime::job::{Plain, Prebuilt, WithParent};

/// Owner of the process-wide pool
///
/// Installs the global pool on creation and shuts it down when dropped,
/// so free functions like [`submit`] work for the lifetime of the handle.
pub struct Runtime {
    installed: bool,
}

impl Runtime {
    /// Install the global pool built from `config`
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        init_global(config)?;
        Ok(Self {
            installed: true,
        })
    }

    /// Run `f`, wait for every job it queued (directly or through
    /// children), then shut the pool down.
    ///
    /// This is the typical entry point for applications.
    pub fn block_on<F, T>(mut self, f: F) -> PoolResult<T>
    where
        F: FnOnce() -> T,
    {
        let result = f();
        wait();
        self.shutdown()?;
        Ok(result)
    }

    /// Shut down the global pool. Later calls do nothing.
    pub fn shutdown(&mut self) -> PoolResult<()> {
        if std::mem::replace(&mut self.installed, false) {
            shutdown_global()?;
        }
        Ok(())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            kerror!("global pool shutdown: {}", e);
        }
    }
}

/// Queue a job at the back of the global pool
///
/// # Example
///
/// ```ignore
/// use taskpool::{submit, PoolConfig, Runtime};
///
/// Runtime::new(PoolConfig::default())?.block_on(|| {
///     for i in 0..8 {
///         submit(move || println!("job {}", i)).unwrap();
///     }
/// })?;
/// ```
pub fn submit<T, M>(task: T) -> PoolResult<()>
where
    T: Task<(), M>,
{
    global()?.push_back(task);
    Ok(())
}

/// Queue a job at the front of the global pool
pub fn submit_urgent<T, M>(task: T) -> PoolResult<()>
where
    T: Task<(), M>,
{
    global()?.push_front(task);
    Ok(())
}

/// Wait for the global pool to drain. Does nothing if none is installed.
pub fn wait() {
    if let Ok(pool) = global() {
        pool.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // One test owns the global pool for the whole binary.
    #[test]
    fn test_runtime_block_on() {
        assert_eq!(submit(|| {}), Err(PoolError::NotInitialized));

        let counter = Arc::new(AtomicUsize::new(0));
        let runtime = Runtime::new(PoolConfig::new().num_threads(2)).unwrap();

        let c = counter.clone();
        let queued = runtime
            .block_on(move || {
                for _ in 0..10 {
                    let c = c.clone();
                    submit(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                }
                let c = c.clone();
                submit_urgent(move |parent: ParentRef<()>| {
                    let c = c.clone();
                    parent.push_back(move || {
                        c.fetch_add(100, Ordering::SeqCst);
                    });
                })
                .unwrap();
                11
            })
            .unwrap();

        assert_eq!(queued, 11);
        assert_eq!(counter.load(Ordering::SeqCst), 110);
        assert_eq!(global().err(), Some(PoolError::NotInitialized));

        // dropping an unused runtime uninstalls too
        drop(Runtime::new(PoolConfig::new().num_threads(1)).unwrap());
        assert_eq!(global().err(), Some(PoolError::NotInitialized));
    }

    #[test]
    fn test_reexports() {
        let mut f: UniqueFunction<(u32,), u32> = UniqueFunction::new(|x: u32| x + 1);
        assert_eq!(f.call((1,)), Ok(2));
        assert!(hardware_concurrency() >= 1);
        assert!(LogLevel::Error < LogLevel::Warn);
    }
}
