//! The thread pool
//!
//! # Lifecycle
//!
//! ```text
//!                 start / reactivate
//!   [stopped, no threads] ───────────────▶ [running, active] ◀─┐
//!          ▲                                   │  stop()       │ reactivate()
//!          │ terminate / join                  ▼               │
//!          └────────────────────────────── [running, paused] ──┘
//! ```
//!
//! `running` means worker threads exist. `active` means they may dequeue.
//! A paused pool keeps its threads parked and its queue intact.
//!
//! # Locking
//!
//! Lifecycle operations serialize on the worker-set mutex and may join
//! threads while holding it. Queue operations only take the queue mutex,
//! so jobs can keep pushing while the pool is being torn down.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use taskpool_core::{hardware_concurrency, kerror, kinfo, kwarn, PoolError, PoolResult, WorkerError};

use crate::config::{defaults, PoolConfig, ShrinkPolicy};
use crate::job::{BroadcastArgs, Task};
use crate::queue::{PoolGuard, Shared};
use crate::worker::{self, WorkerSet};

/// A pool of worker threads draining a shared double-ended job queue.
///
/// `A` is the broadcast argument tuple: every job receives a clone of it
/// after its [`ParentRef`](crate::ParentRef). `()` for none.
pub struct ThreadPool<A: BroadcastArgs = ()> {
    shared: Arc<Shared<A>>,
    workers: Mutex<WorkerSet>,
    /// Configured worker count, applied on the next start
    num_threads: AtomicUsize,
    config: PoolConfig,
}

impl ThreadPool<()> {
    /// Start a pool of `num_threads` workers.
    ///
    /// # Panics
    ///
    /// If `num_threads` is 0 or above the configured maximum, or if the OS
    /// refuses to spawn a thread. Use [`ThreadPool::with_config`] to get
    /// these as errors.
    pub fn new(num_threads: usize) -> Self {
        Self::with_args(num_threads, ())
    }

    /// Start a pool with one worker per hardware thread.
    pub fn with_default_threads() -> Self {
        Self::with_args(hardware_concurrency(), ())
    }
}

impl<A: BroadcastArgs> ThreadPool<A> {
    /// Start a pool of `num_threads` workers broadcasting `args` to every job.
    ///
    /// # Panics
    ///
    /// Same conditions as [`ThreadPool::new`].
    pub fn with_args(num_threads: usize, args: A) -> Self {
        assert!(num_threads > 0, "thread pool needs at least one thread");
        match Self::with_config(PoolConfig::new().num_threads(num_threads), args) {
            Ok(pool) => pool,
            Err(e) => panic!("failed to start thread pool: {}", e),
        }
    }

    /// Build a pool from a validated config. Workers are spawned unless
    /// `config.delay_start` is set.
    pub fn with_config(config: PoolConfig, args: A) -> PoolResult<Self> {
        config.validate()?;

        let pool = ThreadPool {
            shared: Arc::new(Shared::new(args)),
            workers: Mutex::new(WorkerSet::new()),
            num_threads: AtomicUsize::new(config.num_threads),
            config,
        };
        if !pool.config.delay_start {
            pool.start()?;
        }
        Ok(pool)
    }

    // Queue operations

    /// Enqueue at the back (normal priority).
    pub fn push_back<T, M>(&self, task: T)
    where
        T: Task<A, M>,
    {
        self.shared.lock().push_back(task);
    }

    /// Enqueue at the front (high priority).
    pub fn push_front<T, M>(&self, task: T)
    where
        T: Task<A, M>,
    {
        self.shared.lock().push_front(task);
    }

    /// Enqueue a batch at the back in iteration order. Returns the count.
    pub fn append<I, T, M>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Task<A, M>,
    {
        self.shared.lock().append(tasks)
    }

    /// Push each job of a batch to the front in turn, so the last one
    /// yielded runs first. Returns the count.
    pub fn prepend<I, T, M>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Task<A, M>,
    {
        self.shared.lock().prepend(tasks)
    }

    /// Lock the queue for a batch of pushes; see [`PoolGuard`].
    pub fn lock(&self) -> PoolGuard<'_, A> {
        self.shared.lock()
    }

    // Lifecycle

    /// Spawn the workers of a pool that has none.
    pub fn start(&self) -> PoolResult<()> {
        if self.on_own_worker() {
            return Err(PoolError::AlreadyRunning);
        }
        let mut workers = self.lock_workers();
        if self.shared.is_running() {
            return Err(PoolError::AlreadyRunning);
        }
        self.launch(&mut workers, true)
    }

    /// Pause dequeuing. Running jobs finish; queued jobs stay queued.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Resume a paused pool, or start one that has no workers.
    pub fn reactivate(&self) -> PoolResult<()> {
        self.resume(None)
    }

    /// Replace the broadcast arguments, then [`reactivate`](Self::reactivate).
    ///
    /// Jobs already running keep the arguments they were given.
    pub fn reactivate_with(&self, args: A) -> PoolResult<()> {
        self.resume(Some(args))
    }

    fn resume(&self, args: Option<A>) -> PoolResult<()> {
        let args = match self.shared.resume_running(args) {
            Ok(()) => return Ok(()),
            Err(args) => args,
        };

        if self.on_own_worker() {
            return Err(PoolError::JoinFromWorker);
        }
        let mut workers = self.lock_workers();
        if let Some(args) = args {
            self.shared.replace_args(args);
        }
        // started by someone else while we waited for the lock
        if self.shared.resume_running(None).is_ok() {
            return Ok(());
        }
        self.launch(&mut workers, true)
    }

    /// Block until the queue is empty and no job is executing, or the pool
    /// is stopped. Returns at once if nothing is pending.
    ///
    /// Jobs of this pool must not wait on it; from a worker this logs a
    /// warning and returns immediately.
    pub fn wait(&self) {
        if self.on_own_worker() {
            kwarn!("wait() called from a job of the same pool, ignoring");
            return;
        }
        self.shared.wait_done(None);
    }

    /// [`wait`](Self::wait) with a timeout. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// [`wait`](Self::wait) with a deadline. Returns `false` if the deadline
    /// passed first.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        if self.on_own_worker() {
            kwarn!("wait_until() called from a job of the same pool, ignoring");
            return false;
        }
        self.shared.wait_done(Some(deadline))
    }

    /// Stop, join every worker after its current job, and discard the queue.
    ///
    /// Returns the number of discarded jobs. The pool can be started again.
    pub fn terminate(&self) -> PoolResult<usize> {
        if self.on_own_worker() {
            return Err(PoolError::JoinFromWorker);
        }
        let mut workers = self.lock_workers();
        let panicked = self.retire(&mut workers);

        let dropped = self.shared.clear();
        if dropped > 0 {
            kwarn!("terminate discarded {} queued jobs", dropped);
        }
        kinfo!("thread pool terminated");

        panic_result(panicked).map(|()| dropped)
    }

    /// Wait for the queue to drain, then stop and join every worker.
    ///
    /// A paused pool is not drained: its queued jobs stay queued for the
    /// next start. Reports workers lost to panicking jobs as
    /// `PoolError::Worker(WorkerError::Panicked(n))`.
    pub fn join(&self) -> PoolResult<()> {
        if self.on_own_worker() {
            return Err(PoolError::JoinFromWorker);
        }
        let mut workers = self.lock_workers();
        self.shared.wait_done(None);
        let panicked = self.retire(&mut workers);
        kinfo!("thread pool joined");

        panic_result(panicked)
    }

    /// Change the worker count.
    ///
    /// On a pool without threads this only records the count. Growing a
    /// running pool spawns the difference. Shrinking a running pool
    /// retires every worker and spawns `num_threads` fresh ones; what
    /// happens to queued work follows the configured [`ShrinkPolicy`].
    /// The active/paused state is preserved.
    ///
    /// # Panics
    ///
    /// If `num_threads` is 0.
    pub fn set_num_threads(&self, num_threads: usize) -> PoolResult<()> {
        assert!(num_threads > 0, "thread pool needs at least one thread");
        if num_threads > defaults::MAX_THREADS {
            return Err(PoolError::InvalidConfig("num_threads must be <= 1024"));
        }
        if self.on_own_worker() {
            return Err(PoolError::JoinFromWorker);
        }

        let mut workers = self.lock_workers();
        self.num_threads.store(num_threads, Ordering::Relaxed);
        if !self.shared.is_running() {
            return Ok(());
        }

        // workers lost to panicking jobs no longer count
        workers.reap();
        let current = self.shared.lock_state().live;
        if num_threads == current {
            return Ok(());
        }
        if num_threads > current {
            if let Err(e) = workers.spawn(&self.shared, &self.config, num_threads - current) {
                self.num_threads.store(self.shared.lock_state().live, Ordering::Relaxed);
                return Err(e.into());
            }
            kinfo!("thread pool grown from {} to {} workers", current, num_threads);
            return Ok(());
        }

        let was_active = self.shared.is_active();
        if self.config.shrink_policy == ShrinkPolicy::Drain {
            self.shared.wait_done(None);
        }
        let panicked = self.retire(&mut workers);
        if self.config.shrink_policy == ShrinkPolicy::Discard {
            let dropped = self.shared.clear();
            if dropped > 0 {
                kwarn!("shrink discarded {} queued jobs", dropped);
            }
        }
        self.launch(&mut workers, was_active)?;
        kinfo!("thread pool shrunk from {} to {} workers", current, num_threads);

        panic_result(panicked)
    }

    // Queries

    /// Configured worker count
    pub fn num_threads(&self) -> usize {
        self.num_threads.load(Ordering::Relaxed)
    }

    /// Jobs waiting in the queue (not counting those executing)
    pub fn num_jobs(&self) -> usize {
        self.shared.num_jobs()
    }

    /// Jobs executing right now
    pub fn busy_workers(&self) -> usize {
        self.shared.lock_state().busy
    }

    /// Workers lost to panicking jobs since construction
    pub fn panicked_workers(&self) -> usize {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    /// Worker threads exist
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Workers may dequeue
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // Internals

    fn on_own_worker(&self) -> bool {
        worker::is_worker_of(self.shared.id)
    }

    fn lock_workers(&self) -> MutexGuard<'_, WorkerSet> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark running and spawn the configured number of workers. Rolls back
    /// to a stopped pool with no threads if any spawn fails.
    fn launch(&self, workers: &mut WorkerSet, active: bool) -> PoolResult<()> {
        let n = self.num_threads.load(Ordering::Relaxed);
        self.shared.set_flags(true, active);
        if let Err(e) = workers.spawn(&self.shared, &self.config, n) {
            self.shared.set_flags(false, false);
            workers.join_all();
            return Err(e.into());
        }
        kinfo!("thread pool started with {} workers", n);
        Ok(())
    }

    /// Stop and join every worker; returns how many had panicked.
    fn retire(&self, workers: &mut WorkerSet) -> usize {
        self.shared.set_flags(false, false);
        let panicked = workers.join_all();
        if panicked > 0 {
            kerror!("{} worker(s) had panicked", panicked);
        }
        panicked
    }
}

fn panic_result(panicked: usize) -> PoolResult<()> {
    if panicked > 0 {
        Err(WorkerError::Panicked(panicked).into())
    } else {
        Ok(())
    }
}

impl<A: BroadcastArgs + Default> Default for ThreadPool<A> {
    /// Pool configured from the environment (`PoolConfig::from_env`).
    ///
    /// # Panics
    ///
    /// If the environment holds an invalid configuration or a worker
    /// cannot be spawned.
    fn default() -> Self {
        match Self::with_config(PoolConfig::default(), A::default()) {
            Ok(pool) => pool,
            Err(e) => panic!("failed to start thread pool: {}", e),
        }
    }
}

impl<A: BroadcastArgs> Drop for ThreadPool<A> {
    fn drop(&mut self) {
        if self.on_own_worker() {
            // cannot join from here; workers exit after their current job
            self.shared.set_flags(false, false);
        } else if let Err(e) = self.join() {
            kerror!("thread pool shutdown: {}", e);
        }

        // jobs left in a paused pool may hold ParentRefs to this queue
        let dropped = self.shared.clear();
        if dropped > 0 {
            kwarn!("dropping {} jobs left in a stopped pool", dropped);
        }
    }
}

impl<A: BroadcastArgs> fmt::Debug for ThreadPool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads())
            .field("running", &self.is_running())
            .field("active", &self.is_active())
            .field("jobs", &self.num_jobs())
            .finish()
    }
}
