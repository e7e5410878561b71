//! Worker threads
//!
//! Each worker loops on the shared queue: park while the pool is stopped
//! or the queue is empty, otherwise pop the front job, clone the broadcast
//! arguments and run it with the lock released.
//!
//! A job that panics takes its worker down with it. The in-flight guard
//! still settles the busy count on the way out, and the loss is counted
//! in `Shared::panicked`. The thread is not replaced; once the last worker
//! is gone `wait()` stops blocking.

use std::cell::Cell;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use taskpool_core::{kdebug, kerror, ktrace, WorkerError};

use crate::config::PoolConfig;
use crate::job::BroadcastArgs;
use crate::parent::ParentRef;
use crate::queue::{QueueState, Shared};

// Id of the pool this thread works for (0 = none)
thread_local! {
    static CURRENT_POOL_ID: Cell<usize> = const { Cell::new(0) };
}

fn set_current_pool_id(id: usize) {
    CURRENT_POOL_ID.with(|cell| cell.set(id));
}

/// Id of the pool the calling thread is a worker of, if any
#[inline]
pub fn current_pool_id() -> Option<usize> {
    match CURRENT_POOL_ID.with(|cell| cell.get()) {
        0 => None,
        id => Some(id),
    }
}

#[inline]
pub(crate) fn is_worker_of(pool_id: usize) -> bool {
    current_pool_id() == Some(pool_id)
}

/// Join handles of a pool's live worker threads
pub(crate) struct WorkerSet {
    handles: Vec<JoinHandle<()>>,
    /// Next worker id, for thread names; never reused within a pool
    next_id: usize,
    /// Panics among handles already reaped, reported by the next `join_all`
    reaped_panics: usize,
}

impl WorkerSet {
    pub(crate) fn new() -> Self {
        Self {
            handles: Vec::new(),
            next_id: 0,
            reaped_panics: 0,
        }
    }

    /// Spawn `count` more workers.
    ///
    /// On failure the workers spawned so far stay in the set; the caller
    /// decides whether to roll back.
    pub(crate) fn spawn<A: BroadcastArgs>(
        &mut self,
        shared: &Arc<Shared<A>>,
        config: &PoolConfig,
        count: usize,
    ) -> Result<(), WorkerError> {
        self.handles.reserve(count);
        for _ in 0..count {
            let id = self.next_id;
            self.next_id += 1;

            let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name, id));
            if let Some(size) = config.stack_size {
                builder = builder.stack_size(size);
            }

            // counted before the thread exists so wait() never sees a
            // started pool with zero workers
            shared.lock_state().live += 1;

            let worker_shared = Arc::clone(shared);
            match builder.spawn(move || worker_main(worker_shared, id)) {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    shared.lock_state().live -= 1;
                    kerror!("failed to spawn worker {}: {}", id, e);
                    return Err(WorkerError::SpawnFailed(e.kind()));
                }
            }
        }
        Ok(())
    }

    /// Join handles of workers that already exited (lost to a panicking
    /// job while the pool keeps running).
    pub(crate) fn reap(&mut self) {
        let (finished, alive): (Vec<_>, Vec<_>) =
            self.handles.drain(..).partition(|h| h.is_finished());
        self.handles = alive;
        for handle in finished {
            if handle.join().is_err() {
                self.reaped_panics += 1;
            }
        }
    }

    /// Join every worker. Returns how many ended by panicking, including
    /// those reaped earlier.
    ///
    /// Workers must already have been told to exit (`running == false`).
    pub(crate) fn join_all(&mut self) -> usize {
        let mut panicked = std::mem::take(&mut self.reaped_panics);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        panicked
    }
}

/// Settles the busy count when a job returns or unwinds
struct InFlight<'a, A: BroadcastArgs> {
    shared: &'a Shared<A>,
    live: &'a Live<'a, A>,
    id: usize,
}

impl<'a, A: BroadcastArgs> Drop for InFlight<'a, A> {
    fn drop(&mut self) {
        // counted before the busy slot is released so a waiter woken
        // below already sees it
        let panicking = thread::panicking();
        if panicking {
            self.shared.panicked.fetch_add(1, Ordering::Relaxed);
            kerror!("worker {} lost to a panicking job", self.id);
        }

        let drained = {
            let mut state = self.shared.lock_state();
            state.busy -= 1;
            // the dead worker leaves `live` together with its busy slot,
            // so a resize right after wait() sees the true worker count
            if panicking {
                self.live.release(&mut state);
            }
            state.live == 0 || (state.jobs.is_empty() && state.busy == 0)
        };
        if drained {
            self.shared.done_cv.notify_all();
        }
    }
}

/// Drops the live-worker count when the thread leaves its loop, by
/// returning or by unwinding
struct Live<'a, A: BroadcastArgs> {
    shared: &'a Shared<A>,
    counted: Cell<bool>,
}

impl<'a, A: BroadcastArgs> Live<'a, A> {
    /// Remove this worker from `live` once; true if it was the last one
    fn release(&self, state: &mut QueueState<A>) -> bool {
        if self.counted.replace(false) {
            state.live -= 1;
        }
        state.live == 0
    }
}

impl<'a, A: BroadcastArgs> Drop for Live<'a, A> {
    fn drop(&mut self) {
        if !self.counted.get() {
            return;
        }
        let last = self.release(&mut self.shared.lock_state());
        if last {
            self.shared.done_cv.notify_all();
        }
    }
}

fn worker_main<A: BroadcastArgs>(shared: Arc<Shared<A>>, id: usize) {
    set_current_pool_id(shared.id);
    kdebug!("worker {} started", id);
    let live = Live {
        shared: &shared,
        counted: Cell::new(true),
    };

    let parent = ParentRef::new(Arc::clone(&shared));

    loop {
        let (job, args) = {
            let mut state = shared.lock_state();
            loop {
                if !shared.is_running() {
                    drop(state);
                    kdebug!("worker {} exiting", id);
                    return;
                }
                if shared.is_active() && !state.jobs.is_empty() {
                    // clone first: a panicking Clone must not strand a job
                    // or a busy slot
                    let args = state.args.clone();
                    if let Some(job) = state.jobs.pop_front() {
                        state.busy += 1;
                        break (job, args);
                    }
                }
                state.idle += 1;
                state = shared.wait_work(state);
                state.idle -= 1;
            }
        };

        ktrace!("worker {} running job", id);
        let in_flight = InFlight {
            shared: &shared,
            live: &live,
            id,
        };
        job.run(parent.clone(), args);
        drop(in_flight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParentRef, ThreadPool};

    #[test]
    fn test_not_a_worker() {
        assert_eq!(current_pool_id(), None);
    }

    #[test]
    fn test_worker_knows_its_pool() {
        let pool = ThreadPool::new(1);
        let (tx, rx) = std::sync::mpsc::channel();

        pool.push_back(move || {
            tx.send(current_pool_id()).unwrap();
        });

        let seen = rx.recv().unwrap();
        assert!(seen.is_some());
        // the test thread itself is not a worker
        assert!(!is_worker_of(seen.unwrap_or(0)));
        pool.join().unwrap();
    }

    #[test]
    fn test_thread_names() {
        let config = PoolConfig::new().num_threads(2).thread_name("named");
        let pool = ThreadPool::with_config(config, ()).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        pool.push_back(move |_parent: ParentRef<()>| {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });

        let name = rx.recv().unwrap().unwrap();
        assert!(name == "named-0" || name == "named-1", "{name}");
        pool.join().unwrap();
    }

    #[test]
    fn test_custom_stack_size() {
        let config = PoolConfig::new().num_threads(1).stack_size(256 * 1024);
        let pool = ThreadPool::with_config(config, ()).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        pool.push_back(move || {
            let buf = [1u8; 64 * 1024];
            tx.send(buf.iter().map(|&b| b as usize).sum::<usize>()).unwrap();
        });

        assert_eq!(rx.recv().unwrap(), 64 * 1024);
        pool.join().unwrap();
    }
}
