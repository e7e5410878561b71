//! Shared job queue and its synchronization
//!
//! One mutex guards the deque, the broadcast arguments and the busy/idle
//! counters. Two condition variables hang off it:
//!
//! - `work_cv` - workers park here while the queue is empty or the pool
//!   is stopped
//! - `done_cv` - `wait()` callers park here until the queue is drained
//!
//! The `running`/`active` flags are only ever written with the mutex
//! held, so a worker that checked them under the lock cannot miss the
//! wake-up that follows a change. Readers outside the lock get a
//! relaxed snapshot.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::job::{BroadcastArgs, Job, Task};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

/// State protected by the queue mutex
pub(crate) struct QueueState<A: 'static> {
    pub(crate) jobs: VecDeque<Job<A>>,
    pub(crate) args: A,
    /// Jobs currently executing
    pub(crate) busy: usize,
    /// Workers blocked on `work_cv`
    pub(crate) idle: usize,
    /// Worker threads spawned and not yet exited
    pub(crate) live: usize,
}

pub(crate) struct Shared<A: 'static> {
    /// Process-unique, never 0
    pub(crate) id: usize,
    state: Mutex<QueueState<A>>,
    pub(crate) work_cv: Condvar,
    pub(crate) done_cv: Condvar,
    /// Worker threads exist and are looping
    pub(crate) running: AtomicBool,
    /// Workers may dequeue
    pub(crate) active: AtomicBool,
    /// Workers lost to panicking jobs, over the pool's lifetime
    pub(crate) panicked: AtomicUsize,
}

impl<A: BroadcastArgs> Shared<A> {
    pub(crate) fn new(args: A) -> Self {
        Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                args,
                busy: 0,
                idle: 0,
                live: 0,
            }),
            work_cv: Condvar::new(),
            done_cv: Condvar::new(),
            running: AtomicBool::new(false),
            active: AtomicBool::new(false),
            panicked: AtomicUsize::new(0),
        }
    }

    /// Lock the queue state.
    ///
    /// A job never runs with the lock held, so poisoning can only come
    /// from user code panicking inside a `PoolGuard` scope. The state
    /// itself stays consistent in that case and is recovered.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, QueueState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait_work<'a>(
        &self,
        guard: MutexGuard<'a, QueueState<A>>,
    ) -> MutexGuard<'a, QueueState<A>> {
        self.work_cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock(&self) -> PoolGuard<'_, A> {
        PoolGuard {
            shared: self,
            state: Some(self.lock_state()),
            added: 0,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn num_jobs(&self) -> usize {
        self.lock_state().jobs.len()
    }

    /// Set both lifecycle flags under the lock, then wake every worker
    /// and every waiter so they re-check.
    pub(crate) fn set_flags(&self, running: bool, active: bool) {
        {
            let _state = self.lock_state();
            self.running.store(running, Ordering::Release);
            self.active.store(active, Ordering::Release);
        }
        self.work_cv.notify_all();
        self.done_cv.notify_all();
    }

    pub(crate) fn stop(&self) {
        {
            let _state = self.lock_state();
            self.active.store(false, Ordering::Release);
        }
        self.done_cv.notify_all();
    }

    /// Resume dequeuing if workers are running, optionally replacing the
    /// broadcast arguments first. Hands the arguments back untouched when
    /// there are no workers to resume.
    pub(crate) fn resume_running(&self, args: Option<A>) -> Result<(), Option<A>> {
        {
            let mut state = self.lock_state();
            if !self.is_running() {
                return Err(args);
            }
            if let Some(args) = args {
                state.args = args;
            }
            self.active.store(true, Ordering::Release);
        }
        self.work_cv.notify_all();
        Ok(())
    }

    pub(crate) fn replace_args(&self, args: A) {
        self.lock_state().args = args;
    }

    /// Remove every queued job. The jobs are dropped after the lock is
    /// released.
    pub(crate) fn clear(&self) -> usize {
        let dropped = std::mem::take(&mut self.lock_state().jobs);
        let n = dropped.len();
        drop(dropped);
        self.done_cv.notify_all();
        n
    }

    fn drained(&self, state: &QueueState<A>) -> bool {
        !self.is_active() || state.live == 0 || (state.jobs.is_empty() && state.busy == 0)
    }

    /// Block until the queue is empty with nothing in flight, or the pool
    /// is stopped, or no worker is left to make progress. With a deadline,
    /// returns `false` if it passed first.
    pub(crate) fn wait_done(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.lock_state();
        while !self.drained(&state) {
            match deadline {
                None => {
                    state = self.done_cv.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self
                        .done_cv
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
        true
    }

    /// Wake workers for `added` new jobs.
    ///
    /// `idle` is the parked-worker count observed under the lock.
    fn wake(&self, added: usize, idle: usize) {
        match wake_plan(added, idle) {
            Wake::Nobody => {}
            Wake::One(n) => {
                for _ in 0..n {
                    self.work_cv.notify_one();
                }
            }
            Wake::All => self.work_cv.notify_all(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Nobody,
    /// `notify_one` this many times
    One(usize),
    All,
}

/// Wake `min(added, idle)` parked workers. Workers that are not parked
/// re-check the queue under the lock before waiting, so they need no
/// signal.
fn wake_plan(added: usize, idle: usize) -> Wake {
    if added == 0 || idle == 0 {
        Wake::Nobody
    } else if added >= idle {
        Wake::All
    } else {
        Wake::One(added)
    }
}

/// Exclusive access to a pool's queue.
///
/// While the guard lives no worker can dequeue, so a batch pushed through
/// it becomes visible atomically. Workers are woken once, when the guard
/// is dropped.
///
/// Do not call the owning pool's (or a `ParentRef`'s) queue methods while
/// holding the guard; they take the same lock.
pub struct PoolGuard<'a, A: BroadcastArgs> {
    shared: &'a Shared<A>,
    state: Option<MutexGuard<'a, QueueState<A>>>,
    added: usize,
}

impl<'a, A: BroadcastArgs> PoolGuard<'a, A> {
    fn state(&mut self) -> &mut QueueState<A> {
        // Some until drop
        match self.state.as_mut() {
            Some(state) => state,
            None => unreachable!("PoolGuard used after release"),
        }
    }

    /// Enqueue at the back (normal priority).
    pub fn push_back<T, M>(&mut self, task: T)
    where
        T: Task<A, M>,
    {
        self.state().jobs.push_back(task.into_job());
        self.added += 1;
    }

    /// Enqueue at the front; it is the next job dequeued.
    pub fn push_front<T, M>(&mut self, task: T)
    where
        T: Task<A, M>,
    {
        self.state().jobs.push_front(task.into_job());
        self.added += 1;
    }

    /// Enqueue a batch at the back in iteration order. Returns the count.
    pub fn append<I, T, M>(&mut self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Task<A, M>,
    {
        let state = self.state();
        let before = state.jobs.len();
        state.jobs.extend(tasks.into_iter().map(|task| task.into_job()));
        let n = state.jobs.len() - before;
        self.added += n;
        n
    }

    /// Push each job of a batch to the front in turn, so the last one
    /// yielded by the iterator runs first. Returns the count.
    pub fn prepend<I, T, M>(&mut self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Task<A, M>,
    {
        let state = self.state();
        let mut n = 0;
        for task in tasks {
            state.jobs.push_front(task.into_job());
            n += 1;
        }
        self.added += n;
        n
    }

    /// Queued jobs, including those pushed through this guard
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.jobs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a, A: BroadcastArgs> Drop for PoolGuard<'a, A> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            let idle = state.idle;
            drop(state);
            self.shared.wake(self.added, idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wake_plan() {
        // one job, several parked workers: a single notify_one
        assert_eq!(wake_plan(1, 4), Wake::One(1));
        assert_eq!(wake_plan(3, 4), Wake::One(3));
        // batch covering every parked worker
        assert_eq!(wake_plan(4, 4), Wake::All);
        assert_eq!(wake_plan(10, 2), Wake::All);
        // nothing added, or nobody parked
        assert_eq!(wake_plan(0, 4), Wake::Nobody);
        assert_eq!(wake_plan(5, 0), Wake::Nobody);
    }

    #[test]
    fn test_pool_ids_unique() {
        let a = Shared::new(());
        let b = Shared::new(());
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, 0);
    }

    #[test]
    fn test_guard_counts() {
        let shared = Shared::new(());
        {
            let mut guard = shared.lock();
            assert!(guard.is_empty());
            guard.push_back(|| {});
            guard.push_front(|| {});
            assert_eq!(guard.append((0..3).map(|_| || {})), 3);
            assert_eq!(guard.prepend(Vec::<Job<()>>::new()), 0);
            assert_eq!(guard.len(), 5);
            assert_eq!(guard.added, 5);
        }
        assert_eq!(shared.num_jobs(), 5);
        assert_eq!(shared.clear(), 5);
        assert_eq!(shared.num_jobs(), 0);
    }

    #[test]
    fn test_wait_done_on_stopped_queue() {
        let shared = Shared::new(());
        shared.lock().push_back(|| {});

        // Inactive: returns at once even though a job is queued
        assert!(shared.wait_done(None));

        shared.set_flags(true, true);
        shared.lock_state().live = 1;
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!shared.wait_done(Some(deadline)));

        shared.stop();
        assert!(shared.wait_done(Some(Instant::now())));
    }

    #[test]
    fn test_resume_replaces_args() {
        let shared = Shared::new((1u32,));
        assert_eq!(shared.resume_running(Some((9,))), Err(Some((9,))));
        assert!(!shared.is_active());

        shared.set_flags(true, false);
        assert_eq!(shared.resume_running(Some((9,))), Ok(()));
        assert!(shared.is_active());
        assert_eq!(shared.lock_state().args, (9,));

        shared.replace_args((4,));
        assert_eq!(shared.lock_state().args, (4,));
    }
}
