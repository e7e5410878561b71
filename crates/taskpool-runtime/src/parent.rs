//! Restricted pool handle handed to running jobs

use std::fmt;
use std::sync::Arc;

use crate::job::{BroadcastArgs, Task};
use crate::queue::{PoolGuard, Shared};

/// What a job may do to the pool that runs it.
///
/// A `ParentRef` can enqueue more work, pause the pool and observe its
/// queue. It cannot join, terminate or resize the pool, so a job can never
/// wait on its own worker thread.
///
/// Cloning is cheap. A job may move its handle into the children it
/// spawns, and the handle keeps the queue alive even if the owning
/// `ThreadPool` is dropped meanwhile (pushes then simply go nowhere).
pub struct ParentRef<A: 'static> {
    shared: Arc<Shared<A>>,
}

impl<A: 'static> Clone for ParentRef<A> {
    fn clone(&self) -> Self {
        ParentRef {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: BroadcastArgs> ParentRef<A> {
    pub(crate) fn new(shared: Arc<Shared<A>>) -> Self {
        ParentRef { shared }
    }

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

    /// Enqueue a batch at the back in iteration order.
    pub fn append<I, T, M>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Task<A, M>,
    {
        self.shared.lock().append(tasks)
    }

    /// Push a batch to the front one by one; the last one runs first.
    pub fn prepend<I, T, M>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Task<A, M>,
    {
        self.shared.lock().prepend(tasks)
    }

    /// Pause dequeuing. Jobs already running, this one included, finish.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn num_jobs(&self) -> usize {
        self.shared.num_jobs()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Lock the queue for a batch of pushes; see [`PoolGuard`].
    pub fn lock(&self) -> PoolGuard<'_, A> {
        self.shared.lock()
    }
}

impl<A: 'static> fmt::Debug for ParentRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentRef")
            .field("pool", &self.shared.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ParentRef, ThreadPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_root_spawns_children() {
        let pool = ThreadPool::new(2);
        let executed = Arc::new(AtomicUsize::new(0));

        let e = executed.clone();
        pool.push_back(move |parent: ParentRef<()>| {
            e.fetch_add(1, Ordering::SeqCst);
            for _ in 0..2 {
                let e = e.clone();
                parent.push_back(move || {
                    e.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        // children are pushed before the root finishes, so join sees them
        pool.join().unwrap();
        assert_eq!(executed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_recursive_fan_out() {
        fn spawn(parent: &ParentRef<(Arc<AtomicUsize>,)>, depth: u32) {
            let child = parent.clone();
            parent.push_back(move |_p: ParentRef<(Arc<AtomicUsize>,)>, count: Arc<AtomicUsize>| {
                count.fetch_add(1, Ordering::SeqCst);
                if depth > 0 {
                    spawn(&child, depth - 1);
                    spawn(&child, depth - 1);
                }
            });
        }

        let count = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::with_args(4, (count.clone(),));
        pool.push_back(move |parent: ParentRef<(Arc<AtomicUsize>,)>, _count: Arc<AtomicUsize>| {
            spawn(&parent, 4);
        });
        pool.wait();

        // full binary tree of depth 4
        assert_eq!(count.load(Ordering::SeqCst), 31);
        pool.join().unwrap();
    }

    #[test]
    fn test_job_can_stop_pool() {
        let pool = ThreadPool::new(1);
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let mut guard = pool.lock();
            guard.push_back(|parent: ParentRef<()>| {
                parent.stop();
                assert!(!parent.is_active());
            });
            let r = ran.clone();
            guard.push_back(move || {
                r.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.wait();

        assert!(!pool.is_active());
        assert_eq!(pool.num_jobs(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        pool.reactivate().unwrap();
        pool.wait();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        pool.join().unwrap();
    }

    #[test]
    fn test_parent_batches() {
        let pool = ThreadPool::with_config(
            crate::PoolConfig::new().num_threads(1).delay_start(true),
            (),
        )
        .unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o = order.clone();
        pool.push_back(move |parent: ParentRef<()>| {
            let jobs = (0..3).map(|i| {
                let o = o.clone();
                move || o.lock().unwrap().push(i)
            });
            assert_eq!(parent.prepend(jobs), 3);
            assert_eq!(parent.num_jobs(), 3);
        });
        pool.reactivate().unwrap();
        pool.wait();

        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        pool.join().unwrap();
    }
}
