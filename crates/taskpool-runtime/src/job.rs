//! Jobs and the callable shapes accepted as jobs
//!
//! A job is a one-shot callable that receives a [`ParentRef`] to the pool
//! running it followed by the pool's broadcast arguments. Callers rarely
//! build one by hand: anything implementing [`Task`] is converted at
//! submission time.
//!
//! | closure shape                          | marker       |
//! |----------------------------------------|--------------|
//! | `FnOnce(T1, .., Tn)`                   | [`Plain`]      |
//! | `FnOnce(ParentRef<A>, T1, .., Tn)`     | [`WithParent`] |
//! | [`Job<A>`]                             | [`Prebuilt`]   |
//!
//! where `A = (T1, .., Tn)` with `n <= 4`. Closure parameters that are
//! used as values inside the body need a type annotation
//! (`|parent: ParentRef<()>| ...`) so the shape can be picked before the
//! body is type-checked.

use std::fmt;

use taskpool_core::UniqueFunction;

use crate::parent::ParentRef;

/// Bound on the broadcast argument tuple of a pool.
///
/// Every job receives its own clone of the tuple. Share large or
/// mutable state by putting an `Arc` in it.
pub trait BroadcastArgs: Clone + Send + 'static {}

impl<A: Clone + Send + 'static> BroadcastArgs for A {}

/// A queued unit of work for a pool with broadcast arguments `A`.
pub struct Job<A: 'static> {
    func: UniqueFunction<(ParentRef<A>, A)>,
}

impl<A: BroadcastArgs> Job<A> {
    /// Convert any accepted task shape into a job.
    pub fn new<T, M>(task: T) -> Self
    where
        T: Task<A, M>,
    {
        task.into_job()
    }

    /// Build a job from a closure receiving the parent handle and the
    /// whole argument tuple.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(ParentRef<A>, A) + Send + 'static,
    {
        let mut slot = Some(f);
        Job {
            func: UniqueFunction::new(move |parent: ParentRef<A>, args: A| {
                if let Some(f) = slot.take() {
                    f(parent, args)
                }
            }),
        }
    }

    /// Whether the closure fit the inline buffer
    pub fn is_inline(&self) -> bool {
        self.func.is_inline()
    }

    /// Consume and execute the job.
    pub(crate) fn run(mut self, parent: ParentRef<A>, args: A) {
        let ran = self.func.call((parent, args));
        debug_assert!(ran.is_ok(), "from_fn never builds an empty job");
    }
}

impl<A: 'static> fmt::Debug for Job<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("inline", &self.func.is_inline())
            .finish()
    }
}

/// Marker: closure takes only the broadcast arguments
pub enum Plain {}

/// Marker: closure takes the parent handle first
pub enum WithParent {}

/// Marker: already a [`Job`]
pub enum Prebuilt {}

/// Something that can be submitted to a pool with broadcast arguments `A`.
///
/// `Marker` only disambiguates the blanket impls; it is inferred at the
/// call site.
pub trait Task<A: 'static, Marker>: Send + 'static {
    fn into_job(self) -> Job<A>;
}

impl<A: BroadcastArgs> Task<A, Prebuilt> for Job<A> {
    #[inline]
    fn into_job(self) -> Job<A> {
        self
    }
}

macro_rules! impl_task {
    ($($ty:ident $val:ident),*) => {
        impl<Func, $($ty,)*> Task<($($ty,)*), Plain> for Func
        where
            Func: FnOnce($($ty),*) + Send + 'static,
            $($ty: Clone + Send + 'static,)*
        {
            fn into_job(self) -> Job<($($ty,)*)> {
                Job::<($($ty,)*)>::from_fn(move |_parent, ($($val,)*)| self($($val),*))
            }
        }

        impl<Func, $($ty,)*> Task<($($ty,)*), WithParent> for Func
        where
            Func: FnOnce(ParentRef<($($ty,)*)>, $($ty),*) + Send + 'static,
            $($ty: Clone + Send + 'static,)*
        {
            fn into_job(self) -> Job<($($ty,)*)> {
                Job::<($($ty,)*)>::from_fn(move |parent, ($($val,)*)| self(parent, $($val),*))
            }
        }
    };
}

impl_task!();
impl_task!(T1 a1);
impl_task!(T1 a1, T2 a2);
impl_task!(T1 a1, T2 a2, T3 a3);
impl_task!(T1 a1, T2 a2, T3 a3, T4 a4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThreadPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn shape<A: BroadcastArgs, M, T: Task<A, M>>(task: T) -> Job<A> {
        task.into_job()
    }

    #[test]
    fn test_shapes_convert() {
        let plain: Job<()> = shape(|| {});
        let with_parent: Job<()> = shape(|_parent: ParentRef<()>| {});
        let prebuilt: Job<()> = shape(Job::<()>::from_fn(|_parent, ()| {}));

        assert!(plain.is_inline());
        assert!(with_parent.is_inline());
        assert!(prebuilt.is_inline());
    }

    #[test]
    fn test_args_are_spread() {
        let pool = ThreadPool::with_args(1, (2usize, 3usize));
        let product = Arc::new(AtomicUsize::new(0));

        let p = product.clone();
        pool.push_back(move |a: usize, b: usize| {
            p.store(a * b, Ordering::SeqCst);
        });
        pool.wait();

        assert_eq!(product.load(Ordering::SeqCst), 6);
        pool.join().unwrap();
    }

    #[test]
    fn test_large_capture_goes_to_heap() {
        let big = [7u64; 32];
        let job = Job::<()>::new(move || {
            assert_eq!(big[31], 7);
        });
        assert!(!job.is_inline());
        assert!(format!("{:?}", job).contains("inline: false"));
    }
}
