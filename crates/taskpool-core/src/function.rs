//! Type-erased callables with small-object storage
//!
//! `UniqueFunction<Args, R>` owns any callable that accepts the argument
//! tuple `Args` and returns `R`. `Function<Args, R>` is the copyable
//! flavour: it only accepts `Clone` payloads and clones them on `clone()`.
//!
//! ## Storage
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────┐
//! │ vtable: &'static VTable      │ buf: [u8; INLINE_SIZE] align(16) │
//! │  invoke / drop / clone?      │  payload F          (fits)       │
//! │                              │  *mut F -> Box<F>   (too big)    │
//! └──────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! The inline/boxed decision is made per payload type at compile time
//! from its size and alignment. Rust moves are bitwise and cannot fail,
//! so every payload can be relocated together with the container.
//!
//! Dispatch tables are promoted `'static` constants, so `Args` and `R`
//! must be `'static` as well.
//!
//! ## Example
//!
//! ```ignore
//! use taskpool_core::function::UniqueFunction;
//!
//! let offset = 10;
//! let mut f: UniqueFunction<(i32, i32), i32> = UniqueFunction::new(move |a, b| a + b + offset);
//! assert_eq!(f.call((1, 2)), Ok(13));
//! ```

use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ptr;

use crate::error::CallError;

/// Bytes available for an inline payload (four machine words)
pub const INLINE_SIZE: usize = 4 * mem::size_of::<usize>();

/// Maximum payload alignment that can be stored inline
pub const INLINE_ALIGN: usize = 16;

/// Whether a payload of type `F` is stored inline rather than boxed
pub const fn fits_inline<F>() -> bool {
    mem::size_of::<F>() <= INLINE_SIZE && mem::align_of::<F>() <= INLINE_ALIGN
}

/// Invocation interface for a concrete callable type.
///
/// Implemented for every `FnMut(A1, .., An) -> R` (n <= 6) with
/// `Args = (A1, .., An)`.
pub trait Callable<Args, R> {
    fn call(&mut self, args: Args) -> R;
}

macro_rules! impl_callable {
    ($($ty:ident $val:ident),*) => {
        impl<Func, Ret, $($ty,)*> Callable<($($ty,)*), Ret> for Func
        where
            Func: FnMut($($ty),*) -> Ret,
        {
            #[inline]
            fn call(&mut self, ($($val,)*): ($($ty,)*)) -> Ret {
                self($($val),*)
            }
        }
    };
}

impl_callable!();
impl_callable!(A1 a1);
impl_callable!(A1 a1, A2 a2);
impl_callable!(A1 a1, A2 a2, A3 a3);
impl_callable!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_callable!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_callable!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);

#[repr(C, align(16))]
struct Buffer([MaybeUninit<u8>; INLINE_SIZE]);

const _: () = assert!(mem::align_of::<Buffer>() == INLINE_ALIGN);
const _: () = assert!(mem::size_of::<*mut ()>() <= INLINE_SIZE);

impl Buffer {
    const fn uninit() -> Self {
        Buffer([MaybeUninit::uninit(); INLINE_SIZE])
    }

    #[inline]
    fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr().cast()
    }

    #[inline]
    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr().cast()
    }
}

type CloneFn = unsafe fn(*const u8, *mut u8);

/// Per-type dispatch table
struct VTable<Args, R> {
    invoke: unsafe fn(*mut u8, Args) -> R,
    drop: unsafe fn(*mut u8),
    clone: Option<CloneFn>,
    inline: bool,
}

unsafe fn invoke_inline<F: Callable<Args, R>, Args, R>(buf: *mut u8, args: Args) -> R {
    (*buf.cast::<F>()).call(args)
}

unsafe fn drop_inline<F>(buf: *mut u8) {
    ptr::drop_in_place(buf.cast::<F>());
}

unsafe fn clone_inline<F: Clone>(src: *const u8, dst: *mut u8) {
    dst.cast::<F>().write((*src.cast::<F>()).clone());
}

unsafe fn invoke_boxed<F: Callable<Args, R>, Args, R>(buf: *mut u8, args: Args) -> R {
    let payload = buf.cast::<*mut F>().read();
    (*payload).call(args)
}

unsafe fn drop_boxed<F>(buf: *mut u8) {
    drop(Box::from_raw(buf.cast::<*mut F>().read()));
}

unsafe fn clone_boxed<F: Clone>(src: *const u8, dst: *mut u8) {
    let payload: &F = &*src.cast::<*mut F>().read();
    let copy = Box::new(payload.clone());
    dst.cast::<*mut F>().write(Box::into_raw(copy));
}

struct VTableFor<F, Args, R>(PhantomData<fn(F, Args) -> R>);

impl<F: Callable<Args, R>, Args, R> VTableFor<F, Args, R> {
    const INLINE: VTable<Args, R> = VTable {
        invoke: invoke_inline::<F, Args, R>,
        drop: drop_inline::<F>,
        clone: None,
        inline: true,
    };

    const BOXED: VTable<Args, R> = VTable {
        invoke: invoke_boxed::<F, Args, R>,
        drop: drop_boxed::<F>,
        clone: None,
        inline: false,
    };
}

impl<F: Callable<Args, R> + Clone, Args, R> VTableFor<F, Args, R> {
    const INLINE_CLONE: VTable<Args, R> = VTable {
        invoke: invoke_inline::<F, Args, R>,
        drop: drop_inline::<F>,
        clone: Some(clone_inline::<F> as CloneFn),
        inline: true,
    };

    const BOXED_CLONE: VTable<Args, R> = VTable {
        invoke: invoke_boxed::<F, Args, R>,
        drop: drop_boxed::<F>,
        clone: Some(clone_boxed::<F> as CloneFn),
        inline: false,
    };
}

/// Shared machinery behind `UniqueFunction` and `Function`.
///
/// Invariant: `vtable.is_some()` iff `buf` holds a live payload (or a
/// live `Box` pointer) of the type the vtable was built for.
struct RawFunction<Args: 'static, R: 'static> {
    vtable: Option<&'static VTable<Args, R>>,
    buf: Buffer,
    // payload thread-safety is asserted by the public wrappers
    _not_send: PhantomData<*mut ()>,
}

impl<Args: 'static, R: 'static> RawFunction<Args, R> {
    const fn empty() -> Self {
        RawFunction {
            vtable: None,
            buf: Buffer::uninit(),
            _not_send: PhantomData,
        }
    }

    fn store<F>(
        f: F,
        inline: &'static VTable<Args, R>,
        boxed: &'static VTable<Args, R>,
    ) -> Self {
        let mut raw = Self::empty();
        let dst = raw.buf.as_mut_ptr();
        if fits_inline::<F>() {
            // Safety: size and alignment checked above, buffer is unused
            unsafe { dst.cast::<F>().write(f) };
            raw.vtable = Some(inline);
        } else {
            let payload = Box::into_raw(Box::new(f));
            // Safety: a pointer always fits (asserted at compile time)
            unsafe { dst.cast::<*mut F>().write(payload) };
            raw.vtable = Some(boxed);
        }
        raw
    }

    #[inline]
    fn is_some(&self) -> bool {
        self.vtable.is_some()
    }

    #[inline]
    fn is_inline(&self) -> bool {
        self.vtable.map_or(false, |vt| vt.inline)
    }

    #[inline]
    fn call(&mut self, args: Args) -> Result<R, CallError> {
        match self.vtable {
            // Safety: vtable matches the payload by the struct invariant
            Some(vt) => Ok(unsafe { (vt.invoke)(self.buf.as_mut_ptr(), args) }),
            None => Err(CallError::Empty),
        }
    }

    #[inline]
    unsafe fn call_unchecked(&mut self, args: Args) -> R {
        match self.vtable {
            Some(vt) => (vt.invoke)(self.buf.as_mut_ptr(), args),
            None => core::hint::unreachable_unchecked(),
        }
    }

    fn reset(&mut self) {
        // clear first: a panicking destructor must not be run twice
        if let Some(vt) = self.vtable.take() {
            // Safety: payload is live and is dropped exactly once here
            unsafe { (vt.drop)(self.buf.as_mut_ptr()) };
        }
    }

    fn duplicate(&self) -> Self {
        let mut out = Self::empty();
        if let Some(vt) = self.vtable {
            if let Some(clone) = vt.clone {
                // Safety: source payload is live; `out` stays empty if clone panics
                unsafe { clone(self.buf.as_ptr(), out.buf.as_mut_ptr()) };
                out.vtable = Some(vt);
            }
        }
        out
    }

    fn describe(&self, name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match self.vtable {
            None => "empty",
            Some(vt) if vt.inline => "inline",
            Some(_) => "boxed",
        };
        f.debug_struct(name).field("storage", &storage).finish()
    }
}

impl<Args: 'static, R: 'static> Drop for RawFunction<Args, R> {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Move-only type-erased callable.
pub struct UniqueFunction<Args: 'static, R: 'static = ()> {
    raw: RawFunction<Args, R>,
}

// Safety: constructors only accept `Send` payloads
unsafe impl<Args: 'static, R: 'static> Send for UniqueFunction<Args, R> {}

impl<Args: 'static, R: 'static> UniqueFunction<Args, R> {
    /// Wrap a callable, storing it inline when it fits.
    pub fn new<F>(f: F) -> Self
    where
        F: Callable<Args, R> + Send + 'static,
    {
        UniqueFunction {
            raw: RawFunction::store(
                f,
                &VTableFor::<F, Args, R>::INLINE,
                &VTableFor::<F, Args, R>::BOXED,
            ),
        }
    }

    /// A container holding nothing; calling it yields `CallError::Empty`.
    pub const fn empty() -> Self {
        UniqueFunction {
            raw: RawFunction::empty(),
        }
    }

    /// True iff a callable is held
    #[inline]
    pub fn is_some(&self) -> bool {
        self.raw.is_some()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.raw.is_some()
    }

    /// True iff the held callable lives in the inline buffer
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.raw.is_inline()
    }

    /// Invoke the held callable.
    #[inline]
    pub fn call(&mut self, args: Args) -> Result<R, CallError> {
        self.raw.call(args)
    }

    /// Invoke without the emptiness check.
    ///
    /// # Safety
    ///
    /// The container must hold a callable (`is_some()`).
    #[inline]
    pub unsafe fn call_unchecked(&mut self, args: Args) -> R {
        self.raw.call_unchecked(args)
    }

    /// Drop the held callable (if any), leaving the container empty.
    pub fn reset(&mut self) {
        self.raw.reset();
    }

    /// Move the callable out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<Args: 'static, R: 'static> Default for UniqueFunction<Args, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<Args: 'static, R: 'static> fmt::Debug for UniqueFunction<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.describe("UniqueFunction", f)
    }
}

impl<Args: 'static, R: 'static> From<Function<Args, R>> for UniqueFunction<Args, R> {
    fn from(f: Function<Args, R>) -> Self {
        UniqueFunction { raw: f.raw }
    }
}

/// Copyable type-erased callable.
///
/// Cloning deep-copies the payload through the vtable's clone entry, so
/// each copy owns independent state.
pub struct Function<Args: 'static, R: 'static = ()> {
    raw: RawFunction<Args, R>,
}

// Safety: constructors only accept `Send` payloads
unsafe impl<Args: 'static, R: 'static> Send for Function<Args, R> {}

impl<Args: 'static, R: 'static> Function<Args, R> {
    pub fn new<F>(f: F) -> Self
    where
        F: Callable<Args, R> + Clone + Send + 'static,
    {
        Function {
            raw: RawFunction::store(
                f,
                &VTableFor::<F, Args, R>::INLINE_CLONE,
                &VTableFor::<F, Args, R>::BOXED_CLONE,
            ),
        }
    }

    pub const fn empty() -> Self {
        Function {
            raw: RawFunction::empty(),
        }
    }

    #[inline]
    pub fn is_some(&self) -> bool {
        self.raw.is_some()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.raw.is_some()
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        self.raw.is_inline()
    }

    #[inline]
    pub fn call(&mut self, args: Args) -> Result<R, CallError> {
        self.raw.call(args)
    }

    /// # Safety
    ///
    /// The container must hold a callable (`is_some()`).
    #[inline]
    pub unsafe fn call_unchecked(&mut self, args: Args) -> R {
        self.raw.call_unchecked(args)
    }

    pub fn reset(&mut self) {
        self.raw.reset();
    }

    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<Args: 'static, R: 'static> Clone for Function<Args, R> {
    fn clone(&self) -> Self {
        Function {
            raw: self.raw.duplicate(),
        }
    }
}

impl<Args: 'static, R: 'static> Default for Function<Args, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<Args: 'static, R: 'static> fmt::Debug for Function<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.describe("Function", f)
    }
}
