//! # taskpool-core
//!
//! Leaf types shared by the taskpool crates. Nothing in here knows about
//! worker threads or queues.
//!
//! ## Modules
//!
//! - `function` - Type-erased callables with inline (small-object) storage
//! - `error` - Error types
//! - `hardware` - Hardware concurrency query
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable helpers

pub mod env;
pub mod error;
pub mod function;
pub mod hardware;
pub mod kprint;

pub use env::{env_get, env_get_bool, env_get_opt};
pub use error::{CallError, PoolError, PoolResult, WorkerError};
pub use function::{Callable, Function, UniqueFunction};
pub use hardware::hardware_concurrency;
