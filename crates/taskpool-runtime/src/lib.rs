//! # taskpool-runtime
//!
//! Thread pool runtime: the shared job deque, worker threads and the pool
//! lifecycle.
//!
//! ## Modules
//!
//! - `config` - `PoolConfig` with env overrides
//! - `job` - `Job` and the closure shapes accepted as jobs
//! - `queue` - Shared deque, condition variables, `PoolGuard`
//! - `parent` - `ParentRef`, the handle jobs receive
//! - `worker` - Worker threads and their loop
//! - `pool` - `ThreadPool`
//! - `global` - Explicitly managed process-wide pool

pub mod config;
pub mod global;
pub mod job;
pub mod parent;
pub mod pool;
pub mod queue;
pub mod worker;

// Re-exports
pub use config::{ConfigError, PoolConfig, ShrinkPolicy};
pub use global::{global, init_global, shutdown_global};
pub use job::{BroadcastArgs, Job, Task};
pub use parent::ParentRef;
pub use pool::ThreadPool;
pub use queue::PoolGuard;
pub use worker::current_pool_id;
