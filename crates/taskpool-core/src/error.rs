//! Error types for the task pool

use core::fmt;

/// Result type for pool lifecycle operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by pool lifecycle operations
///
/// Queue contention and empty queues are never errors: workers and
/// waiters simply block. Only lifecycle misuse and worker failures
/// end up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `start()` on a pool whose workers are already looping
    AlreadyRunning,

    /// Global pool was already installed
    AlreadyInitialized,

    /// Global pool was never installed (or already shut down)
    NotInitialized,

    /// A worker thread tried to join its own pool
    JoinFromWorker,

    /// Configuration rejected by `PoolConfig::validate`
    InvalidConfig(&'static str),

    /// Worker thread error
    Worker(WorkerError),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::AlreadyRunning => write!(f, "pool is already running"),
            PoolError::AlreadyInitialized => write!(f, "global pool already initialized"),
            PoolError::NotInitialized => write!(f, "global pool not initialized"),
            PoolError::JoinFromWorker => {
                write!(f, "cannot join or resize a pool from one of its own workers")
            }
            PoolError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            PoolError::Worker(e) => write!(f, "worker error: {}", e),
        }
    }
}

impl std::error::Error for PoolError {}

/// Worker thread related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The OS refused to spawn a worker thread
    SpawnFailed(std::io::ErrorKind),

    /// This many worker threads unwound out of their loop because a job panicked
    Panicked(usize),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::SpawnFailed(kind) => write!(f, "failed to spawn worker thread: {}", kind),
            WorkerError::Panicked(n) => write!(f, "{} worker thread(s) panicked", n),
        }
    }
}

impl From<WorkerError> for PoolError {
    fn from(e: WorkerError) -> Self {
        PoolError::Worker(e)
    }
}

/// Error returned when invoking an empty callable container
///
/// This is the "bad function call" condition: the container was
/// default-constructed, reset, or its payload was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    Empty,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Empty => write!(f, "bad function call: callable is empty"),
        }
    }
}

impl std::error::Error for CallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PoolError::JoinFromWorker;
        assert_eq!(
            format!("{}", e),
            "cannot join or resize a pool from one of its own workers"
        );

        let e = PoolError::Worker(WorkerError::Panicked(2));
        assert_eq!(format!("{}", e), "worker error: 2 worker thread(s) panicked");

        assert_eq!(format!("{}", CallError::Empty), "bad function call: callable is empty");
    }

    #[test]
    fn test_error_conversion() {
        let err: PoolError = WorkerError::SpawnFailed(std::io::ErrorKind::OutOfMemory).into();
        assert!(matches!(
            err,
            PoolError::Worker(WorkerError::SpawnFailed(std::io::ErrorKind::OutOfMemory))
        ));
    }
}
