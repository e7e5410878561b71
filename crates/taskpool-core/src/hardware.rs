//! Hardware concurrency query

use std::num::NonZeroUsize;

/// Number of execution units available to this process, at least 1.
///
/// Prefers `available_parallelism` (which honours affinity masks and
/// cgroup quotas); falls back to the online CPU count from the OS.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .ok()
        .or_else(online_cpus)
        .unwrap_or(1)
        .max(1)
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn online_cpus() -> Option<usize> {
            // Safety: sysconf has no memory-safety preconditions
            let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
            if n > 0 { Some(n as usize) } else { None }
        }
    } else {
        fn online_cpus() -> Option<usize> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least_one() {
        assert!(hardware_concurrency() >= 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_online_cpus() {
        assert!(online_cpus().unwrap_or(1) >= 1);
    }
}
