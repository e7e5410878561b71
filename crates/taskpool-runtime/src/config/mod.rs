//! Thread pool configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls on the config value
//! 2. Environment variables (only through `from_env()` / `default()`)
//! 3. Library defaults (`defaults.rs`)
//!
//! # Example
//!
//! ```rust,ignore
//! use taskpool_runtime::config::{PoolConfig, ShrinkPolicy};
//!
//! // Defaults with env overrides
//! let config = PoolConfig::from_env();
//!
//! // Or customize programmatically
//! let config = PoolConfig::new()
//!     .num_threads(8)
//!     .thread_name("render")
//!     .shrink_policy(ShrinkPolicy::Discard);
//! ```

pub mod defaults;

use std::fmt;
use std::str::FromStr;

use taskpool_core::env::{env_get, env_get_bool, env_get_opt};
use taskpool_core::PoolError;

/// What `set_num_threads` does with work still queued when it has to
/// tear down running workers to shrink the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkPolicy {
    /// Wait for the queue to drain (or the pool to be stopped) before
    /// retiring workers. Jobs left behind by a stopped pool are kept.
    Drain,
    /// Retire workers after their current job and drop everything queued.
    Discard,
}

impl FromStr for ShrinkPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drain" => Ok(ShrinkPolicy::Drain),
            "discard" => Ok(ShrinkPolicy::Discard),
            _ => Err(ConfigError::InvalidValue(
                "shrink_policy must be \"drain\" or \"discard\"",
            )),
        }
    }
}

impl fmt::Display for ShrinkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShrinkPolicy::Drain => write!(f, "drain"),
            ShrinkPolicy::Discard => write!(f, "discard"),
        }
    }
}

/// Pool configuration with builder pattern.
///
/// Use `from_env()` to start from the library defaults with any
/// environment variable overrides applied.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads
    pub num_threads: usize,
    /// Construct the pool without spawning workers; `reactivate()` starts it
    pub delay_start: bool,
    /// Worker thread name prefix
    pub thread_name: String,
    /// Worker stack size in bytes, `None` for the platform default
    pub stack_size: Option<usize>,
    /// Queue handling when shrinking a running pool
    pub shrink_policy: ShrinkPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `TP_NUM_THREADS` - Number of worker threads
    /// - `TP_DELAY_START` - Construct stopped (0/1)
    /// - `TP_THREAD_NAME` - Worker thread name prefix
    /// - `TP_STACK_SIZE` - Worker stack size in bytes (0 = platform default)
    /// - `TP_SHRINK_POLICY` - `drain` or `discard`
    pub fn from_env() -> Self {
        let stack_size = env_get("TP_STACK_SIZE", defaults::STACK_SIZE);
        Self {
            num_threads: env_get("TP_NUM_THREADS", defaults::num_threads()),
            delay_start: env_get_bool("TP_DELAY_START", defaults::DELAY_START),
            thread_name: env_get_opt::<String>("TP_THREAD_NAME")
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| defaults::THREAD_NAME.to_string()),
            stack_size: (stack_size != 0).then_some(stack_size),
            shrink_policy: env_get("TP_SHRINK_POLICY", defaults::SHRINK_POLICY),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            num_threads: defaults::num_threads(),
            delay_start: defaults::DELAY_START,
            thread_name: defaults::THREAD_NAME.to_string(),
            stack_size: None,
            shrink_policy: defaults::SHRINK_POLICY,
        }
    }

    // Builder methods

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn delay_start(mut self, delay: bool) -> Self {
        self.delay_start = delay;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// 0 restores the platform default
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = (size != 0).then_some(size);
        self
    }

    pub fn shrink_policy(mut self, policy: ShrinkPolicy) -> Self {
        self.shrink_policy = policy;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::InvalidValue("num_threads must be > 0"));
        }
        if self.num_threads > defaults::MAX_THREADS {
            return Err(ConfigError::InvalidValue("num_threads must be <= 1024"));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::InvalidValue("thread_name must not be empty"));
        }
        if self.thread_name.contains('\0') {
            return Err(ConfigError::InvalidValue("thread_name must not contain NUL"));
        }
        if matches!(self.stack_size, Some(size) if size < defaults::MIN_STACK_SIZE) {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("Thread Pool Configuration:");
        eprintln!("  num_threads:    {}", self.num_threads);
        eprintln!("  delay_start:    {}", self.delay_start);
        eprintln!("  thread_name:    {}", self.thread_name);
        match self.stack_size {
            Some(size) => eprintln!("  stack_size:     {}", size),
            None => eprintln!("  stack_size:     platform default"),
        }
        eprintln!("  shrink_policy:  {}", self.shrink_policy);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => PoolError::InvalidConfig(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = PoolConfig::new();
        assert!(config.validate().is_ok());
        assert!(config.num_threads >= 1);
        assert_eq!(config.thread_name, defaults::THREAD_NAME);
        assert_eq!(config.stack_size, None);
        assert_eq!(config.shrink_policy, ShrinkPolicy::Drain);
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .num_threads(3)
            .delay_start(true)
            .thread_name("io")
            .stack_size(256 * 1024)
            .shrink_policy(ShrinkPolicy::Discard);

        assert_eq!(config.num_threads, 3);
        assert!(config.delay_start);
        assert_eq!(config.thread_name, "io");
        assert_eq!(config.stack_size, Some(256 * 1024));
        assert_eq!(config.shrink_policy, ShrinkPolicy::Discard);

        assert_eq!(config.stack_size(0).stack_size, None);
    }

    #[test]
    fn test_validation() {
        let config = PoolConfig::new().num_threads(0);
        assert!(config.validate().is_err());

        let config = PoolConfig::new().num_threads(defaults::MAX_THREADS + 1);
        assert!(config.validate().is_err());

        let config = PoolConfig::new().thread_name("");
        assert!(config.validate().is_err());

        let config = PoolConfig::new().stack_size(1024);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue("stack_size must be >= 16KB"))
        );
    }

    #[test]
    fn test_config_error_into_pool_error() {
        let err: PoolError = ConfigError::InvalidValue("num_threads must be > 0").into();
        assert_eq!(err, PoolError::InvalidConfig("num_threads must be > 0"));
    }

    #[test]
    fn test_shrink_policy_parse() {
        assert_eq!("drain".parse::<ShrinkPolicy>(), Ok(ShrinkPolicy::Drain));
        assert_eq!(" Discard ".parse::<ShrinkPolicy>(), Ok(ShrinkPolicy::Discard));
        assert!("flush".parse::<ShrinkPolicy>().is_err());
        assert_eq!(ShrinkPolicy::Discard.to_string(), "discard");
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("TP_NUM_THREADS", "5");
        std::env::set_var("TP_SHRINK_POLICY", "discard");
        std::env::set_var("TP_THREAD_NAME", "env-pool");
        let config = PoolConfig::from_env();
        std::env::remove_var("TP_NUM_THREADS");
        std::env::remove_var("TP_SHRINK_POLICY");
        std::env::remove_var("TP_THREAD_NAME");

        assert_eq!(config.num_threads, 5);
        assert_eq!(config.shrink_policy, ShrinkPolicy::Discard);
        assert_eq!(config.thread_name, "env-pool");
    }
}
