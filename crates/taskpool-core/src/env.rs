//! Environment variable helpers
//!
//! Used by `PoolConfig::from_env` and the logger. Unset and unparsable
//! values both fall back to the default.

use std::str::FromStr;

/// Get environment variable parsed as `T`, or return `default`
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as an optional parsed value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" are true and "0", "false", "no", "off" are
/// false (case-insensitive). Anything else, or unset, yields `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__TP_TEST_UNSET_VAR__", 42);
        assert_eq!(val, 42);

        let val: Option<usize> = env_get_opt("__TP_TEST_UNSET_VAR__");
        assert!(val.is_none());
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__TP_TEST_NUM__", " 123 ");
        let val: usize = env_get("__TP_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__TP_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__TP_TEST_INVALID__", "not_a_number");
        let val: usize = env_get("__TP_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__TP_TEST_INVALID__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var("__TP_TEST_BOOL__", v);
            assert!(env_get_bool("__TP_TEST_BOOL__", false), "{v}");
        }
        for v in ["0", "false", "no", "Off"] {
            std::env::set_var("__TP_TEST_BOOL__", v);
            assert!(!env_get_bool("__TP_TEST_BOOL__", true), "{v}");
        }

        // garbage keeps the default either way
        std::env::set_var("__TP_TEST_BOOL__", "garbage");
        assert!(env_get_bool("__TP_TEST_BOOL__", true));
        assert!(!env_get_bool("__TP_TEST_BOOL__", false));

        std::env::remove_var("__TP_TEST_BOOL__");
    }
}
