//! Typed environment lookups
//!
//! Unset and empty variables both read as `None`, so `FOO=` in a shell
//! profile never overrides a default.

use crate::error::{CommonError, Result};
use std::str::FromStr;

/// Read a variable, treating empty values as unset
pub fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable
///
/// `expected` describes the accepted values and ends up in the error message.
pub fn parse<T: FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match var(key) {
        Some(raw) => parse_value(key, &raw, expected).map(Some),
        None => Ok(None),
    }
}

/// Read a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`)
pub fn flag(key: &str) -> Result<Option<bool>> {
    match var(key) {
        Some(raw) => parse_bool(key, &raw).map(Some),
        None => Ok(None),
    }
}

pub fn parse_value<T: FromStr>(key: &str, raw: &str, expected: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| CommonError::invalid_value(key, raw, expected))
}

pub fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(CommonError::invalid_value(key, raw, "a boolean")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        let n: usize = parse_value("BATCH", " 25 ", "a positive integer").unwrap();
        assert_eq!(n, 25);

        let err = parse_value::<usize>("BATCH", "many", "a positive integer").unwrap_err();
        assert!(err.to_string().contains("BATCH"));
        assert!(err.to_string().contains("many"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "YES").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn test_empty_var_is_unset() {
        std::env::set_var("PROTLAKE_COMMON_TEST_EMPTY", "  ");
        assert_eq!(var("PROTLAKE_COMMON_TEST_EMPTY"), None);
        assert_eq!(parse::<usize>("PROTLAKE_COMMON_TEST_EMPTY", "n").unwrap(), None);
        std::env::remove_var("PROTLAKE_COMMON_TEST_EMPTY");
    }
}
