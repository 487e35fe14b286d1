//! Typed environment variable access, following the source's convention of
//! falling back through a chain of candidate names before giving up.

use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

pub fn required(name: &str) -> ConfigResult<String> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name.to_string()))
}

pub fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn with_default(name: &str, default: impl Into<String>) -> String {
    optional(name).unwrap_or_else(|| default.into())
}

pub fn parsed<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|err: T::Err| ConfigError::InvalidEnv {
            name: name.to_string(),
            value,
            reason: err.to_string(),
        }),
    }
}
