use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ConfigError;

/// Source of raw configuration values, keyed by environment variable name.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Value of `key`, treating blank values as unset.
pub(crate) fn optional_env(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_string_env(env: &dyn EnvSource, key: &str, default: &str) -> String {
    optional_env(env, key).unwrap_or_else(|| default.to_string())
}

/// Parse `key` with `FromStr`, falling back to `default` when unset.
pub(crate) fn parse_env<T>(env: &dyn EnvSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(env, key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

pub(crate) fn parse_csv_env(env: &dyn EnvSource, key: &str) -> Vec<String> {
    optional_env(env, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
