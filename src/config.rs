use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::household::JoinCodePolicy;

pub const DB_ENV: &str = "CHOREBOARD_DB";
pub const LOG_ENV: &str = "CHOREBOARD_LOG";
pub const JOIN_CODE_LENGTH_ENV: &str = "CHOREBOARD_JOIN_CODE_LENGTH";
pub const JOIN_CODE_ATTEMPTS_ENV: &str = "CHOREBOARD_JOIN_CODE_ATTEMPTS";

pub const DEFAULT_LOG_FILTER: &str = "choreboard=info,sqlx=warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_filter: String,
    pub join_code: JoinCodePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup(DB_ENV).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };
        let log_filter = lookup(LOG_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let defaults = JoinCodePolicy::default();
        let join_code = JoinCodePolicy {
            length: positive(&lookup, JOIN_CODE_LENGTH_ENV)?.unwrap_or(defaults.length),
            max_attempts: positive(&lookup, JOIN_CODE_ATTEMPTS_ENV)?
                .unwrap_or(defaults.max_attempts),
            ..defaults
        };

        Ok(Self {
            db_path,
            log_filter,
            join_code,
        })
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: T = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got '{raw}'"))?;
    if value == T::default() {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(Some(value))
}

pub fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().unwrap_or(std::env::current_dir()?);
    Ok(base.join("choreboard").join("choreboard.sqlite3"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.join_code, JoinCodePolicy::default());
        assert!(config.db_path.ends_with("choreboard/choreboard.sqlite3"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            (DB_ENV, "/tmp/chores.sqlite3"),
            (LOG_ENV, "choreboard=debug"),
            (JOIN_CODE_LENGTH_ENV, "8"),
            (JOIN_CODE_ATTEMPTS_ENV, "5"),
        ]))
        .expect("config");
        assert_eq!(config.db_path, PathBuf::from("/tmp/chores.sqlite3"));
        assert_eq!(config.log_filter, "choreboard=debug");
        assert_eq!(config.join_code.length, 8);
        assert_eq!(config.join_code.max_attempts, 5);
    }

    #[test]
    fn zero_or_garbage_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[(JOIN_CODE_ATTEMPTS_ENV, "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let err = Config::from_lookup(lookup(&[(JOIN_CODE_LENGTH_ENV, "six")])).unwrap_err();
        assert!(err.to_string().contains(JOIN_CODE_LENGTH_ENV));
    }
}
