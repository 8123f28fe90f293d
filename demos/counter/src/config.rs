//! Configuration management for the counter.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A value that is present but does not parse is ignored in favour of the
//! default.

use crate::{CounterValue, DEFAULT_TICK_BOUND};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Counter configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    /// Time between ticks while the counter is observed (`COUNTER_TICK_PERIOD_MS`)
    pub tick_period: Duration,
    /// Exclusive upper bound of a tick increment (`COUNTER_TICK_BOUND`)
    pub tick_bound: CounterValue,
    /// Whether the ticker runs at all (`COUNTER_TICKER_ENABLED`)
    pub ticker_enabled: bool,
    /// Snapshot file (`COUNTER_CACHE_PATH`)
    pub cache_path: PathBuf,
    /// Periodic save interval, `None` when disabled (`COUNTER_SAVE_PERIOD_MS`, 0 disables)
    pub save_period: Option<Duration>,
    /// Save when the last observer goes away (`COUNTER_SAVE_ON_UNSUBSCRIBE`)
    pub save_on_unsubscribe: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1000),
            tick_bound: DEFAULT_TICK_BOUND,
            ticker_enabled: true,
            cache_path: PathBuf::from(".cache/counter.json"),
            save_period: Some(Duration::from_millis(2000)),
            save_on_unsubscribe: true,
        }
    }
}

impl CounterConfig {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Keys are the environment variable names listed on each field.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tick_period = parse::<u64>(&lookup, "COUNTER_TICK_PERIOD_MS")
            .filter(|ms| *ms > 0)
            .map_or(defaults.tick_period, Duration::from_millis);
        let tick_bound = parse::<CounterValue>(&lookup, "COUNTER_TICK_BOUND")
            .filter(|bound| *bound > 0)
            .unwrap_or(defaults.tick_bound);
        let save_period = match parse::<u64>(&lookup, "COUNTER_SAVE_PERIOD_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.save_period,
        };

        Self {
            tick_period,
            tick_bound,
            ticker_enabled: parse_flag(&lookup, "COUNTER_TICKER_ENABLED").unwrap_or(defaults.ticker_enabled),
            cache_path: lookup("COUNTER_CACHE_PATH")
                .filter(|path| !path.trim().is_empty())
                .map_or(defaults.cache_path, PathBuf::from),
            save_period,
            save_on_unsubscribe: parse_flag(&lookup, "COUNTER_SAVE_ON_UNSUBSCRIBE")
                .unwrap_or(defaults.save_on_unsubscribe),
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
    }
    parsed
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration flag");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(CounterConfig::from_lookup(|_| None), CounterConfig::default());
    }

    #[test]
    fn test_reads_every_key() {
        let config = CounterConfig::from_lookup(lookup_from(&[
            ("COUNTER_TICK_PERIOD_MS", "250"),
            ("COUNTER_TICK_BOUND", "10"),
            ("COUNTER_TICKER_ENABLED", "false"),
            ("COUNTER_CACHE_PATH", "/tmp/counter-state.json"),
            ("COUNTER_SAVE_PERIOD_MS", "500"),
            ("COUNTER_SAVE_ON_UNSUBSCRIBE", "no"),
        ]));

        assert_eq!(config.tick_period, Duration::from_millis(250));
        assert_eq!(config.tick_bound, 10);
        assert!(!config.ticker_enabled);
        assert_eq!(config.cache_path, PathBuf::from("/tmp/counter-state.json"));
        assert_eq!(config.save_period, Some(Duration::from_millis(500)));
        assert!(!config.save_on_unsubscribe);
    }

    #[test]
    fn test_zero_save_period_disables_periodic_saves() {
        let config = CounterConfig::from_lookup(lookup_from(&[("COUNTER_SAVE_PERIOD_MS", "0")]));
        assert_eq!(config.save_period, None);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = CounterConfig::from_lookup(lookup_from(&[
            ("COUNTER_TICK_PERIOD_MS", "soon"),
            ("COUNTER_TICK_BOUND", "-5"),
            ("COUNTER_TICKER_ENABLED", "maybe"),
            ("COUNTER_CACHE_PATH", "  "),
            ("COUNTER_SAVE_PERIOD_MS", "1.5"),
        ]));
        assert_eq!(config, CounterConfig::default());
    }
}
