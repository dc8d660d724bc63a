use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::model::OverlapRule;

/// Knobs the engine itself needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on waiting for a property's reservation lock.
    pub lock_timeout: Duration,
    pub overlap_rule: OverlapRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            overlap_rule: OverlapRule::Inclusive,
        }
    }
}

/// Process configuration, read from `STAYLOCK_*` environment variables.
/// Missing or unparseable values fall back to defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5480,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }

        let defaults = Self::default();
        let lock_timeout = parsed::<u64>(&lookup, "STAYLOCK_LOCK_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.engine.lock_timeout);
        let overlap_rule = lookup("STAYLOCK_OVERLAP_RULE")
            .and_then(|s| OverlapRule::parse(s.trim()))
            .unwrap_or(defaults.engine.overlap_rule);

        Self {
            port: parsed(&lookup, "STAYLOCK_PORT").unwrap_or(defaults.port),
            bind: lookup("STAYLOCK_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("STAYLOCK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_connections: parsed(&lookup, "STAYLOCK_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            compact_threshold: parsed(&lookup, "STAYLOCK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parsed(&lookup, "STAYLOCK_METRICS_PORT"),
            engine: EngineConfig {
                lock_timeout,
                overlap_rule,
            },
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}
