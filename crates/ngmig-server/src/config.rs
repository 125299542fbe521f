//! Environment-driven configuration.
//!
//! - `NGMIG_DB_PATH`: SQLite database file path (default: "ngmig.db")
//! - `NGMIG_TASK_WORKERS`: concurrent task bodies (default: 4)
//! - `NGMIG_TASK_DEDUP_TTL_SECS`: how long a submission blocks an identical
//!   one for the same account (default: 600)

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_DB_PATH: &str = "ngmig.db";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_MAX_PENDING: u64 = 10_000;

/// Worker pool and dedup cache settings for [`AsyncTaskHandler`](crate::tasks::AsyncTaskHandler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandlerConfig {
    pub workers: usize,
    pub dedup_ttl: Duration,
    /// Capacity of the dedup cache.
    pub max_pending: u64,
}

impl Default for TaskHandlerConfig {
    fn default() -> Self {
        TaskHandlerConfig {
            workers: DEFAULT_WORKERS,
            dedup_ttl: DEFAULT_DEDUP_TTL,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: String,
    pub tasks: TaskHandlerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: DEFAULT_DB_PATH.to_string(),
            tasks: TaskHandlerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; malformed numbers fall back to
    /// the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("NGMIG_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let workers = parse_or("NGMIG_TASK_WORKERS", &lookup, DEFAULT_WORKERS).max(1);
        let ttl_secs = parse_or(
            "NGMIG_TASK_DEDUP_TTL_SECS",
            &lookup,
            DEFAULT_DEDUP_TTL.as_secs(),
        );
        ServerConfig {
            db_path,
            tasks: TaskHandlerConfig {
                workers,
                dedup_ttl: Duration::from_secs(ttl_secs),
                max_pending: DEFAULT_MAX_PENDING,
            },
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid value, using default");
            default
        }),
    }
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
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.tasks.dedup_ttl, Duration::from_secs(600));
    }

    #[test]
    fn overrides_and_bad_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NGMIG_DB_PATH", "/tmp/x.db"),
            ("NGMIG_TASK_WORKERS", "0"),
            ("NGMIG_TASK_DEDUP_TTL_SECS", "ten"),
        ]));
        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.tasks.workers, 1);
        assert_eq!(config.tasks.dedup_ttl, DEFAULT_DEDUP_TTL);
    }
}
