//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Default number of concurrent interactive executions.
const DEFAULT_INTERACTIVE_POOL_SIZE: usize = 4;

/// Default number of concurrent background executions.
const DEFAULT_BACKGROUND_POOL_SIZE: usize = 2;

/// Default seconds between janitor sweeps.
const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 300;

/// Default retention for finished records, in seconds. Zero means finished
/// records are eligible for removal on the next sweep.
const DEFAULT_RETENTION_SECS: u64 = 0;

/// Runtime configuration for the execution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the interactive worker pool.
    pub interactive_pool_size: usize,
    /// Capacity of the background worker pool.
    pub background_pool_size: usize,
    /// Interval between stale-record janitor sweeps.
    pub janitor_interval: Duration,
    /// How long finished records are kept before the janitor removes them.
    pub retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interactive_pool_size: DEFAULT_INTERACTIVE_POOL_SIZE,
            background_pool_size: DEFAULT_BACKGROUND_POOL_SIZE,
            janitor_interval: Duration::from_secs(DEFAULT_JANITOR_INTERVAL_SECS),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// | Variable                       | Default |
    /// |--------------------------------|---------|
    /// | `TELLUS_INTERACTIVE_POOL_SIZE` | `4`     |
    /// | `TELLUS_BACKGROUND_POOL_SIZE`  | `2`     |
    /// | `TELLUS_JANITOR_INTERVAL_SECS` | `300`   |
    /// | `TELLUS_RETENTION_SECS`        | `0`     |
    pub fn from_env() -> Self {
        Self {
            interactive_pool_size: env_parse(
                "TELLUS_INTERACTIVE_POOL_SIZE",
                DEFAULT_INTERACTIVE_POOL_SIZE,
            ),
            background_pool_size: env_parse(
                "TELLUS_BACKGROUND_POOL_SIZE",
                DEFAULT_BACKGROUND_POOL_SIZE,
            ),
            janitor_interval: Duration::from_secs(env_parse(
                "TELLUS_JANITOR_INTERVAL_SECS",
                DEFAULT_JANITOR_INTERVAL_SECS,
            )),
            retention: Duration::from_secs(env_parse(
                "TELLUS_RETENTION_SECS",
                DEFAULT_RETENTION_SECS,
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.interactive_pool_size, 4);
        assert_eq!(config.background_pool_size, 2);
        assert_eq!(config.janitor_interval, Duration::from_secs(300));
        assert_eq!(config.retention, Duration::from_secs(0));
    }

    #[test]
    fn env_parse_ignores_garbage() {
        std::env::set_var("TELLUS_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_parse("TELLUS_TEST_GARBAGE", 7usize), 7);
        std::env::remove_var("TELLUS_TEST_GARBAGE");
    }
}
