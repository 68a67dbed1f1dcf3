//! Engine configuration.
//!
//! The cadence, budget, and threshold values mirror the production
//! defaults of the analytics backend; all of them are overridable via
//! environment variables.

use std::time::Duration;

/// Tunable engine parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum bounding extent of a zone polygon, per side, in pixels
    /// (default: `10`).
    pub min_zone_extent_px: f64,
    /// Cadence of the live capture/detect loop (default: `300 ms`).
    pub live_sample_interval: Duration,
    /// Delay between job status polls (default: `5 s`).
    pub job_poll_interval: Duration,
    /// Maximum number of job status polls before the optimistic
    /// completion fallback kicks in (default: `60`, ≈5 minutes).
    pub job_poll_max_attempts: u32,
    /// How many detection frames behind the cursor the synchronizer
    /// searches (default: `5`).
    pub sync_window_behind: usize,
    /// How many detection frames at/ahead of the cursor the
    /// synchronizer searches (default: `10`).
    pub sync_window_ahead: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zone_extent_px: 10.0,
            live_sample_interval: Duration::from_millis(300),
            job_poll_interval: Duration::from_secs(5),
            job_poll_max_attempts: 60,
            sync_window_behind: 5,
            sync_window_ahead: 10,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `MIN_ZONE_EXTENT_PX`       | `10`    |
    /// | `LIVE_SAMPLE_INTERVAL_MS`  | `300`   |
    /// | `JOB_POLL_INTERVAL_SECS`   | `5`     |
    /// | `JOB_POLL_MAX_ATTEMPTS`    | `60`    |
    /// | `SYNC_WINDOW_BEHIND`       | `5`     |
    /// | `SYNC_WINDOW_AHEAD`        | `10`    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            min_zone_extent_px: env_parse("MIN_ZONE_EXTENT_PX", defaults.min_zone_extent_px),
            live_sample_interval: Duration::from_millis(env_parse(
                "LIVE_SAMPLE_INTERVAL_MS",
                defaults.live_sample_interval.as_millis() as u64,
            )),
            job_poll_interval: Duration::from_secs(env_parse(
                "JOB_POLL_INTERVAL_SECS",
                defaults.job_poll_interval.as_secs(),
            )),
            job_poll_max_attempts: env_parse(
                "JOB_POLL_MAX_ATTEMPTS",
                defaults.job_poll_max_attempts,
            ),
            sync_window_behind: env_parse("SYNC_WINDOW_BEHIND", defaults.sync_window_behind),
            sync_window_ahead: env_parse("SYNC_WINDOW_AHEAD", defaults.sync_window_ahead),
        }
    }
}

/// Parse an env var, falling back to the default when unset or
/// malformed (a bad override should not take the engine down).
fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var, raw = %raw, "Ignoring unparseable override");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_behaviour() {
        let config = EngineConfig::default();
        assert_eq!(config.min_zone_extent_px, 10.0);
        assert_eq!(config.live_sample_interval, Duration::from_millis(300));
        assert_eq!(config.job_poll_interval, Duration::from_secs(5));
        assert_eq!(config.job_poll_max_attempts, 60);
        assert_eq!(config.sync_window_behind, 5);
        assert_eq!(config.sync_window_ahead, 10);
    }
}
