/**
 * Configuration constants and runtime settings for the aggregation layer
 */
use std::env;
use tracing::warn;

/// Default number of items on one page when the caller asks for pagination without a size
pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

/// Maximum number of concurrent metric requests issued for one response
pub const DEFAULT_METRIC_CONCURRENCY: usize = 8;

/// Number of samples kept per pod in the metric history window
pub const MAX_METRIC_SAMPLES: usize = 15;

/// Maximum age of a metric sample in seconds before it is pruned
pub const MAX_METRIC_SAMPLE_AGE_SECS: i64 = 900; // 15 minutes

/// Environment variable names
pub const ENV_METRICS_ENABLED: &str = "NAVIDASH_METRICS_ENABLED";
pub const ENV_METRIC_CONCURRENCY: &str = "NAVIDASH_METRIC_CONCURRENCY";
pub const ENV_USER_AGENT: &str = "NAVIDASH_USER_AGENT";

/// Runtime settings shared by every view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Attach metrics from the metrics server; when false the metric source is absent
    pub metrics_enabled: bool,
    /// Fan-out width for metric requests
    pub metric_concurrency: usize,
    /// User agent sent with every cluster api call
    pub user_agent: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metric_concurrency: DEFAULT_METRIC_CONCURRENCY,
            user_agent: crate::k8s::USER_AGENT.to_string(),
        }
    }
}

impl DashboardConfig {
    /// Defaults overridden by `NAVIDASH_*` environment variables.
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_METRICS_ENABLED) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.metrics_enabled = true,
                "0" | "false" | "no" | "off" => config.metrics_enabled = false,
                other => warn!("Ignoring {}={}", ENV_METRICS_ENABLED, other),
            }
        }

        if let Some(raw) = lookup(ENV_METRIC_CONCURRENCY) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.metric_concurrency = n,
                _ => warn!("Ignoring {}={}", ENV_METRIC_CONCURRENCY, raw),
            }
        }

        if let Some(agent) = lookup(ENV_USER_AGENT) {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }

        config
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_ITEMS_PER_PAGE > 0, "DEFAULT_ITEMS_PER_PAGE must be greater than 0");
    assert!(DEFAULT_METRIC_CONCURRENCY > 0, "DEFAULT_METRIC_CONCURRENCY must be greater than 0");
    assert!(MAX_METRIC_SAMPLES > 0, "MAX_METRIC_SAMPLES must be greater than 0");
    assert!(MAX_METRIC_SAMPLE_AGE_SECS > 0, "MAX_METRIC_SAMPLE_AGE_SECS must be greater than 0");
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = DashboardConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, DashboardConfig::default());
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = DashboardConfig::from_lookup(lookup_from(&[
            (ENV_METRICS_ENABLED, "false"),
            (ENV_METRIC_CONCURRENCY, "3"),
            (ENV_USER_AGENT, "custom/1.0"),
        ]));
        assert!(!config.metrics_enabled);
        assert_eq!(config.metric_concurrency, 3);
        assert_eq!(config.user_agent, "custom/1.0");
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = DashboardConfig::from_lookup(lookup_from(&[
            (ENV_METRICS_ENABLED, "maybe"),
            (ENV_METRIC_CONCURRENCY, "0"),
        ]));
        assert!(config.metrics_enabled);
        assert_eq!(config.metric_concurrency, DEFAULT_METRIC_CONCURRENCY);
    }
}
