//! Collector daemon configuration

use anyhow::{Context, Result};
use collector_lib::catalog::request_for;
use collector_lib::config::{CollectOptions, ConfigPolicy, PluginConfig, DEFAULT_BASE_URL};
use collector_lib::MetricRequest;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional config file
pub const CONFIG_FILE_VAR: &str = "COLLECTOR_CONFIG_FILE";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Upstream API credential
    #[serde(default)]
    pub api_key: Option<String>,

    /// Concrete metric namespaces collected every cycle
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Collection interval in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum jitter added to the interval, in seconds
    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_upstream_concurrency")]
    pub upstream_concurrency: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "newrelic-collector".to_string())
}

fn default_interval() -> u64 {
    60
}

fn default_jitter() -> u64 {
    5
}

fn default_api_port() -> u16 {
    8080
}

fn default_upstream_concurrency() -> usize {
    CollectOptions::default().upstream_concurrency
}

fn default_request_timeout() -> u64 {
    CollectOptions::default().request_timeout.as_secs()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl CollectorConfig {
    /// Load configuration from an optional file and the environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_FILE_VAR) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("COLLECTOR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("namespaces"),
            )
            .build()
            .context("Failed to read collector configuration")?;

        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Invalid collector configuration")
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            upstream_concurrency: self.upstream_concurrency,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            base_url: self.base_url.clone(),
        }
    }

    /// Plugin configuration handed to every request
    pub fn plugin_config(&self) -> Result<PluginConfig> {
        let config = match &self.api_key {
            Some(api_key) => PluginConfig::with_api_key(api_key.clone()),
            None => PluginConfig::default(),
        };
        ConfigPolicy::collector()
            .validate(&config)
            .context("COLLECTOR_API_KEY must be set")?;

        Ok(config)
    }

    /// Turn the configured namespaces into requests
    pub fn requests(&self) -> Result<Vec<MetricRequest>> {
        let config = self.plugin_config()?;

        if self.namespaces.is_empty() {
            anyhow::bail!("No namespaces configured, set COLLECTOR_NAMESPACES");
        }

        self.namespaces
            .iter()
            .map(|namespace| {
                request_for(namespace.trim(), &config)
                    .with_context(|| format!("Unknown metric namespace `{}`", namespace))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(overrides: &[(&str, &str)], namespaces: Vec<&str>) -> CollectorConfig {
        let mut builder = config::Config::builder()
            .set_override("namespaces", namespaces)
            .unwrap();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        CollectorConfig::from_config(builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = load(&[], vec![]);

        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.upstream_concurrency, 4);
        assert_eq!(config.base_url, "https://api.newrelic.com");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_collect_options() {
        let config = load(
            &[("upstream_concurrency", "2"), ("request_timeout_secs", "5")],
            vec![],
        );
        let options = config.collect_options();

        assert_eq!(options.upstream_concurrency, 2);
        assert_eq!(options.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_requests_from_namespaces() {
        let config = load(
            &[("api_key", "secret")],
            vec![
                "inteleon/newrelic/apm/1337/show/reporting",
                "inteleon/newrelic/metric/component/31337/*/hacker/throughput/value",
            ],
        );

        let requests = config.requests().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].config.api_key().unwrap(), "secret");
    }

    #[test]
    fn test_missing_api_key() {
        let config = load(
            &[],
            vec!["inteleon/newrelic/apm/1337/show/reporting"],
        );
        assert!(config.requests().is_err());
    }

    #[test]
    fn test_unknown_namespace() {
        let config = load(&[("api_key", "secret")], vec!["inteleon/newrelic/apm/nope"]);

        let err = config.requests().unwrap_err();
        assert!(err.to_string().contains("inteleon/newrelic/apm/nope"));
    }
}
