//! Plugin configuration policy and collection tuning

use crate::error::{CollectorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Key of the upstream API credential
pub const API_KEY: &str = "api_key";

/// Config-policy namespace the credential is declared under
pub const POLICY_NAMESPACE: [&str; 2] = ["inteleon", "newrelic"];

pub const DEFAULT_BASE_URL: &str = "https://api.newrelic.com";

/// Configuration values handed in by the host with every request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig(BTreeMap<String, Value>);

impl PluginConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.insert(API_KEY, Value::String(api_key.into()));
        config
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// String value of `key`; empty strings count as absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn api_key(&self) -> Result<&str> {
        self.get_str(API_KEY)
            .ok_or_else(|| CollectorError::ConfigurationMissing {
                key: API_KEY.to_string(),
            })
    }
}

/// A single string option the plugin declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringRule {
    pub namespace: Vec<String>,
    pub key: String,
    pub required: bool,
}

/// Options the plugin accepts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigPolicy {
    pub rules: Vec<StringRule>,
}

impl ConfigPolicy {
    /// The policy of this plugin: one required credential
    pub fn collector() -> Self {
        let mut policy = Self::default();
        policy.add_string_rule(&POLICY_NAMESPACE, API_KEY, true);
        policy
    }

    pub fn add_string_rule(&mut self, namespace: &[&str], key: &str, required: bool) {
        self.rules.push(StringRule {
            namespace: namespace.iter().map(|s| s.to_string()).collect(),
            key: key.to_string(),
            required,
        });
    }

    /// Check every required rule is present in `config`
    pub fn validate(&self, config: &PluginConfig) -> Result<()> {
        match self
            .rules
            .iter()
            .find(|rule| rule.required && config.get_str(&rule.key).is_none())
        {
            Some(rule) => Err(CollectorError::ConfigurationMissing {
                key: rule.key.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Tuning for collection calls
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Maximum upstream calls in flight per family (default: 4)
    pub upstream_concurrency: usize,
    /// Deadline for a single upstream call (default: 30 seconds)
    pub request_timeout: Duration,
    /// Base URL of the REST API
    pub base_url: String,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            upstream_concurrency: 4,
            request_timeout: Duration::from_secs(30),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_declares_required_api_key() {
        let policy = ConfigPolicy::collector();
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].namespace, vec!["inteleon", "newrelic"]);
        assert_eq!(policy.rules[0].key, "api_key");
        assert!(policy.rules[0].required);
    }

    #[test]
    fn test_validate_missing_credential() {
        let policy = ConfigPolicy::collector();

        let err = policy.validate(&PluginConfig::default()).unwrap_err();
        assert!(matches!(err, CollectorError::ConfigurationMissing { ref key } if key == "api_key"));

        // Empty string is as good as missing
        let err = policy.validate(&PluginConfig::with_api_key("")).unwrap_err();
        assert_eq!(err.kind(), "configuration_missing");

        assert!(policy.validate(&PluginConfig::with_api_key("k")).is_ok());
    }

    #[test]
    fn test_non_string_credential_is_missing() {
        let mut config = PluginConfig::default();
        config.insert(API_KEY, Value::Bool(true));
        assert!(config.api_key().is_err());
    }

    #[test]
    fn test_collect_options_default() {
        let options = CollectOptions::default();
        assert_eq!(options.upstream_concurrency, 4);
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert_eq!(options.base_url, "https://api.newrelic.com");
    }
}
