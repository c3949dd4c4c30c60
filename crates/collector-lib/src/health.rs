//! Component health tracking for the collector daemon
//!
//! Backs the liveness and readiness endpoints. The upstream component is
//! driven by consecutive failed collection cycles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive failed cycles after which the upstream is unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Component names for health tracking
pub mod components {
    /// Static metric catalog
    pub const CATALOG: &str = "catalog";
    /// Upstream REST API
    pub const UPSTREAM: &str = "upstream";
    pub const COLLECTION_LOOP: &str = "collection_loop";
}

/// Health status of a component, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Failing but still collecting
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Body of the liveness endpoint. The overall status is the worst component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared health state of the daemon
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    upstream_failures: Arc<AtomicU32>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_healthy(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }

    /// Record a successful collection cycle against the upstream
    pub async fn record_upstream_success(&self) {
        self.upstream_failures.store(0, Ordering::SeqCst);
        self.set_healthy(components::UPSTREAM).await;
    }

    /// Record a failed collection cycle against the upstream.
    ///
    /// One failure degrades the component; [`UNHEALTHY_AFTER_FAILURES`]
    /// in a row mark it unhealthy.
    pub async fn record_upstream_failure(&self, message: impl Into<String>) {
        let failures = self.upstream_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let message = format!("{} ({} consecutive failures)", message.into(), failures);
        let status = if failures >= UNHEALTHY_AFTER_FAILURES {
            ComponentStatus::Unhealthy
        } else {
            ComponentStatus::Degraded
        };

        self.set(components::UPSTREAM, status, Some(message)).await;
    }

    pub fn upstream_failures(&self) -> u32 {
        self.upstream_failures.load(Ordering::SeqCst)
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse { status, components }
    }

    /// Ready once started, until any component turns unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        if !*self.ready.read().await {
            return ReadinessResponse {
                ready: false,
                reason: Some("Collector not yet initialized".to_string()),
            };
        }

        let mut unhealthy: Vec<String> = self
            .health()
            .await
            .components
            .into_iter()
            .filter(|(_, c)| c.status == ComponentStatus::Unhealthy)
            .map(|(name, _)| name)
            .collect();
        if unhealthy.is_empty() {
            return ReadinessResponse {
                ready: true,
                reason: None,
            };
        }

        unhealthy.sort();
        ReadinessResponse {
            ready: false,
            reason: Some(format!("Unhealthy: {}", unhealthy.join(", "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_components_start_healthy() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        registry.register(components::CATALOG).await;
        registry.register(components::UPSTREAM).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), 2);
    }

    #[tokio::test]
    async fn test_single_upstream_failure_degrades() {
        let registry = HealthRegistry::new();
        registry.register(components::UPSTREAM).await;

        registry.record_upstream_failure("status=503").await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.components[components::UPSTREAM]
            .message
            .as_deref()
            .unwrap()
            .contains("1 consecutive"));
    }

    #[tokio::test]
    async fn test_consecutive_upstream_failures_become_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::CATALOG).await;
        registry.register(components::UPSTREAM).await;
        registry.set_ready(true).await;

        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry.record_upstream_failure("timeout").await;
        }

        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Unhealthy: upstream"));
    }

    #[tokio::test]
    async fn test_upstream_success_resets_failures() {
        let registry = HealthRegistry::new();
        registry.register(components::UPSTREAM).await;

        registry.record_upstream_failure("timeout").await;
        registry.record_upstream_failure("timeout").await;
        registry.record_upstream_success().await;
        assert_eq!(registry.upstream_failures(), 0);

        // Counting starts over
        registry.record_upstream_failure("timeout").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_readiness_follows_startup() {
        let registry = HealthRegistry::new();
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(readiness.reason.is_none());
    }
}
