//! Periodic collection loop
//!
//! Collects a fixed set of requests through the [`Collector`] facade on a
//! jittered interval and forwards every resolved metric on a channel.

use crate::facade::Collector;
use crate::health::{components, HealthRegistry};
use crate::models::{MetricRequest, ResolvedMetric};
use crate::observability::StructuredLogger;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Base collection interval (default: 60 seconds)
    pub interval: Duration,
    /// Maximum jitter to add to interval (default: 5 seconds)
    pub jitter: Duration,
    /// Channel buffer size for resolved metrics
    pub buffer_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            jitter: Duration::from_secs(5),
            buffer_size: 1000,
        }
    }
}

/// Outcome of one collection cycle
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CycleResults {
    pub resolved: usize,
    pub failed: bool,
}

pub struct CollectionLoop {
    collector: Arc<Collector>,
    requests: Vec<MetricRequest>,
    config: CollectionConfig,
    metrics_tx: mpsc::Sender<ResolvedMetric>,
    health: Option<HealthRegistry>,
    logger: StructuredLogger,
}

impl CollectionLoop {
    pub fn new(
        collector: Arc<Collector>,
        requests: Vec<MetricRequest>,
        config: CollectionConfig,
    ) -> (Self, mpsc::Receiver<ResolvedMetric>) {
        let (metrics_tx, metrics_rx) = mpsc::channel(config.buffer_size.max(1));

        let loop_instance = Self {
            collector,
            requests,
            config,
            metrics_tx,
            health: None,
            logger: StructuredLogger::new("collector"),
        };

        (loop_instance, metrics_rx)
    }

    /// Run until a shutdown signal arrives. The first cycle starts immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            requests = self.requests.len(),
            "Starting collection loop"
        );

        if let Some(health) = &self.health {
            health.set_healthy(components::COLLECTION_LOOP).await;
        }

        let mut next = Instant::now();
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next) => {
                    let results = self.collect_once().await;
                    cycles += 1;
                    debug!(cycle = cycles, resolved = results.resolved, failed = results.failed, "Cycle finished");

                    next = Instant::now() + self.current_interval();
                }
                _ = shutdown.recv() => {
                    info!(cycles = cycles, "Shutting down collection loop");
                    break;
                }
            }
        }

        if let Some(health) = &self.health {
            health
                .set_degraded(components::COLLECTION_LOOP, "Collection loop stopped")
                .await;
        }
    }

    /// Interval to the next cycle including jitter
    fn current_interval(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }

    /// Collect every request once and forward the results
    pub(crate) async fn collect_once(&self) -> CycleResults {
        let start = Instant::now();

        match self.collector.collect_metrics(&self.requests).await {
            Ok(resolved) => {
                let count = resolved.len();
                for metric in resolved {
                    if let Err(e) = self.metrics_tx.send(metric).await {
                        warn!(error = %e, "Failed to send metric to channel");
                        break;
                    }
                }

                self.logger.log_cycle_complete(
                    self.requests.len(),
                    count,
                    start.elapsed().as_millis(),
                );
                if let Some(health) = &self.health {
                    health.record_upstream_success().await;
                }

                CycleResults {
                    resolved: count,
                    failed: false,
                }
            }
            Err(e) => {
                self.logger
                    .log_cycle_failed(self.requests.len(), e.kind(), &e.to_string());
                if let Some(health) = &self.health {
                    health.record_upstream_failure(e.to_string()).await;
                }

                CycleResults {
                    resolved: 0,
                    failed: true,
                }
            }
        }
    }
}

/// Generate a random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    // Time-seeded; spreading start times does not need a real RNG
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    collector: Option<Arc<Collector>>,
    requests: Vec<MetricRequest>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            collector: None,
            requests: Vec::new(),
            health: None,
            logger: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn collector(mut self, collector: Arc<Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Requests collected on every cycle
    pub fn requests(mut self, requests: Vec<MetricRequest>) -> Self {
        self.requests = requests;
        self
    }

    /// Report cycle outcomes to a health registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<(CollectionLoop, mpsc::Receiver<ResolvedMetric>)> {
        let collector = self
            .collector
            .ok_or_else(|| anyhow::anyhow!("Collector is required"))?;
        if self.requests.is_empty() {
            anyhow::bail!("At least one request is required");
        }

        let (mut collection_loop, rx) = CollectionLoop::new(collector, self.requests, self.config);
        collection_loop.health = self.health;
        if let Some(logger) = self.logger {
            collection_loop.logger = logger;
        }

        Ok((collection_loop, rx))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::request_for;
    use crate::collector::tests::StubClient;
    use crate::config::PluginConfig;
    use crate::health::ComponentStatus;
    use serde_json::json;

    fn requests() -> Vec<MetricRequest> {
        let config = PluginConfig::with_api_key("secret");
        vec![
            request_for("inteleon/newrelic/apm/1337/show/health/status", &config).unwrap(),
            request_for("inteleon/newrelic/apm/1337/show/reporting", &config).unwrap(),
        ]
    }

    fn collector(client: StubClient) -> Arc<Collector> {
        Arc::new(Collector::builder().client(Arc::new(client)).build())
    }

    #[test]
    fn test_collection_config_default() {
        let config = CollectionConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.jitter, Duration::from_secs(5));
    }

    #[test]
    fn test_rand_jitter() {
        assert!(rand_jitter(1000) < 1000);
        assert_eq!(rand_jitter(0), 0);
    }

    #[test]
    fn test_builder_requires_collector_and_requests() {
        assert!(CollectionLoopBuilder::new().requests(requests()).build().is_err());

        let collector = collector(StubClient::new());
        assert!(CollectionLoopBuilder::new().collector(collector).build().is_err());
    }

    #[tokio::test]
    async fn test_collect_once_forwards_metrics() {
        let client = StubClient::new().with_entity(
            1337,
            json!({"health_status": "green", "reporting": true}),
        );
        let health = HealthRegistry::new();

        let (collection_loop, mut rx) = CollectionLoopBuilder::new()
            .collector(collector(client))
            .requests(requests())
            .health(health.clone())
            .build()
            .unwrap();

        let results = collection_loop.collect_once().await;
        assert_eq!(results, CycleResults { resolved: 2, failed: false });

        assert_eq!(rx.try_recv().unwrap().data, json!("green"));
        assert_eq!(rx.try_recv().unwrap().data, json!(true));

        let status = health.health().await.components[components::UPSTREAM].status;
        assert_eq!(status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_failed_cycles_degrade_upstream_health() {
        // No entity registered: every fetch answers 404
        let health = HealthRegistry::new();
        let (collection_loop, mut rx) = CollectionLoopBuilder::new()
            .collector(collector(StubClient::new()))
            .requests(requests())
            .health(health.clone())
            .build()
            .unwrap();

        let results = collection_loop.collect_once().await;
        assert!(results.failed);
        assert!(rx.try_recv().is_err());
        assert_eq!(health.health().await.status, ComponentStatus::Degraded);

        collection_loop.collect_once().await;
        collection_loop.collect_once().await;
        assert_eq!(health.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let client = StubClient::new().with_entity(
            1337,
            json!({"health_status": "green", "reporting": true}),
        );
        let (collection_loop, mut rx) = CollectionLoopBuilder::new()
            .collector(collector(client))
            .requests(requests())
            .interval(Duration::from_secs(3600))
            .jitter(Duration::ZERO)
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(collection_loop.run(shutdown_rx));

        // First cycle runs immediately
        let first = rx.recv().await.unwrap();
        assert_eq!(first.data, json!("green"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
