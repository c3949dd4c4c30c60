//! newrelic-collector - periodic APM metrics collector
//!
//! Collects a configured set of metric namespaces on an interval and
//! serves health, readiness, Prometheus metrics and the metric catalog.

use anyhow::{Context, Result};
use collector_lib::{
    collector::CollectionLoopBuilder,
    health::{components, HealthRegistry},
    observability::{CollectorMetrics, StructuredLogger},
    Collector,
};
use newrelic_collector::{api, config::CollectorConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting newrelic-collector");

    let config = CollectorConfig::load()?;
    let requests = config.requests()?;
    info!(
        instance = %config.instance,
        namespaces = requests.len(),
        base_url = %config.base_url,
        "Collector configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CATALOG).await;
    health_registry.register(components::UPSTREAM).await;
    health_registry.register(components::COLLECTION_LOOP).await;

    let metrics = CollectorMetrics::new();

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(COLLECTOR_VERSION, requests.len());

    let collector = Arc::new(
        Collector::builder()
            .options(config.collect_options())
            .build(),
    );

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        collector.metric_types(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (collection_loop, mut metrics_rx) = CollectionLoopBuilder::new()
        .collector(collector)
        .requests(requests)
        .health(health_registry.clone())
        .logger(logger.clone())
        .interval(Duration::from_secs(config.interval_secs))
        .jitter(Duration::from_secs(config.jitter_secs))
        .build()
        .context("Failed to build collection loop")?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(collection_loop.run(shutdown_rx));

    // Resolved metrics are emitted as structured log records
    let sink_handle = tokio::spawn(async move {
        while let Some(metric) = metrics_rx.recv().await {
            debug!(
                event = "metric_resolved",
                namespace = %metric.namespace,
                data = %metric.data,
                unit = %metric.unit,
                timestamp = %metric.timestamp.to_rfc3339(),
                "Resolved metric"
            );
        }
    });

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    loop_handle.await.context("Collection loop task failed")?;
    sink_handle.await.context("Metric sink task failed")?;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
