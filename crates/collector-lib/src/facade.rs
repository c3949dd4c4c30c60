//! Collector facade
//!
//! Entry point the host talks to. Advertises the catalog, declares the
//! configuration policy, and routes each collection call to the family
//! collectors.

use crate::catalog;
use crate::client::{ApmClient, HttpApmClient};
use crate::collector::{EntitySummaryCollector, Service, TimeSeriesCollector};
use crate::config::{CollectOptions, ConfigPolicy};
use crate::error::{ClientError, CollectorError, Result};
use crate::models::{Family, MetricRequest, MetricType, ResolvedMetric};
use crate::namespace::FAMILY_INDEX;
use crate::observability::CollectorMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

type ClientResult = std::result::Result<Arc<dyn ApmClient>, ClientError>;

/// Builds the upstream client for a collection call from its API key
pub type ClientFactory = Arc<dyn Fn(&str, &CollectOptions) -> ClientResult + Send + Sync>;

fn http_client_factory() -> ClientFactory {
    Arc::new(|api_key: &str, options: &CollectOptions| -> ClientResult {
        Ok(Arc::new(HttpApmClient::new(api_key, options)?))
    })
}

pub struct Collector {
    factory: ClientFactory,
    options: CollectOptions,
    metrics: CollectorMetrics,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    /// Collector talking to the REST API with default options
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::new()
    }

    pub fn options(&self) -> &CollectOptions {
        &self.options
    }

    /// Configuration the host must supply with every request
    pub fn config_policy(&self) -> ConfigPolicy {
        ConfigPolicy::collector()
    }

    /// Every advertised metric type, families in declaration order
    pub fn metric_types(&self) -> Vec<MetricType> {
        catalog::all_metric_types()
    }

    /// Collect a batch of requests.
    ///
    /// The credential is read from the first request's config. Requests
    /// outside the root prefix, or with an unknown family segment, are
    /// ignored. Output is the EntitySummary results followed by the
    /// TimeSeries results, each in input order.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub async fn collect_metrics(&self, requests: &[MetricRequest]) -> Result<Vec<ResolvedMetric>> {
        let start = Instant::now();
        let result = self.collect(requests).await;

        self.metrics
            .observe_cycle_latency(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            self.metrics.inc_collection_error(err.kind());
        }

        result
    }

    async fn collect(&self, requests: &[MetricRequest]) -> Result<Vec<ResolvedMetric>> {
        let first = requests.first().ok_or(CollectorError::EmptyRequest)?;
        let api_key = first.config.api_key()?;
        let client = (self.factory)(api_key, &self.options)?;

        let mut summary = Vec::new();
        let mut series = Vec::new();
        for request in requests.iter().filter(|r| r.namespace.has_root_prefix()) {
            match request
                .namespace
                .value(FAMILY_INDEX)
                .and_then(Family::from_literal)
            {
                Some(Family::EntitySummary) => summary.push(request.clone()),
                Some(Family::TimeSeries) => series.push(request.clone()),
                None => debug!(namespace = %request.namespace, "Ignoring request of unknown family"),
            }
        }

        debug!(
            entity_summary = summary.len(),
            time_series = series.len(),
            "Partitioned requests by family"
        );

        let mut resolved = Vec::with_capacity(summary.len() + series.len());
        if !summary.is_empty() {
            let collector = EntitySummaryCollector::new(Arc::clone(&client), self.options.clone());
            resolved.extend(collector.collect_metrics(&summary).await?);
        }
        if !series.is_empty() {
            let collector = TimeSeriesCollector::new(client, self.options.clone());
            resolved.extend(collector.collect_metrics(&series).await?);
        }

        Ok(resolved)
    }
}

/// Builder for [`Collector`]
pub struct CollectorBuilder {
    factory: Option<ClientFactory>,
    options: CollectOptions,
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self {
            factory: None,
            options: CollectOptions::default(),
        }
    }

    /// Set all collection options at once
    pub fn options(mut self, options: CollectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn upstream_concurrency(mut self, limit: usize) -> Self {
        self.options.upstream_concurrency = limit;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = base_url.into();
        self
    }

    /// Build upstream clients with `factory` instead of the HTTP client
    pub fn client_factory(mut self, factory: ClientFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use one client for every call, whatever the credential
    pub fn client(self, client: Arc<dyn ApmClient>) -> Self {
        self.client_factory(Arc::new(move |_: &str, _: &CollectOptions| -> ClientResult {
            Ok(Arc::clone(&client))
        }))
    }

    pub fn build(self) -> Collector {
        Collector {
            factory: self.factory.unwrap_or_else(http_client_factory),
            options: self.options,
            metrics: CollectorMetrics::new(),
        }
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
