//! Entity summary collection
//!
//! Every request of this family reads one field out of an entity snapshot.
//! Snapshots are fetched once per `(kind, id)` within a call.

use super::{entity_id, fetch_ordered, upstream_call, Service};
use crate::client::ApmClient;
use crate::config::CollectOptions;
use crate::error::Result;
use crate::models::{EntityKind, Family, MetricRequest, ResolvedMetric};
use crate::observability::CollectorMetrics;
use crate::path;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct EntitySummaryCollector {
    client: Arc<dyn ApmClient>,
    options: CollectOptions,
    metrics: CollectorMetrics,
}

impl EntitySummaryCollector {
    pub fn new(client: Arc<dyn ApmClient>, options: CollectOptions) -> Self {
        Self {
            client,
            options,
            metrics: CollectorMetrics::new(),
        }
    }
}

/// Traversal path of a summary request. An empty catalog path means the
/// last namespace segment is itself the key.
fn traversal_path(request: &MetricRequest) -> Vec<String> {
    if request.tags.path.is_empty() {
        vec![request.namespace.last().unwrap_or_default().to_string()]
    } else {
        request.tags.path.clone()
    }
}

#[async_trait]
impl Service for EntitySummaryCollector {
    fn family(&self) -> Family {
        Family::EntitySummary
    }

    async fn collect_metrics(&self, requests: &[MetricRequest]) -> Result<Vec<ResolvedMetric>> {
        // Ids are validated up front so a bad one aborts before any fetch
        let keys = requests
            .iter()
            .map(|request| Ok((request.tags.entity, entity_id(request)?)))
            .collect::<Result<Vec<(EntityKind, i64)>>>()?;

        let client = Arc::clone(&self.client);
        let timeout = self.options.request_timeout;
        let snapshots = fetch_ordered(keys, self.options.upstream_concurrency, move |(kind, id)| {
            let client = Arc::clone(&client);
            async move { upstream_call("fetch_entity", timeout, client.fetch_entity(kind, id)).await }
        })
        .await?;

        let mut resolved = Vec::with_capacity(requests.len());
        for (request, snapshot) in requests.iter().zip(snapshots) {
            match path::traverse(&snapshot, &traversal_path(request)) {
                Ok(value) => resolved.push(ResolvedMetric::from_request(request, value.clone())),
                Err(err) => {
                    warn!(
                        namespace = %request.namespace,
                        error = %err,
                        "Skipping metric absent from entity snapshot"
                    );
                    self.metrics.inc_skipped(Family::EntitySummary);
                }
            }
        }

        self.metrics
            .inc_resolved(Family::EntitySummary, resolved.len() as u64);
        debug!(
            requested = requests.len(),
            resolved = resolved.len(),
            "Entity summary collection complete"
        );

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::request_for;
    use crate::config::PluginConfig;

    #[test]
    fn test_traversal_path_falls_back_to_last_segment() {
        let config = PluginConfig::default();

        let reporting =
            request_for("inteleon/newrelic/apm/1/show/reporting", &config).unwrap();
        assert_eq!(traversal_path(&reporting), vec!["reporting"]);

        let status =
            request_for("inteleon/newrelic/apm/1/show/health/status", &config).unwrap();
        assert_eq!(traversal_path(&status), vec!["health_status"]);
    }
}
