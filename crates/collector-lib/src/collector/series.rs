//! Time series collection
//!
//! Requests address `{id}/{minutes}/{metric_name}/{value_name}/value`. A
//! metric is fetched once per `(kind, id, metric_name, minutes)` within a
//! call and its first time slice supplies the value.

use super::{entity_id, fetch_ordered, parse_integer, segment, upstream_call, Service};
use crate::client::ApmClient;
use crate::config::CollectOptions;
use crate::error::{CollectorError, Result};
use crate::models::{EntityKind, Family, MetricRequest, ResolvedMetric, SeriesResponse, SeriesWindow};
use crate::namespace::WILDCARD;
use crate::observability::CollectorMetrics;
use crate::path;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const ENTITY_ID_INDEX: usize = Family::TimeSeries.entity_id_index();
const MINUTES_INDEX: usize = ENTITY_ID_INDEX + 1;
const METRIC_NAME_INDEX: usize = ENTITY_ID_INDEX + 2;
const VALUE_NAME_INDEX: usize = ENTITY_ID_INDEX + 3;

/// Upstream call signature of a series request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub kind: EntityKind,
    pub id: i64,
    pub metric_name: String,
    /// `None` for the upstream default window
    pub minutes: Option<u32>,
}

impl SeriesKey {
    /// Parse the call signature out of a request namespace
    pub fn from_request(request: &MetricRequest) -> Result<Self> {
        let id = entity_id(request)?;

        let minutes = match segment(request, MINUTES_INDEX, "minutes")? {
            WILDCARD => None,
            value => Some(parse_integer(value, "minutes")?),
        };

        Ok(Self {
            kind: request.tags.entity,
            id,
            metric_name: segment(request, METRIC_NAME_INDEX, "metric_name")?.to_string(),
            minutes,
        })
    }

    /// Window to fetch, anchored at the current time
    pub fn window(&self) -> SeriesWindow {
        match self.minutes {
            None => SeriesWindow::Default,
            Some(minutes) => SeriesWindow::last_minutes(minutes),
        }
    }
}

pub struct TimeSeriesCollector {
    client: Arc<dyn ApmClient>,
    options: CollectOptions,
    metrics: CollectorMetrics,
}

impl TimeSeriesCollector {
    pub fn new(client: Arc<dyn ApmClient>, options: CollectOptions) -> Self {
        Self {
            client,
            options,
            metrics: CollectorMetrics::new(),
        }
    }
}

/// Resolve one request against the series fetched for its key
fn resolve(request: &MetricRequest, key: &SeriesKey, response: &SeriesResponse) -> Result<ResolvedMetric> {
    let series = match response.metrics.as_slice() {
        [series] => series,
        other => {
            return Err(CollectorError::SeriesCount {
                name: key.metric_name.clone(),
                found: other.len(),
            })
        }
    };

    if series.name != key.metric_name {
        return Err(CollectorError::SeriesNameMismatch {
            requested: key.metric_name.clone(),
            received: series.name.clone(),
        });
    }

    let slice = series
        .timeslices
        .first()
        .ok_or_else(|| CollectorError::EmptySeries {
            name: series.name.clone(),
        })?;

    let value_name = segment(request, VALUE_NAME_INDEX, "value_name")?;
    let values = slice.flatten();
    let value = path::traverse(&values, &[value_name])?;

    Ok(ResolvedMetric::from_request(request, value.clone()))
}

#[async_trait]
impl Service for TimeSeriesCollector {
    fn family(&self) -> Family {
        Family::TimeSeries
    }

    async fn collect_metrics(&self, requests: &[MetricRequest]) -> Result<Vec<ResolvedMetric>> {
        let keys = requests
            .iter()
            .map(SeriesKey::from_request)
            .collect::<Result<Vec<_>>>()?;

        let client = Arc::clone(&self.client);
        let timeout = self.options.request_timeout;
        let responses = fetch_ordered(
            keys.clone(),
            self.options.upstream_concurrency,
            move |key: SeriesKey| {
                let client = Arc::clone(&client);
                async move {
                    let names = [key.metric_name.clone()];
                    upstream_call(
                        "fetch_series",
                        timeout,
                        client.fetch_series(key.kind, key.id, &names, key.window()),
                    )
                    .await
                }
            },
        )
        .await?;

        let resolved = requests
            .iter()
            .zip(&keys)
            .zip(&responses)
            .map(|((request, key), response)| resolve(request, key, response))
            .collect::<Result<Vec<_>>>()?;

        self.metrics
            .inc_resolved(Family::TimeSeries, resolved.len() as u64);
        debug!(resolved = resolved.len(), "Time series collection complete");

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::request_for;
    use crate::config::PluginConfig;

    fn request(namespace: &str) -> MetricRequest {
        request_for(namespace, &PluginConfig::default()).unwrap()
    }

    #[test]
    fn test_key_from_default_window_request() {
        let key = tokio_test::assert_ok!(SeriesKey::from_request(&request(
            "inteleon/newrelic/metric/application/1337/*/hax/average_response_time/value",
        )));

        assert_eq!(key.kind, EntityKind::Application);
        assert_eq!(key.id, 1337);
        assert_eq!(key.metric_name, "hax");
        assert_eq!(key.minutes, None);
        assert_eq!(key.window(), SeriesWindow::Default);
    }

    #[test]
    fn test_key_from_relative_window_request() {
        let key = tokio_test::assert_ok!(SeriesKey::from_request(&request(
            "inteleon/newrelic/metric/component/31337/30/hacker/throughput/value",
        )));

        assert_eq!(key.kind, EntityKind::Component);
        assert_eq!(key.minutes, Some(30));
        assert!(matches!(key.window(), SeriesWindow::Between { .. }));
    }

    #[test]
    fn test_key_rejects_bad_minutes() {
        let err = tokio_test::assert_err!(SeriesKey::from_request(&request(
            "inteleon/newrelic/metric/application/1/soon/hax/x/value",
        )));

        assert!(matches!(
            err,
            CollectorError::InvalidIdentifier { field: "minutes", ref value } if value == "soon"
        ));
    }

    #[test]
    fn test_key_rejects_bad_id() {
        let err = SeriesKey::from_request(&request(
            "inteleon/newrelic/metric/application/abc/*/hax/x/value",
        ))
        .unwrap_err();

        assert!(matches!(
            err,
            CollectorError::InvalidIdentifier { field: "app_id", .. }
        ));
    }
}
