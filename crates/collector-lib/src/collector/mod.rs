//! Family collectors
//!
//! Each metric family has a collector that groups its requests by upstream
//! call signature, fetches every distinct signature once, and maps the
//! responses back onto the requests in input order.

mod cache;
mod r#loop;
mod series;
mod summary;


pub use cache::BatchCache;
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};
pub use series::{SeriesKey, TimeSeriesCollector};
pub use summary::EntitySummaryCollector;

use crate::catalog;
use crate::error::{ClientError, CollectorError, Result};
use crate::models::{Family, MetricRequest, MetricType, ResolvedMetric};
use crate::observability::CollectorMetrics;
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Collection service for one metric family
#[async_trait]
pub trait Service: Send + Sync {
    fn family(&self) -> Family;

    /// Metric types this family advertises
    fn metric_types(&self) -> Vec<MetricType> {
        catalog::metric_types(self.family())
    }

    /// Collect the given requests, all of which belong to this family
    async fn collect_metrics(&self, requests: &[MetricRequest]) -> Result<Vec<ResolvedMetric>>;
}

/// Value of the namespace element at `index`
pub(crate) fn segment<'a>(
    request: &'a MetricRequest,
    index: usize,
    field: &'static str,
) -> Result<&'a str> {
    request
        .namespace
        .value(index)
        .ok_or_else(|| CollectorError::MalformedNamespace {
            namespace: request.namespace.to_string(),
            reason: format!("missing {} segment", field),
        })
}

/// Parse an integer segment
pub(crate) fn parse_integer<T: FromStr>(value: &str, field: &'static str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CollectorError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
}

/// Entity id of a request
pub(crate) fn entity_id(request: &MetricRequest) -> Result<i64> {
    let field = request.tags.entity.id_placeholder();
    let index = request.tags.family.entity_id_index();
    parse_integer(segment(request, index, field)?, field)
}

/// Run an upstream call under a deadline and record its outcome
pub(crate) async fn upstream_call<T, Fut>(
    operation: &'static str,
    after: Duration,
    call: Fut,
) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, ClientError>>,
{
    let metrics = CollectorMetrics::new();
    let start = Instant::now();

    let result = match tokio::time::timeout(after, call).await {
        Ok(result) => result.map_err(CollectorError::from),
        Err(_) => Err(CollectorError::Timeout { operation, after }),
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.kind(),
    };
    metrics.observe_upstream(operation, outcome, start.elapsed().as_secs_f64());

    result
}

/// Fetch one value per key with at most `concurrency` fetches in flight.
///
/// Each distinct key is fetched once, stored in a [`BatchCache`] scoped to
/// this call, and shared by every position holding that key. Permits are
/// taken in first-seen order before each task is spawned, so a limit of one
/// fetches strictly in that order. A failing task raises a flag before it
/// releases its permit; no fetch starts after that and the first error in
/// key order is returned.
pub(crate) async fn fetch_ordered<K, V, F, Fut>(
    keys: Vec<K>,
    concurrency: usize,
    fetch: F,
) -> Result<Vec<Arc<V>>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    let cache = Arc::new(BatchCache::new());
    let fetch = Arc::new(fetch);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let failed = Arc::new(AtomicBool::new(false));
    let mut scheduled = HashSet::new();
    let mut handles = Vec::new();

    for key in &keys {
        if !scheduled.insert(key.clone()) {
            continue;
        }

        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| CollectorError::Task(e.to_string()))?;
        if failed.load(Ordering::SeqCst) {
            break;
        }

        let cache = Arc::clone(&cache);
        let fetch = Arc::clone(&fetch);
        let failed = Arc::clone(&failed);
        let key = key.clone();

        handles.push(tokio::spawn(async move {
            let fetch_key = key.clone();
            let outcome = cache
                .get_or_fetch(key, move || (*fetch)(fetch_key))
                .await;
            if outcome.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
            drop(permit);
            outcome
        }));
    }

    let mut pending = handles.into_iter();
    while let Some(handle) = pending.next() {
        let outcome = handle
            .await
            .map_err(|e| CollectorError::Task(e.to_string()))
            .and_then(|outcome| outcome);

        if let Err(err) = outcome {
            pending.by_ref().for_each(|h| h.abort());
            return Err(err);
        }
    }

    tracing::debug!(
        requests = keys.len(),
        fetches = cache.fetches(),
        "Batch fetch complete"
    );

    keys.iter()
        .map(|key| {
            cache
                .get(key)
                .ok_or_else(|| CollectorError::Task("fetch was not scheduled".to_string()))
        })
        .collect()
}
