//! One-shot metric collection

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use collector_lib::catalog::request_for;
use collector_lib::{Collector, MetricRequest, PluginConfig, ResolvedMetric};
use tabled::Tabled;

use crate::output::{format_value, print_info, print_table, print_warning, OutputFormat};

/// Row for the collected metrics table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

impl From<&ResolvedMetric> for MetricRow {
    fn from(metric: &ResolvedMetric) -> Self {
        Self {
            namespace: metric.namespace.to_string(),
            value: format_value(&metric.data),
            unit: metric.unit.clone(),
            timestamp: metric.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Split namespaces into requests and the namespaces no metric type matches
fn build_requests<'a>(
    namespaces: &'a [String],
    config: &PluginConfig,
) -> (Vec<MetricRequest>, Vec<&'a str>) {
    let mut requests = Vec::new();
    let mut unknown = Vec::new();

    for namespace in namespaces {
        match request_for(namespace, config) {
            Some(request) => requests.push(request),
            None => unknown.push(namespace.as_str()),
        }
    }

    (requests, unknown)
}

/// Collect the given namespaces once and print the results
pub async fn collect_once(
    collector: &Collector,
    api_key: Option<&str>,
    namespaces: &[String],
    format: OutputFormat,
) -> Result<()> {
    let api_key =
        api_key.context("An API key is required, pass --api-key or set NEWRELIC_API_KEY")?;
    let config = PluginConfig::with_api_key(api_key);

    let (requests, unknown) = build_requests(namespaces, &config);
    for namespace in &unknown {
        print_warning(&format!("Unknown metric namespace, skipping: {}", namespace));
    }
    if requests.is_empty() {
        anyhow::bail!("No known metric namespaces to collect");
    }

    let resolved = collector
        .collect_metrics(&requests)
        .await
        .context("Collection failed")?;

    let rows: Vec<MetricRow> = resolved.iter().map(MetricRow::from).collect();
    print_table(&rows, &resolved, format);

    if matches!(format, OutputFormat::Table) && resolved.len() < requests.len() {
        print_info(&format!(
            "{} metric(s) were absent from the entity snapshot",
            requests.len() - resolved.len()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requests_separates_unknown() {
        let namespaces = vec![
            "inteleon/newrelic/apm/1337/show/reporting".to_string(),
            "inteleon/newrelic/apm/1337/show/nope".to_string(),
            "inteleon/newrelic/metric/application/1337/*/hax/throughput/value".to_string(),
        ];

        let (requests, unknown) = build_requests(&namespaces, &PluginConfig::with_api_key("k"));

        assert_eq!(requests.len(), 2);
        assert_eq!(unknown, vec!["inteleon/newrelic/apm/1337/show/nope"]);
    }

    #[tokio::test]
    async fn test_collect_requires_api_key() {
        let collector = Collector::new();
        let namespaces = vec!["inteleon/newrelic/apm/1/show/reporting".to_string()];

        let err = collect_once(&collector, None, &namespaces, OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[tokio::test]
    async fn test_collect_against_mock_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/applications/1337.json")
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body(r#"{"application":{"id":1337,"health_status":"green","reporting":true}}"#)
            .expect(1)
            .create_async()
            .await;

        let collector = Collector::builder().base_url(server.url()).build();
        let namespaces = vec![
            "inteleon/newrelic/apm/1337/show/health/status".to_string(),
            "inteleon/newrelic/apm/1337/show/reporting".to_string(),
        ];

        collect_once(&collector, Some("secret"), &namespaces, OutputFormat::Json)
            .await
            .unwrap();

        // Both requests share one snapshot
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_collect_surfaces_upstream_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/applications/1.json")
            .with_status(403)
            .create_async()
            .await;

        let collector = Collector::builder().base_url(server.url()).build();
        let namespaces = vec!["inteleon/newrelic/apm/1/show/reporting".to_string()];

        let err = collect_once(&collector, Some("secret"), &namespaces, OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("status=403"));
    }
}
