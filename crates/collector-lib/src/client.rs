//! Upstream REST API client
//!
//! [`ApmClient`] is the capability the family collectors consume.
//! [`HttpApmClient`] implements it over the v2 REST API; tests substitute
//! in-memory stubs.

use crate::config::CollectOptions;
use crate::error::ClientError;
use crate::models::{EntityInfo, EntityKind, SeriesResponse, SeriesWindow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// Fetches entity snapshots and metric series by entity id
#[async_trait]
pub trait ApmClient: Send + Sync {
    /// Fetch the snapshot of one entity
    async fn fetch_entity(&self, kind: EntityKind, id: i64) -> Result<EntityInfo, ClientError>;

    /// Fetch named metric series for one entity
    async fn fetch_series(
        &self,
        kind: EntityKind,
        id: i64,
        names: &[String],
        window: SeriesWindow,
    ) -> Result<SeriesResponse, ClientError>;
}

#[derive(Deserialize)]
struct ApplicationEnvelope {
    application: EntityInfo,
}

#[derive(Deserialize)]
struct ComponentEnvelope {
    component: EntityInfo,
}

#[derive(Deserialize)]
struct MetricDataEnvelope {
    metric_data: SeriesResponse,
}

/// Client for the REST v2 API, authenticated by API key
pub struct HttpApmClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpApmClient {
    /// Create a new client forwarding `api_key` on every call
    pub fn new(api_key: impl Into<String>, options: &CollectOptions) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(options.request_timeout).build()?;
        let base_url = Url::parse(&options.base_url)?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ApmClient for HttpApmClient {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_entity(&self, kind: EntityKind, id: i64) -> Result<EntityInfo, ClientError> {
        let path = format!("v2/{}/{}.json", kind.collection(), id);

        let entity = match kind {
            EntityKind::Application => self.get::<ApplicationEnvelope>(&path, &[]).await?.application,
            EntityKind::Component => self.get::<ComponentEnvelope>(&path, &[]).await?.component,
        };

        debug!(fields = entity.len(), "Fetched entity snapshot");
        Ok(entity)
    }

    #[instrument(level = "debug", skip(self, window))]
    async fn fetch_series(
        &self,
        kind: EntityKind,
        id: i64,
        names: &[String],
        window: SeriesWindow,
    ) -> Result<SeriesResponse, ClientError> {
        let path = format!("v2/{}/{}/metrics/data.json", kind.collection(), id);

        let mut query: Vec<(&str, String)> = names.iter().map(|n| ("names[]", n.clone())).collect();
        query.push(("summarize", "true".to_string()));
        if let SeriesWindow::Between { from, to } = window {
            query.push(("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
            query.push(("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let envelope: MetricDataEnvelope = self.get(&path, &query).await?;

        debug!(
            metrics = envelope.metric_data.metrics.len(),
            "Fetched metric data"
        );
        Ok(envelope.metric_data)
    }
}
