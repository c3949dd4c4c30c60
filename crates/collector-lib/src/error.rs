//! Error types for the collector
//!
//! Errors are split by boundary: [`PathError`] for response traversal,
//! [`ClientError`] for the upstream REST API and [`CollectorError`] for
//! everything a collection call can surface to its host.

use std::time::Duration;

/// Traversal failure inside a decoded response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A segment was absent, or an intermediate segment was not a mapping.
    #[error("Path element not found: {0}")]
    NotFound(String),
}

/// Errors returned by an [`ApmClient`](crate::client::ApmClient) implementation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Non-2xx status code from the API.
    #[error("upstream API HTTP error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// The API throttled the request. Retrying is left to the host.
    #[error("upstream API rate limited the request")]
    RateLimited,

    /// Transport failure from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL could not be joined with an endpoint path.
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors surfaced by a collection call.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("List of metrics is empty")]
    EmptyRequest,

    /// An id or window segment that must be an integer was not.
    #[error("invalid {field} `{value}`: expected an integer")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("malformed namespace `{namespace}`: {reason}")]
    MalformedNamespace { namespace: String, reason: String },

    #[error(transparent)]
    Upstream(#[from] ClientError),

    #[error(
        "Wrong number of returned metrics when fetching data for {name}. Expected number is 1, got {found}."
    )]
    SeriesCount { name: String, found: usize },

    #[error(
        "Metric name mismatch! Requested metric name: {requested}. Metric name in the received payload: {received}."
    )]
    SeriesNameMismatch { requested: String, received: String },

    #[error("metric {name} was returned without any time slices")]
    EmptySeries { name: String },

    #[error(transparent)]
    FieldNotFound(#[from] PathError),

    #[error("required configuration `{key}` is missing")]
    ConfigurationMissing { key: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A spawned fetch task panicked or was cancelled.
    #[error("collection task failed: {0}")]
    Task(String),
}

impl CollectorError {
    /// Short machine-friendly label, used for metric labels and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectorError::EmptyRequest => "empty_request",
            CollectorError::InvalidIdentifier { .. } => "invalid_identifier",
            CollectorError::MalformedNamespace { .. } => "malformed_namespace",
            CollectorError::Upstream(_) => "upstream",
            CollectorError::SeriesCount { .. }
            | CollectorError::SeriesNameMismatch { .. }
            | CollectorError::EmptySeries { .. } => "series_mismatch",
            CollectorError::FieldNotFound(_) => "field_not_found",
            CollectorError::ConfigurationMissing { .. } => "configuration_missing",
            CollectorError::Timeout { .. } => "timeout",
            CollectorError::Task(_) => "task",
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
