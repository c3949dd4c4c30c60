//! Core data models for the collector

use crate::config::PluginConfig;
use crate::namespace::{Namespace, FAMILY_INDEX};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;

/// Group of metric definitions sharing a fetch and resolution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Fields of a single entity snapshot
    EntitySummary,
    /// Values of a named metric time series
    TimeSeries,
}

impl Family {
    /// Declaration order; collection output follows it
    pub const ALL: [Family; 2] = [Family::EntitySummary, Family::TimeSeries];

    /// Namespace segment that discriminates the family
    pub fn literal(self) -> &'static str {
        match self {
            Family::EntitySummary => "apm",
            Family::TimeSeries => "metric",
        }
    }

    pub fn from_literal(literal: &str) -> Option<Self> {
        Family::ALL.into_iter().find(|f| f.literal() == literal)
    }

    /// Whether the entity kind literal follows the family literal.
    /// Entity summaries only exist for applications, so theirs is implied.
    pub const fn names_entity_kind(self) -> bool {
        matches!(self, Family::TimeSeries)
    }

    /// Position of the dynamic entity id in this family's namespaces
    pub const fn entity_id_index(self) -> usize {
        if self.names_entity_kind() {
            FAMILY_INDEX + 2
        } else {
            FAMILY_INDEX + 1
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

/// Kind of monitored entity, selects the upstream endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Application,
    Component,
}

impl EntityKind {
    pub fn literal(self) -> &'static str {
        match self {
            EntityKind::Application => "application",
            EntityKind::Component => "component",
        }
    }

    /// Name of the dynamic namespace element holding the entity id
    pub fn id_placeholder(self) -> &'static str {
        match self {
            EntityKind::Application => "app_id",
            EntityKind::Component => "component_id",
        }
    }

    pub fn id_description(self) -> &'static str {
        match self {
            EntityKind::Application => "The application id",
            EntityKind::Component => "The component id",
        }
    }

    /// Path segment of the REST collection for this kind
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Application => "applications",
            EntityKind::Component => "components",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

/// Expected shape of a resolved value. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Bool,
    Float,
    Int,
}

/// Tags carried from a catalog definition to the requests built from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTags {
    pub family: Family,
    pub entity: EntityKind,
    /// Traversal path; empty means "use a namespace segment as the key"
    #[serde(default)]
    pub path: Vec<String>,
    pub unit: String,
    pub value_kind: ValueKind,
}

/// A metric type advertised to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricType {
    pub namespace: Namespace,
    pub version: u32,
    pub tags: MetricTags,
}

/// A single requested metric with its dynamic segments filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRequest {
    pub namespace: Namespace,
    pub tags: MetricTags,
    #[serde(default)]
    pub config: PluginConfig,
}

/// A collected metric. Carries no tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetric {
    pub namespace: Namespace,
    pub data: Value,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

impl ResolvedMetric {
    /// Populate a request with its resolved value, stamped now (UTC)
    pub fn from_request(request: &MetricRequest, data: Value) -> Self {
        Self {
            namespace: request.namespace.clone(),
            data,
            unit: request.tags.unit.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Decoded entity snapshot: string keys to scalars or nested mappings
pub type EntityInfo = Map<String, Value>;

/// Decoded result of a metric data fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesResponse {
    #[serde(default)]
    pub metrics: Vec<SeriesData>,
}

/// One named metric with its time slices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesData {
    pub name: String,
    #[serde(default)]
    pub timeslices: Vec<Timeslice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeslice {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub values: HashMap<String, f64>,
}

impl Timeslice {
    /// Flatten the value map into a traversable mapping.
    /// Non-finite values have no JSON representation and are dropped.
    pub fn flatten(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter_map(|(name, value)| {
                Number::from_f64(*value).map(|n| (name.clone(), Value::Number(n)))
            })
            .collect()
    }
}

/// Time bounds for a series fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesWindow {
    /// Let the upstream pick its default window
    Default,
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl SeriesWindow {
    /// `[now - minutes, now]`
    pub fn last_minutes(minutes: u32) -> Self {
        let to = Utc::now();
        SeriesWindow::Between {
            from: to - Duration::minutes(i64::from(minutes)),
            to,
        }
    }
}
