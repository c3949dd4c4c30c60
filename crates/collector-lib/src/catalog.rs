//! Static catalog of metric definitions
//!
//! The catalog is immutable process-wide data. It is advertised in full
//! regardless of which entities exist; ids are only checked when metrics
//! are collected.

use crate::config::PluginConfig;
use crate::models::{EntityKind, Family, MetricRequest, MetricType, ValueKind};
use crate::namespace::{self, Namespace, Segment, ROOT_PREFIX};

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    /// Segments following the entity id
    pub template: &'static [Segment],
    pub family: Family,
    pub entity: EntityKind,
    /// Keys to descend through; empty uses a namespace segment as the key
    pub path: &'static [&'static str],
    pub unit: &'static str,
    pub value_kind: ValueKind,
}

macro_rules! summary {
    ([$($seg:literal),+], [$($key:literal),*], $unit:literal, $kind:ident) => {
        MetricDefinition {
            template: &[$(Segment::Literal($seg)),+],
            family: Family::EntitySummary,
            entity: EntityKind::Application,
            path: &[$($key),*],
            unit: $unit,
            value_kind: ValueKind::$kind,
        }
    };
}

const MINUTES: Segment = Segment::Dynamic {
    name: "minutes",
    description: "Number of minutes to construct a relative timeframe from (now - minutes).",
};
const METRIC_NAME: Segment = Segment::Dynamic {
    name: "metric_name",
    description: "Metric name",
};
const VALUE_NAME: Segment = Segment::Dynamic {
    name: "value_name",
    description: "Value name",
};

const SERIES_TEMPLATE: &[Segment] = &[MINUTES, METRIC_NAME, VALUE_NAME, Segment::Literal("value")];

/// Fields of the application snapshot
pub static ENTITY_SUMMARY_METRICS: &[MetricDefinition] = &[
    summary!(["show", "health", "status"], ["health_status"], "status", String),
    summary!(["show", "reporting"], [], "bool", Bool),
    summary!(["show", "name"], [], "name", String),
    summary!(["show", "language"], [], "language", String),
    summary!(["show", "last_reported_at"], [], "timestamp", String),
    summary!(["show", "summary", "application", "response_time"], ["application_summary", "response_time"], "ms", Float),
    summary!(["show", "summary", "application", "throughput"], ["application_summary", "throughput"], "rpm", Float),
    summary!(["show", "summary", "application", "error_rate"], ["application_summary", "error_rate"], "percent", Float),
    summary!(["show", "summary", "application", "apdex_target"], ["application_summary", "apdex_target"], "s", Float),
    summary!(["show", "summary", "application", "apdex_score"], ["application_summary", "apdex_score"], "score", Float),
    summary!(["show", "summary", "application", "host_count"], ["application_summary", "host_count"], "hosts", Int),
    summary!(["show", "summary", "application", "instance_count"], ["application_summary", "instance_count"], "instances", Int),
    summary!(["show", "summary", "user", "response_time"], ["end_user_summary", "response_time"], "s", Float),
    summary!(["show", "summary", "user", "throughput"], ["end_user_summary", "throughput"], "rpm", Float),
    summary!(["show", "summary", "user", "apdex_target"], ["end_user_summary", "apdex_target"], "s", Float),
    summary!(["show", "summary", "user", "apdex_score"], ["end_user_summary", "apdex_score"], "score", Float),
];

/// Named metric data, one generic definition per entity kind.
/// The value name segment is the traversal key.
pub static TIME_SERIES_METRICS: &[MetricDefinition] = &[
    MetricDefinition {
        template: SERIES_TEMPLATE,
        family: Family::TimeSeries,
        entity: EntityKind::Application,
        path: &[],
        unit: "float",
        value_kind: ValueKind::Float,
    },
    MetricDefinition {
        template: SERIES_TEMPLATE,
        family: Family::TimeSeries,
        entity: EntityKind::Component,
        path: &[],
        unit: "float",
        value_kind: ValueKind::Float,
    },
];

/// Definitions of one family
pub fn definitions(family: Family) -> &'static [MetricDefinition] {
    match family {
        Family::EntitySummary => ENTITY_SUMMARY_METRICS,
        Family::TimeSeries => TIME_SERIES_METRICS,
    }
}

/// Advertised metric types of one family
pub fn metric_types(family: Family) -> Vec<MetricType> {
    namespace::expand(&ROOT_PREFIX, definitions(family))
}

/// Advertised metric types across all families, in declaration order
pub fn all_metric_types() -> Vec<MetricType> {
    Family::ALL.into_iter().flat_map(metric_types).collect()
}

/// Build a request for a concrete slash-delimited namespace.
///
/// Returns `None` if no advertised metric type matches.
pub fn request_for(namespace: &str, config: &PluginConfig) -> Option<MetricRequest> {
    let concrete = Namespace::parse(namespace);
    let values = concrete.strings();

    all_metric_types().into_iter().find_map(|metric_type| {
        metric_type
            .namespace
            .resolve(&values)
            .map(|namespace| MetricRequest {
                namespace,
                tags: metric_type.tags,
                config: config.clone(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_definition_is_advertised_under_its_family() {
        for family in Family::ALL {
            let defs = definitions(family);
            let types = metric_types(family);
            assert_eq!(types.len(), defs.len());

            for (def, metric_type) in defs.iter().zip(&types) {
                let template: Vec<String> = def
                    .template
                    .iter()
                    .map(|s| match s {
                        Segment::Literal(v) => v.to_string(),
                        Segment::Dynamic { .. } => "*".to_string(),
                    })
                    .collect();
                let scope = match family {
                    Family::EntitySummary => family.literal().to_string(),
                    Family::TimeSeries => format!("{}/{}", family.literal(), def.entity.literal()),
                };
                let expected = format!("inteleon/newrelic/{}/*/{}", scope, template.join("/"));
                assert_eq!(metric_type.namespace.to_string(), expected);
                assert_eq!(metric_type.tags.family, family);
            }
        }
    }

    #[test]
    fn test_summary_namespaces_carry_only_the_app_id() {
        let types = metric_types(Family::EntitySummary);
        assert_eq!(
            types[0].namespace.to_string(),
            "inteleon/newrelic/apm/*/show/health/status"
        );

        let request = request_for(
            "inteleon/newrelic/apm/1337/show/health/status",
            &PluginConfig::default(),
        )
        .unwrap();
        assert_eq!(request.tags.path, vec!["health_status"]);
    }

    #[test]
    fn test_all_metric_types_in_family_order() {
        let all = all_metric_types();
        assert_eq!(
            all.len(),
            ENTITY_SUMMARY_METRICS.len() + TIME_SERIES_METRICS.len()
        );
        assert_eq!(all[0].tags.family, Family::EntitySummary);
        assert_eq!(all[all.len() - 1].tags.family, Family::TimeSeries);
    }

    #[test]
    fn test_empty_paths_name_their_terminal_segment() {
        for def in ENTITY_SUMMARY_METRICS.iter().filter(|d| d.path.is_empty()) {
            assert!(matches!(def.template.last(), Some(Segment::Literal(_))));
        }
    }

    #[test]
    fn test_request_for_summary_namespace() {
        let config = PluginConfig::with_api_key("secret");
        let request = request_for(
            "inteleon/newrelic/apm/1337/show/summary/application/response_time",
            &config,
        )
        .unwrap();

        assert_eq!(request.tags.family, Family::EntitySummary);
        assert_eq!(
            request.tags.path,
            vec!["application_summary", "response_time"]
        );
        assert_eq!(
            request.namespace.value(Family::EntitySummary.entity_id_index()),
            Some("1337")
        );
        assert_eq!(request.config, config);
    }

    #[test]
    fn test_request_for_series_namespace() {
        let request = request_for(
            "inteleon/newrelic/metric/component/31337/*/hacker/throughput/value",
            &PluginConfig::default(),
        )
        .unwrap();

        assert_eq!(request.tags.family, Family::TimeSeries);
        assert_eq!(request.tags.entity, EntityKind::Component);
        assert!(request.tags.path.is_empty());
    }

    #[test]
    fn test_request_for_unknown_namespace() {
        let config = PluginConfig::default();
        assert!(request_for("inteleon/newrelic/apm/1/show/nope", &config).is_none());
        assert!(request_for("inteleon/newrelic/apm/1/show/reporting", &config).is_none());
        assert!(request_for("intel/psutil/load/load1", &config).is_none());
    }
}
