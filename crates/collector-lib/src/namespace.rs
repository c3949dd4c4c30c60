//! Metric namespaces and their expansion from catalog definitions
//!
//! A namespace is an ordered list of elements, each either a fixed literal
//! or a dynamic element whose value is supplied by the caller. Catalog
//! templates use [`Segment`]; advertised and requested metrics carry owned
//! [`NamespaceElement`]s.

use crate::catalog::MetricDefinition;
use crate::models::{MetricTags, MetricType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value a dynamic element carries until the caller fills it in
pub const WILDCARD: &str = "*";

/// Vendor and plugin segments every namespace starts with
pub const ROOT_PREFIX: [&str; 2] = ["inteleon", "newrelic"];

/// Version stamped on advertised metric types
pub const METRIC_VERSION: u32 = 1;

/// Position of the family literal
pub const FAMILY_INDEX: usize = 2;

/// Template segment of a catalog definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Literal(&'static str),
    Dynamic {
        name: &'static str,
        description: &'static str,
    },
}

/// Owned namespace element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NamespaceElement {
    Static {
        value: String,
    },
    Dynamic {
        name: String,
        description: String,
        value: String,
    },
}

impl NamespaceElement {
    pub fn literal(value: impl Into<String>) -> Self {
        NamespaceElement::Static {
            value: value.into(),
        }
    }

    pub fn dynamic(name: impl Into<String>, description: impl Into<String>) -> Self {
        NamespaceElement::Dynamic {
            name: name.into(),
            description: description.into(),
            value: WILDCARD.to_string(),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            NamespaceElement::Static { value } | NamespaceElement::Dynamic { value, .. } => value,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, NamespaceElement::Dynamic { .. })
    }
}

impl From<Segment> for NamespaceElement {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Literal(value) => NamespaceElement::literal(value),
            Segment::Dynamic { name, description } => NamespaceElement::dynamic(name, description),
        }
    }
}

/// Ordered, slash-joined metric address
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Vec<NamespaceElement>);

impl Namespace {
    /// Namespace made only of literal elements
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(NamespaceElement::literal).collect())
    }

    /// Parse a slash-delimited string into literal elements
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }

    pub fn push(&mut self, element: NamespaceElement) {
        self.0.push(element);
    }

    pub fn elements(&self) -> &[NamespaceElement] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the element at `index`
    pub fn value(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(NamespaceElement::value)
    }

    /// Value of the last element
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(NamespaceElement::value)
    }

    pub fn strings(&self) -> Vec<&str> {
        self.0.iter().map(NamespaceElement::value).collect()
    }

    /// Whether the namespace starts with the vendor/plugin prefix
    pub fn has_root_prefix(&self) -> bool {
        self.0.len() >= ROOT_PREFIX.len()
            && ROOT_PREFIX
                .iter()
                .zip(&self.0)
                .all(|(expected, element)| element.value() == *expected)
    }

    /// Fill the dynamic elements of this template with `values`.
    ///
    /// Returns `None` when lengths differ, a literal does not match, or a
    /// dynamic value is empty. Dynamic elements keep their name and
    /// description.
    pub fn resolve(&self, values: &[&str]) -> Option<Namespace> {
        if values.len() != self.0.len() {
            return None;
        }

        self.0
            .iter()
            .zip(values)
            .map(|(element, value)| match element {
                NamespaceElement::Static { value: literal } => {
                    (literal == value).then(|| element.clone())
                }
                NamespaceElement::Dynamic {
                    name, description, ..
                } => (!value.is_empty()).then(|| NamespaceElement::Dynamic {
                    name: name.clone(),
                    description: description.clone(),
                    value: (*value).to_string(),
                }),
            })
            .collect::<Option<Vec<_>>>()
            .map(Namespace)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.strings().join("/"))
    }
}

/// Build the advertised metric types for `defs` under `prefix`.
///
/// Each namespace is `prefix / family / {id} / template…`, with the entity
/// kind literal before the id for families that name it. Every type
/// carries the definition's family, path and unit as tags.
pub fn expand(prefix: &[&str], defs: &[MetricDefinition]) -> Vec<MetricType> {
    defs.iter()
        .map(|def| {
            let mut namespace = Namespace::new(prefix.iter().copied());
            namespace.push(NamespaceElement::literal(def.family.literal()));
            if def.family.names_entity_kind() {
                namespace.push(NamespaceElement::literal(def.entity.literal()));
            }
            namespace.push(NamespaceElement::dynamic(
                def.entity.id_placeholder(),
                def.entity.id_description(),
            ));
            for segment in def.template {
                namespace.push((*segment).into());
            }

            MetricType {
                namespace,
                version: METRIC_VERSION,
                tags: MetricTags {
                    family: def.family,
                    entity: def.entity,
                    path: def.path.iter().map(|s| s.to_string()).collect(),
                    unit: def.unit.to_string(),
                    value_kind: def.value_kind,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, Family, ValueKind};

    const HEALTH: MetricDefinition = MetricDefinition {
        template: &[
            Segment::Literal("show"),
            Segment::Literal("health"),
            Segment::Literal("status"),
        ],
        family: Family::EntitySummary,
        entity: EntityKind::Application,
        path: &["health_status"],
        unit: "string",
        value_kind: ValueKind::String,
    };

    const COMPONENT_SERIES: MetricDefinition = MetricDefinition {
        template: &[Segment::Literal("value")],
        family: Family::TimeSeries,
        entity: EntityKind::Component,
        path: &[],
        unit: "float",
        value_kind: ValueKind::Float,
    };

    #[test]
    fn test_expand_inserts_family_and_id() {
        let types = expand(&ROOT_PREFIX, &[HEALTH]);
        assert_eq!(types.len(), 1);

        let ns = &types[0].namespace;
        assert_eq!(ns.to_string(), "inteleon/newrelic/apm/*/show/health/status");
        assert!(ns.elements()[Family::EntitySummary.entity_id_index()].is_dynamic());
        assert_eq!(types[0].tags.path, vec!["health_status"]);
        assert_eq!(types[0].version, METRIC_VERSION);
    }

    #[test]
    fn test_expand_names_kind_for_series() {
        let types = expand(&ROOT_PREFIX, &[COMPONENT_SERIES]);
        let ns = &types[0].namespace;

        assert_eq!(ns.to_string(), "inteleon/newrelic/metric/component/*/value");
        match &ns.elements()[Family::TimeSeries.entity_id_index()] {
            NamespaceElement::Dynamic { name, .. } => assert_eq!(name, "component_id"),
            other => panic!("expected dynamic element, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_fills_dynamic_elements() {
        let template = &expand(&ROOT_PREFIX, &[HEALTH])[0].namespace;
        let concrete = template
            .resolve(&Namespace::parse("inteleon/newrelic/apm/1337/show/health/status").strings())
            .unwrap();

        let index = Family::EntitySummary.entity_id_index();
        assert_eq!(concrete.value(index), Some("1337"));
        match &concrete.elements()[index] {
            NamespaceElement::Dynamic { name, .. } => assert_eq!(name, "app_id"),
            other => panic!("expected dynamic element, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_rejects_mismatches() {
        let template = &expand(&ROOT_PREFIX, &[HEALTH])[0].namespace;

        // Wrong literal
        assert!(template
            .resolve(&["inteleon", "newrelic", "apm", "1", "show", "health", "x"])
            .is_none());
        // Wrong length
        assert!(template
            .resolve(&["inteleon", "newrelic", "apm", "1", "show"])
            .is_none());
        // Kind segment is not part of summary namespaces
        assert!(template
            .resolve(&["inteleon", "newrelic", "apm", "application", "1", "show", "health", "status"])
            .is_none());
        // Empty dynamic value
        assert!(template
            .resolve(&["inteleon", "newrelic", "apm", "", "show", "health", "status"])
            .is_none());
    }

    #[test]
    fn test_root_prefix() {
        assert!(Namespace::parse("inteleon/newrelic/apm").has_root_prefix());
        assert!(!Namespace::parse("intel/psutil/load").has_root_prefix());
        assert!(!Namespace::parse("inteleon").has_root_prefix());
    }
}
