//! Metric catalog listing

use collector_lib::{Collector, Family, MetricType};
use tabled::Tabled;

use crate::output::{print_table, OutputFormat};

/// Row for the metric types table
#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Kind")]
    value_kind: String,
}

impl From<&MetricType> for TypeRow {
    fn from(metric_type: &MetricType) -> Self {
        Self {
            namespace: metric_type.namespace.to_string(),
            family: metric_type.tags.family.to_string(),
            unit: metric_type.tags.unit.clone(),
            value_kind: format!("{:?}", metric_type.tags.value_kind).to_lowercase(),
        }
    }
}

fn filter_types(collector: &Collector, family: Option<Family>) -> Vec<MetricType> {
    collector
        .metric_types()
        .into_iter()
        .filter(|t| family.map_or(true, |f| t.tags.family == f))
        .collect()
}

/// List advertised metric types, optionally of one family
pub fn list_types(collector: &Collector, family: Option<Family>, format: OutputFormat) {
    let types = filter_types(collector, family);
    let rows: Vec<TypeRow> = types.iter().map(TypeRow::from).collect();

    print_table(&rows, &types, format);
}
