//! Reading counter values back out of a collected snapshot.

use std::collections::BTreeMap;

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{Metric, ResourceMetrics, Sum};

use crate::attributes::LabelSet;

/// One labelled reading of a `u64` counter.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterPoint {
    pub attributes: Vec<KeyValue>,
    pub value: u64,
}

impl CounterPoint {
    /// True when the point carries exactly `labels`.
    pub fn has_labels(&self, labels: &LabelSet) -> bool {
        let actual: BTreeMap<&str, String> = self
            .attributes
            .iter()
            .map(|kv| (kv.key.as_str(), kv.value.to_string()))
            .collect();
        let expected: BTreeMap<&str, String> =
            labels.iter().map(|(k, v)| (k, v.to_string())).collect();
        actual == expected
    }
}

pub fn metrics<'a>(snapshot: &'a ResourceMetrics) -> impl Iterator<Item = &'a Metric> + 'a {
    snapshot.scope_metrics.iter().flat_map(|scope| scope.metrics.iter())
}

pub fn find_metric<'a>(snapshot: &'a ResourceMetrics, name: &str) -> Option<&'a Metric> {
    metrics(snapshot).find(|m| m.name == name)
}

/// Data points of the `u64` counter `name`, empty when it was never recorded.
pub fn counter_points(snapshot: &ResourceMetrics, name: &str) -> Vec<CounterPoint> {
    find_metric(snapshot, name)
        .and_then(|m| m.data.as_any().downcast_ref::<Sum<u64>>())
        .map(|sum| {
            sum.data_points
                .iter()
                .map(|dp| CounterPoint {
                    attributes: dp.attributes.clone(),
                    value: dp.value,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Sum over every label combination of the counter `name`.
pub fn counter_total(snapshot: &ResourceMetrics, name: &str) -> u64 {
    counter_points(snapshot, name).iter().map(|p| p.value).sum()
}

/// Value recorded under exactly `labels`.
pub fn counter_value(snapshot: &ResourceMetrics, name: &str, labels: &LabelSet) -> Option<u64> {
    counter_points(snapshot, name)
        .into_iter()
        .find(|p| p.has_labels(labels))
        .map(|p| p.value)
}
