//! Metric types and the promise-based aggregator that attaches metrics to
//! data select results.

mod aggregator;
mod source;

pub use aggregator::{CellMetrics, MetricPromises, attach_metrics, cumulative_metrics, sum_series};
pub use source::{MetricSource, MetricSubject, SeriesByResource};

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::dataselect::CachedResources;
use crate::k8s::utils::labels_match;
use crate::kind::ResourceKind;
use crate::resource::common::is_controlled_by;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MetricName {
    #[serde(rename = "cpu/usage_rate")]
    CpuUsageRate,
    #[serde(rename = "memory/usage")]
    MemoryUsage,
}

impl MetricName {
    pub const ALL: [Self; 2] = [Self::CpuUsageRate, Self::MemoryUsage];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CpuUsageRate => "cpu/usage_rate",
            Self::MemoryUsage => "memory/usage",
        }
    }

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::CpuUsageRate => "millicores",
            Self::MemoryUsage => "bytes",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the points of a metric were combined across pods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Resource names a metric was computed from, by kind
pub type MetricLabel = BTreeMap<ResourceKind, Vec<String>>;

/// One metric series, oldest point first; the last point is the instantaneous value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub metric_name: MetricName,
    pub unit: String,
    pub aggregation: Aggregation,
    pub data_points: Vec<MetricPoint>,
    pub label: MetricLabel,
}

impl Metric {
    #[must_use]
    pub fn new(metric_name: MetricName, data_points: Vec<MetricPoint>) -> Self {
        Self {
            metric_name,
            unit: metric_name.unit().to_string(),
            aggregation: Aggregation::Sum,
            data_points,
            label: MetricLabel::new(),
        }
    }

    #[must_use]
    pub fn labeled(mut self, kind: ResourceKind, name: impl Into<String>) -> Self {
        self.label.entry(kind).or_default().push(name.into());
        self
    }

    /// Newest point
    #[must_use]
    pub fn latest(&self) -> Option<&MetricPoint> {
        self.data_points.last()
    }
}

/// Identity of a cell for metric lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceSelector {
    pub namespace: Option<String>,
    pub kind: ResourceKind,
    pub name: String,
    pub uid: String,
    /// Pod label selector of a controller
    pub label_selector: Option<BTreeMap<String, String>>,
}

impl ResourceSelector {
    #[must_use]
    pub fn with_label_selector(mut self, selector: Option<BTreeMap<String, String>>) -> Self {
        self.label_selector = selector;
        self
    }

    /// Names of the pods whose usage makes up this resource's metrics.
    ///
    /// A pod is its own subject. A controller owns the cached pods in its
    /// namespace that it controls by uid or that match its label selector.
    /// Other kinds have no pods.
    #[must_use]
    pub fn pods(&self, cache: &CachedResources) -> Vec<String> {
        match self.kind {
            ResourceKind::Pod => vec![self.name.clone()],
            kind if kind.owns_pods() => cache
                .pods()
                .iter()
                .filter(|pod| pod.metadata.namespace == self.namespace)
                .filter(|pod| self.owns(pod))
                .filter_map(|pod| pod.metadata.name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn owns(&self, pod: &Pod) -> bool {
        (!self.uid.is_empty() && is_controlled_by(&pod.metadata, &self.uid))
            || self
                .label_selector
                .as_ref()
                .is_some_and(|selector| labels_match(selector, pod.metadata.labels.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json::{self, json};

    fn pod(value: serde_json::Value) -> Pod {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_metric_serialization() {
        let metric = Metric::new(MetricName::CpuUsageRate, vec![]).labeled(ResourceKind::Pod, "web-1");
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["metricName"], "cpu/usage_rate");
        assert_eq!(json["unit"], "millicores");
        assert_eq!(json["aggregation"], "sum");
        assert_eq!(json["label"]["pod"][0], "web-1");
    }

    #[test]
    fn test_selector_pods_from_cache() {
        let cache = CachedResources::with_pods(vec![
            pod(json!({"metadata": {
                "name": "owned", "namespace": "default",
                "ownerReferences": [{"apiVersion": "apps/v1", "kind": "ReplicaSet",
                    "name": "rs", "uid": "rs-uid", "controller": true}]
            }})),
            pod(json!({"metadata": {
                "name": "labeled", "namespace": "default", "labels": {"app": "web"}
            }})),
            pod(json!({"metadata": {
                "name": "elsewhere", "namespace": "other", "labels": {"app": "web"}
            }})),
        ]);

        let rs = ResourceSelector {
            namespace: Some("default".to_string()),
            kind: ResourceKind::ReplicaSet,
            name: "rs".to_string(),
            uid: "rs-uid".to_string(),
            label_selector: None,
        };
        assert_eq!(rs.pods(&cache), vec!["owned".to_string()]);

        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "web".to_string());
        let deployment = ResourceSelector {
            kind: ResourceKind::Deployment,
            uid: "deploy-uid".to_string(),
            ..rs.clone()
        }
        .with_label_selector(Some(selector));
        assert_eq!(deployment.pods(&cache), vec!["labeled".to_string()]);

        let service = ResourceSelector {
            kind: ResourceKind::Service,
            ..rs
        };
        assert!(service.pods(&cache).is_empty());
        assert!(service.pods(&CachedResources::default()).is_empty());
    }
}
