//! Kubernetes Metrics Server client
//!
//! Fetches usage from the metrics api (metrics.k8s.io), records every sample in
//! a [`MetricsHistoryStore`] and serves the recorded series as a [`MetricSource`].

use crate::error::Result;
use crate::k8s::metrics_history::{MetricSample, MetricsHistoryStore};
use crate::k8s::resources::{parse_cpu, parse_memory};
use crate::kind::ResourceKind;
use crate::metric::{
    Metric, MetricName, MetricPoint, MetricSource, MetricSubject, SeriesByResource, sum_series,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::serde_json::Value;
use kube::{
    Client,
    api::{Api, ApiResource, DynamicObject, ListParams},
    core::GroupVersionKind,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const METRICS_GROUP: &str = "metrics.k8s.io";
const METRICS_VERSION: &str = "v1beta1";

/// Usage of one pod, summed over its containers
#[derive(Debug, Clone, PartialEq)]
pub struct PodMetric {
    pub pod_name: String,
    pub namespace: String,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: Option<f64>,    // millicores
    pub memory_usage: Option<u64>, // bytes
}

/// Usage of one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetric {
    pub node_name: String,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: Option<f64>,    // millicores
    pub memory_usage: Option<u64>, // bytes
}

fn metrics_resource(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, kind),
        plural,
    )
}

/// True when the metrics api is not served by the cluster
fn metrics_server_missing(error: &kube::Error) -> bool {
    match error {
        kube::Error::Api(response) => response.code == 404 || response.code == 503,
        _ => false,
    }
}

fn sample_timestamp(object: &DynamicObject) -> DateTime<Utc> {
    object
        .data
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc))
}

fn usage(usage: &Value) -> (Option<f64>, Option<u64>) {
    (
        usage.get("cpu").and_then(Value::as_str).and_then(parse_cpu),
        usage
            .get("memory")
            .and_then(Value::as_str)
            .and_then(parse_memory),
    )
}

/// Sum container usage of a `PodMetrics` object; `None` when a required field is absent
fn parse_pod_metric(object: &DynamicObject) -> Option<PodMetric> {
    let containers = object.data.get("containers")?.as_array()?;
    let mut cpu_usage: Option<f64> = None;
    let mut memory_usage: Option<u64> = None;
    for container in containers {
        let (cpu, memory) = container.get("usage").map_or((None, None), usage);
        if let Some(cpu) = cpu {
            cpu_usage = Some(cpu_usage.unwrap_or(0.0) + cpu);
        }
        if let Some(memory) = memory {
            memory_usage = Some(memory_usage.unwrap_or(0) + memory);
        }
    }

    Some(PodMetric {
        pod_name: object.metadata.name.clone()?,
        namespace: object.metadata.namespace.clone()?,
        timestamp: sample_timestamp(object),
        cpu_usage,
        memory_usage,
    })
}

fn parse_node_metric(object: &DynamicObject) -> Option<NodeMetric> {
    let (cpu_usage, memory_usage) = usage(object.data.get("usage")?);
    Some(NodeMetric {
        node_name: object.metadata.name.clone()?,
        timestamp: sample_timestamp(object),
        cpu_usage,
        memory_usage,
    })
}

/// Fetch pod metrics from the Kubernetes Metrics Server
///
/// # Errors
///
/// Returns error only if there's a client/connection issue, not if metrics server is missing
pub async fn fetch_pod_metrics(client: Client, namespace: Option<&str>) -> Result<Vec<PodMetric>> {
    debug!("Fetching pod metrics in {}", namespace.unwrap_or("all namespaces"));
    let ar = metrics_resource("PodMetrics", "pods");
    let api: Api<DynamicObject> = namespace.map_or_else(
        || Api::all_with(client.clone(), &ar),
        |ns| Api::namespaced_with(client.clone(), ns, &ar),
    );

    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let metrics: Vec<PodMetric> = list.items.iter().filter_map(parse_pod_metric).collect();
            debug!("Parsed {} of {} pod metrics", metrics.len(), list.items.len());
            Ok(metrics)
        }
        Err(e) if metrics_server_missing(&e) => {
            debug!("Metrics server not available, continuing without metrics");
            Ok(Vec::new())
        }
        Err(e) => {
            warn!("Error fetching pod metrics: {}", e);
            Err(e.into())
        }
    }
}

/// Fetch node metrics from the Kubernetes Metrics Server
///
/// # Errors
///
/// Returns error only if there's a client/connection issue, not if metrics server is missing
pub async fn fetch_node_metrics(client: Client) -> Result<Vec<NodeMetric>> {
    debug!("Fetching node metrics");
    let ar = metrics_resource("NodeMetrics", "nodes");
    let api: Api<DynamicObject> = Api::all_with(client, &ar);

    match api.list(&ListParams::default()).await {
        Ok(list) => Ok(list.items.iter().filter_map(parse_node_metric).collect()),
        Err(e) if metrics_server_missing(&e) => {
            debug!("Metrics server not available, continuing without node metrics");
            Ok(Vec::new())
        }
        Err(e) => {
            warn!("Error fetching node metrics: {}", e);
            Err(e.into())
        }
    }
}

/// History keys whose samples make up `subject`
fn subject_keys(subject: &MetricSubject) -> Vec<String> {
    let selector = &subject.selector;
    if selector.kind == ResourceKind::Node {
        return vec![MetricsHistoryStore::node_key(&selector.name)];
    }
    let namespace = selector.namespace.as_deref().unwrap_or_default();
    subject
        .pods
        .iter()
        .map(|pod| MetricsHistoryStore::pod_key(namespace, pod))
        .collect()
}

/// Build the series of each subject from the recorded history.
///
/// Subjects without any recorded sample are left out.
#[must_use]
pub fn series_from_history(
    history: &MetricsHistoryStore,
    subjects: &[MetricSubject],
    names: &[MetricName],
) -> SeriesByResource {
    let mut series = SeriesByResource::new();
    for subject in subjects {
        let recorded: Vec<_> = subject_keys(subject)
            .iter()
            .filter_map(|key| history.history(key))
            .collect();
        if recorded.is_empty() {
            continue;
        }

        let metrics: Vec<Metric> = names
            .iter()
            .filter_map(|name| {
                let points: Vec<Vec<MetricPoint>> =
                    recorded.iter().map(|ts| ts.points(*name)).collect();
                let summed = sum_series(points.iter().map(Vec::as_slice));
                if summed.is_empty() {
                    return None;
                }
                let mut metric = Metric::new(*name, summed)
                    .labeled(subject.selector.kind, subject.selector.name.clone());
                if subject.selector.kind != ResourceKind::Pod {
                    for pod in &subject.pods {
                        metric = metric.labeled(ResourceKind::Pod, pod.clone());
                    }
                }
                Some(metric)
            })
            .collect();

        if !metrics.is_empty() {
            series.insert(subject.selector.uid.clone(), metrics);
        }
    }
    series
}

/// [`MetricSource`] backed by the metrics server
pub struct MetricsServerSource {
    client: Client,
    history: Mutex<MetricsHistoryStore>,
    concurrency: usize,
}

impl MetricsServerSource {
    #[must_use]
    pub fn new(client: Client, concurrency: usize) -> Self {
        Self {
            client,
            history: Mutex::new(MetricsHistoryStore::new()),
            concurrency,
        }
    }
}

#[async_trait]
impl MetricSource for MetricsServerSource {
    async fn metrics_for(
        &self,
        subjects: &[MetricSubject],
        names: &[MetricName],
    ) -> Result<SeriesByResource> {
        let wants_nodes = subjects
            .iter()
            .any(|s| s.selector.kind == ResourceKind::Node);
        let wants_pods = subjects.iter().any(|s| !s.pods.is_empty());

        let pods = if wants_pods {
            let namespace = subjects.iter().find_map(|s| s.selector.namespace.as_deref());
            fetch_pod_metrics(self.client.clone(), namespace).await?
        } else {
            Vec::new()
        };
        let nodes = if wants_nodes {
            fetch_node_metrics(self.client.clone()).await?
        } else {
            Vec::new()
        };

        let mut history = self.history.lock().await;
        for pod in pods {
            history.record(
                MetricsHistoryStore::pod_key(&pod.namespace, &pod.pod_name),
                MetricSample::new(pod.timestamp, pod.cpu_usage, pod.memory_usage),
            );
        }
        for node in nodes {
            history.record(
                MetricsHistoryStore::node_key(&node.node_name),
                MetricSample::new(node.timestamp, node.cpu_usage, node.memory_usage),
            );
        }
        history.prune_stale(Utc::now());

        Ok(series_from_history(&history, subjects, names))
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::ResourceSelector;
    use chrono::TimeZone;
    use k8s_openapi::serde_json::{self, json};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn subject(kind: ResourceKind, name: &str, pods: &[&str]) -> MetricSubject {
        MetricSubject {
            selector: ResourceSelector {
                namespace: Some("default".to_string()),
                kind,
                name: name.to_string(),
                uid: format!("{name}-uid"),
                label_selector: None,
            },
            pods: pods.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_parse_pod_metric_sums_containers() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "metrics.k8s.io/v1beta1", "kind": "PodMetrics",
            "metadata": {"name": "web-1", "namespace": "default"},
            "timestamp": "2024-05-01T10:00:00Z",
            "window": "30s",
            "containers": [
                {"name": "app", "usage": {"cpu": "250000000n", "memory": "64Mi"}},
                {"name": "sidecar", "usage": {"cpu": "5m", "memory": "1Mi"}}
            ]
        }))
        .unwrap();

        let metric = parse_pod_metric(&object).unwrap();
        assert_eq!(metric.pod_name, "web-1");
        assert_eq!(metric.cpu_usage, Some(255.0));
        assert_eq!(metric.memory_usage, Some(65 * 1024 * 1024));
        assert_eq!(metric.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_node_metric() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "metrics.k8s.io/v1beta1", "kind": "NodeMetrics",
            "metadata": {"name": "node-1"},
            "timestamp": "2024-05-01T10:00:00Z",
            "usage": {"cpu": "1", "memory": "2Gi"}
        }))
        .unwrap();

        let metric = parse_node_metric(&object).unwrap();
        assert_eq!(metric.cpu_usage, Some(1000.0));
        assert_eq!(metric.memory_usage, Some(2 * 1024 * 1024 * 1024));
    }

    #[test]
    fn test_series_from_history_sums_controller_pods() {
        let mut history = MetricsHistoryStore::new();
        for (pod, cpu) in [("web-a", 100.0), ("web-b", 50.0)] {
            let key = MetricsHistoryStore::pod_key("default", pod);
            history.record(key.clone(), MetricSample::new(at(0), Some(cpu), Some(10)));
            history.record(key, MetricSample::new(at(60), Some(cpu * 2.0), Some(20)));
        }

        let subjects = [
            subject(ResourceKind::ReplicaSet, "web", &["web-a", "web-b"]),
            subject(ResourceKind::Pod, "gone", &["gone"]),
        ];
        let series = series_from_history(&history, &subjects, &[MetricName::CpuUsageRate]);

        assert_eq!(series.len(), 1);
        let metric = &series["web-uid"][0];
        let values: Vec<f64> = metric.data_points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![150.0, 300.0]);
        assert_eq!(metric.label[&ResourceKind::Pod].len(), 2);
        assert_eq!(metric.label[&ResourceKind::ReplicaSet], vec!["web".to_string()]);
    }
}
