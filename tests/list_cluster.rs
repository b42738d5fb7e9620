mod common;

use common::{FakeMetrics, FakeSource, owned_pod, pod};
use k8s_openapi::serde_json::json;
use navidash::channels::{NamespaceScope, ResourceChannels};
use navidash::dataselect::DataSelectQuery;
use navidash::metric::{MetricName, MetricSource};
use navidash::resource::event::{get_event_list, get_events_for_resource};
use navidash::resource::job::get_job_list;
use navidash::resource::namespace::get_namespace_list;
use navidash::resource::node::get_node_list;
use std::sync::Arc;

#[tokio::test]
async fn test_node_list_with_allocation_and_metrics() {
    let mut scheduled = pod("default", "web-1", "Running");
    scheduled["spec"]["nodeName"] = json!("node-1");
    scheduled["spec"]["containers"][0]["resources"] = json!({"requests": {"cpu": "250m"}});
    let source = FakeSource::new()
        .with(json!({
            "apiVersion": "v1", "kind": "Node",
            "metadata": {"name": "node-1", "uid": "node-1-uid"},
            "status": {"allocatable": {"cpu": "2", "memory": "4Gi", "pods": "110"},
                "conditions": [{"type": "Ready", "status": "True"}]}
        }))
        .with(json!({
            "apiVersion": "v1", "kind": "Node",
            "metadata": {"name": "node-2", "uid": "node-2-uid"},
            "status": {"conditions": [{"type": "Ready", "status": "False"}]}
        }))
        .with(scheduled);
    let channels = ResourceChannels::new(Arc::new(source));
    let metrics: Arc<dyn MetricSource> = Arc::new(FakeMetrics::default());
    let query =
        DataSelectQuery::from_params(Some("status,True"), None, None, None, Some("items")).unwrap();

    let list = get_node_list(&channels, Some(metrics), &query).await.unwrap();

    assert_eq!(list.list_meta.total_items, 1);
    let node = &list.nodes[0];
    assert_eq!(node.object_meta.name, "node-1");
    assert_eq!(node.allocated_resources.cpu_requests, 250.0);
    assert_eq!(node.allocated_resources.cpu_requests_fraction, 12.5);
    assert_eq!(node.metrics.len(), MetricName::ALL.len());
    assert!(list.cumulative_metrics.is_empty());
}

#[tokio::test]
async fn test_namespace_list_sorted_descending() {
    let source = ["kube-system", "default", "apps"]
        .iter()
        .fold(FakeSource::new(), |source, name| {
            source.with(json!({
                "apiVersion": "v1", "kind": "Namespace",
                "metadata": {"name": name}, "status": {"phase": "Active"}
            }))
        });
    let channels = ResourceChannels::new(Arc::new(source));
    let query = DataSelectQuery::from_params(None, Some("d,name"), None, None, None).unwrap();

    let list = get_namespace_list(&channels, &query).await.unwrap();
    let names: Vec<_> = list
        .namespaces
        .iter()
        .map(|n| n.object_meta.name.as_str())
        .collect();
    assert_eq!(names, vec!["kube-system", "default", "apps"]);
}

#[tokio::test]
async fn test_job_list() {
    let mut job_pod = owned_pod("batch", "backup-x", "backup-uid", "Succeeded");
    job_pod["metadata"]["labels"]["batch.kubernetes.io/controller-uid"] = json!("backup-uid");
    let source = FakeSource::new()
        .with(json!({
            "apiVersion": "batch/v1", "kind": "Job",
            "metadata": {"name": "backup", "namespace": "batch", "uid": "backup-uid"},
            "spec": {"completions": 1, "template": {"spec": {
                "restartPolicy": "Never", "containers": [{"name": "b", "image": "backup:1"}]}}},
            "status": {"succeeded": 1, "conditions": [{"type": "Complete", "status": "True"}]}
        }))
        .with(job_pod);
    let channels = ResourceChannels::new(Arc::new(source));

    let scope = NamespaceScope::same("batch");
    let list = get_job_list(&channels, None, &scope, &DataSelectQuery::default())
        .await
        .unwrap();
    assert_eq!(list.jobs.len(), 1);
    assert_eq!(list.jobs[0].pods.succeeded, 1);
    assert_eq!(list.jobs[0].job_status.status, "Succeeded");
}

#[tokio::test]
async fn test_event_list_fills_missing_types() {
    let source = FakeSource::new()
        .with(common::event("default", "e1", "web-1", "FailedMount"))
        .with(common::event("default", "e2", "web-1", "Pulled"));
    let channels = ResourceChannels::new(Arc::new(source));
    let query = DataSelectQuery::from_params(None, Some("a,name"), None, None, None).unwrap();

    let list = get_event_list(&channels, &NamespaceScope::All, &query).await.unwrap();
    let types: Vec<_> = list.events.iter().map(|e| e.type_.as_str()).collect();
    assert_eq!(types, vec!["Warning", "Normal"]);
}

#[tokio::test]
async fn test_events_for_one_involved_object() {
    let source = FakeSource::new()
        .with(common::event("default", "e1", "web-1", "FailedMount"))
        .with(common::event("default", "e2", "web-2", "Pulled"))
        .with(common::event("staging", "e3", "web-1", "Pulled"));
    let channels = ResourceChannels::new(Arc::new(source));

    let list = get_events_for_resource(&channels, "default", "web-1", &DataSelectQuery::default())
        .await
        .unwrap();
    assert_eq!(list.list_meta.total_items, 1);
    assert_eq!(list.events[0].reason, "FailedMount");

    let denied = ResourceChannels::new(Arc::new(FakeSource::new().failing("Event", 403)));
    let list = get_events_for_resource(&denied, "default", "web-1", &DataSelectQuery::default())
        .await
        .unwrap();
    assert!(list.events.is_empty());
    assert_eq!(list.errors.len(), 1);
}
