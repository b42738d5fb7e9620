mod common;

use common::{FakeMetrics, FakeSource, event, pod};
use navidash::channels::{NamespaceScope, ResourceChannels};
use navidash::dataselect::DataSelectQuery;
use navidash::metric::{MetricName, MetricSource};
use navidash::resource::pod::{get_pod_detail, get_pod_list};
use std::sync::Arc;

fn names(list: &navidash::resource::pod::PodList) -> Vec<&str> {
    list.pods.iter().map(|p| p.object_meta.name.as_str()).collect()
}

fn five_pods() -> FakeSource {
    ["a1", "b2", "a3", "b1", "a2"]
        .iter()
        .fold(FakeSource::new(), |source, name| {
            source.with(pod("default", name, "Running"))
        })
}

fn query(items_per_page: &str, page: &str) -> DataSelectQuery {
    let (filter, sort) = (Some("name,a"), Some("a,name"));
    DataSelectQuery::from_params(filter, sort, Some(items_per_page), Some(page), None).unwrap()
}

#[tokio::test]
async fn test_filter_sort_and_second_page() {
    let channels = ResourceChannels::new(Arc::new(five_pods()));
    let scope = NamespaceScope::same("default");
    let list = get_pod_list(&channels, None, &scope, &query("2", "2"))
        .await
        .unwrap();

    assert_eq!(list.list_meta.total_items, 3);
    assert_eq!(names(&list), vec!["a3"]);
    assert!(list.errors.is_empty());
}

#[tokio::test]
async fn test_page_past_the_end_returns_everything() {
    let channels = ResourceChannels::new(Arc::new(five_pods()));
    let query = DataSelectQuery::from_params(None, None, Some("10"), Some("100"), None).unwrap();
    let list = get_pod_list(&channels, None, &NamespaceScope::All, &query)
        .await
        .unwrap();

    assert_eq!(list.list_meta.total_items, 5);
    assert_eq!(names(&list), vec!["a1", "b2", "a3", "b1", "a2"]);
}

#[tokio::test]
async fn test_pages_cover_the_filtered_set() {
    let channels = ResourceChannels::new(Arc::new(five_pods()));
    let mut seen = Vec::new();
    for page in ["1", "2"] {
        let list = get_pod_list(&channels, None, &NamespaceScope::All, &query("2", page))
            .await
            .unwrap();
        seen.extend(list.pods.into_iter().map(|p| p.object_meta.name));
    }
    assert_eq!(seen, vec!["a1", "a2", "a3"]);
}

#[tokio::test]
async fn test_explicit_namespaces_narrow_the_list() {
    let source = FakeSource::new()
        .with(pod("team-a", "web-1", "Running"))
        .with(pod("team-b", "web-2", "Running"))
        .with(pod("team-c", "web-3", "Running"));
    let channels = ResourceChannels::new(Arc::new(source));
    let scope = NamespaceScope::from_namespaces(vec!["team-a".to_string(), "team-b".to_string()]);

    let list = get_pod_list(&channels, None, &scope, &DataSelectQuery::default())
        .await
        .unwrap();
    assert_eq!(names(&list), vec!["web-1", "web-2"]);
}

#[tokio::test]
async fn test_unreadable_events_degrade_the_list() {
    for code in [403, 500] {
        let source = five_pods().failing("Event", code);
        let channels = ResourceChannels::new(Arc::new(source));
        let list = get_pod_list(&channels, None, &NamespaceScope::All, &DataSelectQuery::default())
            .await
            .unwrap();

        assert_eq!(list.pods.len(), 5);
        assert_eq!(list.errors.len(), 1);
    }
}

#[tokio::test]
async fn test_forbidden_pods_yield_empty_list() {
    let channels = ResourceChannels::new(Arc::new(five_pods().failing("Pod", 403)));
    let list = get_pod_list(&channels, None, &NamespaceScope::All, &DataSelectQuery::default())
        .await
        .unwrap();

    assert!(list.pods.is_empty());
    assert_eq!(list.errors.len(), 1);
}

#[tokio::test]
async fn test_failing_pods_abort_the_list() {
    let channels = ResourceChannels::new(Arc::new(five_pods().failing("Pod", 500)));
    let error = get_pod_list(&channels, None, &NamespaceScope::All, &DataSelectQuery::default())
        .await
        .unwrap_err();
    assert_eq!(error.status_code(), 500);
}

#[tokio::test]
async fn test_warnings_attach_to_unhealthy_pods() {
    let source = FakeSource::new()
        .with(pod("default", "web-1", "Pending"))
        .with(pod("default", "web-2", "Running"))
        .with(event("default", "e1", "web-1", "FailedScheduling"))
        .with(event("default", "e2", "web-1", "FailedScheduling"))
        .with(event("default", "e3", "web-2", "BackOff"));
    let channels = ResourceChannels::new(Arc::new(source));
    let list = get_pod_list(&channels, None, &NamespaceScope::All, &DataSelectQuery::default())
        .await
        .unwrap();

    assert_eq!(list.pods[0].warnings.len(), 1);
    assert_eq!(list.pods[0].warnings[0].reason, "FailedScheduling");
    assert!(list.pods[1].warnings.is_empty());
}

#[tokio::test]
async fn test_metrics_per_page_and_cumulative_over_filter() {
    let channels = ResourceChannels::new(Arc::new(five_pods()));
    let metrics: Arc<dyn MetricSource> = Arc::new(FakeMetrics::default());
    let query =
        DataSelectQuery::from_params(Some("name,a"), None, Some("1"), Some("1"), Some("both"))
            .unwrap();

    let list = get_pod_list(&channels, Some(metrics), &NamespaceScope::All, &query)
        .await
        .unwrap();

    assert_eq!(list.pods.len(), 1);
    assert_eq!(list.pods[0].metrics.len(), MetricName::ALL.len());
    let cpu = list
        .cumulative_metrics
        .iter()
        .find(|m| m.metric_name == MetricName::CpuUsageRate)
        .unwrap();
    assert_eq!(cpu.latest().unwrap().value, 30.0);
    assert!(list.errors.is_empty());
}

#[tokio::test]
async fn test_metric_failure_is_not_critical() {
    let channels = ResourceChannels::new(Arc::new(five_pods()));
    let metrics: Arc<dyn MetricSource> = Arc::new(FakeMetrics::failing());
    let query = DataSelectQuery::standard_metrics();

    let list = get_pod_list(&channels, Some(metrics), &NamespaceScope::All, &query)
        .await
        .unwrap();

    assert_eq!(list.pods.len(), 5);
    assert!(list.cumulative_metrics.is_empty());
    assert!(list.pods.iter().all(|p| p.metrics.is_empty()));
    assert_eq!(list.errors.len(), 1);
}

#[tokio::test]
async fn test_no_metric_source_means_no_metrics() {
    let channels = ResourceChannels::new(Arc::new(five_pods()));
    let list = get_pod_list(
        &channels,
        None,
        &NamespaceScope::All,
        &DataSelectQuery::standard_metrics(),
    )
    .await
    .unwrap();

    assert!(list.cumulative_metrics.is_empty());
    assert!(list.errors.is_empty());
}

#[tokio::test]
async fn test_pod_detail() {
    let source = five_pods().with(event("default", "e1", "a1", "Pulled"));
    let channels = ResourceChannels::new(Arc::new(source));

    let detail = get_pod_detail(&channels, None, "default", "a1").await.unwrap();
    assert_eq!(detail.object_meta.name, "a1");
    assert_eq!(detail.event_list.events.len(), 1);

    let missing = get_pod_detail(&channels, None, "default", "zz").await.unwrap_err();
    assert_eq!(missing.status_code(), 404);
}
