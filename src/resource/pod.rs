use k8s_openapi::api::core::v1::{Event, Pod};
use serde::Serialize;
use std::slice;
use std::sync::Arc;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, TypeMeta, container_images, pod_phase};
use super::event::{EventItem, EventList, fill_event_types, pod_warnings, to_event_list};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    CachedResources, ComparableValue, DataCell, DataSelectQuery, MetricQuery, PropertyName,
    object_property, object_selector, select_with_metrics,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::ListSource;
use crate::kind::ResourceKind;
use crate::metric::{Metric, MetricPromises, MetricSource, ResourceSelector};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    /// Phase, or the reason a container is waiting or terminated
    pub status: String,
    pub pod_phase: String,
    pub restart_count: i32,
    pub node_name: Option<String>,
    pub container_images: Vec<String>,
    pub metrics: Vec<Metric>,
    pub warnings: Vec<EventItem>,
}

impl PodItem {
    #[must_use]
    pub fn new(pod: &Pod, metrics: Vec<Metric>, warnings: Vec<EventItem>) -> Self {
        Self {
            object_meta: ObjectMeta::from(&pod.metadata),
            type_meta: TypeMeta::new(ResourceKind::Pod),
            status: pod_status(pod),
            pod_phase: pod_phase(pod).to_string(),
            restart_count: restart_count(pod),
            node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            container_images: container_images(pod.spec.as_ref()),
            metrics,
            warnings,
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodList {
    pub list_meta: ListMeta,
    pub pods: Vec<PodItem>,
    pub cumulative_metrics: Vec<Metric>,
    pub errors: NonCriticalErrors,
}

/// Owner that controls a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRef {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerItem {
    pub name: String,
    pub image: String,
    pub ready: bool,
    pub restart_count: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodDetail {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub status: String,
    pub pod_phase: String,
    pub pod_ip: Option<String>,
    pub node_name: Option<String>,
    pub restart_count: i32,
    pub controller: Option<ControllerRef>,
    pub containers: Vec<ContainerItem>,
    pub metrics: Vec<Metric>,
    pub event_list: EventList,
    pub errors: NonCriticalErrors,
}

/// Sum of container restarts
#[must_use]
pub fn restart_count(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map_or(0, |statuses| statuses.iter().map(|c| c.restart_count).sum())
}

/// Phase of the pod, or the reason its first stuck container gives
#[must_use]
pub fn pod_status(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }
    let stuck = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|c| c.state.as_ref())
        .find_map(|state| {
            state
                .waiting
                .as_ref()
                .and_then(|w| w.reason.clone())
                .or_else(|| state.terminated.as_ref().and_then(|t| t.reason.clone()))
        });
    stuck.unwrap_or_else(|| pod_phase(pod).to_string())
}

impl DataCell for Pod {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(pod_status(self).into()),
            PropertyName::Restarts => Some(restart_count(self).into()),
            other => object_property(&self.metadata, other),
        }
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Pod)
    }
}

/// Select `pods` and attach metrics and warning events
pub async fn to_pod_list(
    pods: Vec<Pod>,
    events: &[Event],
    mut errors: NonCriticalErrors,
    query: &DataSelectQuery,
    metrics: Option<Arc<dyn MetricSource>>,
) -> PodList {
    let (selection, promises) =
        select_with_metrics(pods, query, metrics, &CachedResources::default());
    let mut metrics = promises.resolve_into(&mut errors).await;

    let pods = selection
        .cells
        .iter()
        .map(|pod| {
            let uid = pod.metadata.uid.as_deref().unwrap_or_default();
            PodItem::new(
                pod,
                metrics.per_item.remove(uid).unwrap_or_default(),
                pod_warnings(events, slice::from_ref(pod)),
            )
        })
        .collect();

    PodList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        pods,
        cumulative_metrics: metrics.cumulative,
        errors,
    }
}

/// Pods in `scope` with their warnings and metrics
///
/// # Errors
///
/// Fails when the pod listing fails for any reason other than authorization
pub async fn get_pod_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<PodList> {
    info!("Getting list of pods in {:?}", scope);
    let pods = channels.pods(scope);
    let events = channels.events(scope);

    let mut errors = NonCriticalErrors::new();
    let pods = errors.append(pods.resolve().await)?.unwrap_or_default();
    let mut events = errors.absorb(events.resolve().await);
    fill_event_types(&mut events);

    Ok(to_pod_list(pods, &events, errors, query, metrics).await)
}

/// One pod with its containers, controller, metrics and events
///
/// # Errors
///
/// Fails when the pod can not be fetched
pub async fn get_pod_detail<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    namespace: &str,
    name: &str,
) -> Result<PodDetail> {
    info!("Getting details of {} pod in {} namespace", name, namespace);
    let events = channels.events_for(&NamespaceScope::same(namespace), name);
    let pod: Pod = channels.source().get(namespace, name).await?;

    let mut errors = NonCriticalErrors::new();
    let promises = MetricPromises::start(
        vec![pod.resource_selector()],
        Vec::new(),
        MetricQuery::PerItem,
        metrics,
        CachedResources::default(),
    );
    let events = errors.absorb(events.resolve().await);
    let event_list = to_event_list(events, &DataSelectQuery::default());
    let mut pod_metrics = promises.resolve_into(&mut errors).await;

    let status = pod.status.as_ref();
    let container_statuses = status.and_then(|s| s.container_statuses.as_deref()).unwrap_or_default();
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| {
                    let state = container_statuses.iter().find(|s| s.name == c.name);
                    ContainerItem {
                        name: c.name.clone(),
                        image: c.image.clone().unwrap_or_default(),
                        ready: state.is_some_and(|s| s.ready),
                        restart_count: state.map_or(0, |s| s.restart_count),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let controller = pod
        .metadata
        .owner_references
        .as_ref()
        .and_then(|owners| owners.iter().find(|o| o.controller == Some(true)))
        .map(|o| ControllerRef {
            kind: o.kind.clone(),
            name: o.name.clone(),
            uid: o.uid.clone(),
        });

    let uid = pod.metadata.uid.clone().unwrap_or_default();
    Ok(PodDetail {
        object_meta: ObjectMeta::from(&pod.metadata),
        type_meta: TypeMeta::new(ResourceKind::Pod),
        status: pod_status(&pod),
        pod_phase: pod_phase(&pod).to_string(),
        pod_ip: status.and_then(|s| s.pod_ip.clone()),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        restart_count: restart_count(&pod),
        controller,
        containers,
        metrics: pod_metrics.per_item.remove(&uid).unwrap_or_default(),
        event_list,
        errors,
    })
}
