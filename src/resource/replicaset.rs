use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Event, Pod, Service};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::common::{
    ListMeta, ObjectMeta, PodInfo, TypeMeta, container_images, controller_pod_info,
    filter_pods_by_controller,
};
use super::event::{EventList, fill_event_types, to_event_list};
use super::pod::{PodList, to_pod_list};
use super::service::{ServiceList, to_service_list};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    CachedResources, ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property,
    object_selector, select_with_metrics,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::{ListOptions, ListSource};
use crate::k8s::utils::labels_match;
use crate::kind::ResourceKind;
use crate::metric::{Metric, MetricSource, ResourceSelector};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub pods: PodInfo,
    pub container_images: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetList {
    pub list_meta: ListMeta,
    pub replica_sets: Vec<ReplicaSetItem>,
    pub cumulative_metrics: Vec<Metric>,
    pub errors: NonCriticalErrors,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSetDetail {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub pod_info: PodInfo,
    pub selector: Option<BTreeMap<String, String>>,
    pub pod_list: PodList,
    pub service_list: ServiceList,
    pub event_list: EventList,
    pub errors: NonCriticalErrors,
}

impl DataCell for ReplicaSet {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        object_property(&self.metadata, name)
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::ReplicaSet).with_label_selector(
            self.spec
                .as_ref()
                .and_then(|s| s.selector.match_labels.clone()),
        )
    }
}

/// Pod counts of `replica_set` from the pods it controls
#[must_use]
pub fn replica_set_pod_info(replica_set: &ReplicaSet, pods: &[Pod], events: &[Event]) -> PodInfo {
    controller_pod_info(
        replica_set.metadata.uid.as_deref(),
        replica_set.status.as_ref().map_or(0, |s| s.replicas),
        replica_set.spec.as_ref().and_then(|s| s.replicas),
        pods,
        events,
    )
}

#[must_use]
pub fn to_replica_set_item(replica_set: &ReplicaSet, pods: &[Pod], events: &[Event]) -> ReplicaSetItem {
    ReplicaSetItem {
        object_meta: ObjectMeta::from(&replica_set.metadata),
        type_meta: TypeMeta::new(ResourceKind::ReplicaSet),
        pods: replica_set_pod_info(replica_set, pods, events),
        container_images: container_images(
            replica_set
                .spec
                .as_ref()
                .and_then(|s| s.template.as_ref())
                .and_then(|t| t.spec.as_ref()),
        ),
    }
}

/// Select `replica_sets` and attach pod info and metrics
pub async fn to_replica_set_list(
    replica_sets: Vec<ReplicaSet>,
    pods: Vec<Pod>,
    events: &[Event],
    mut errors: NonCriticalErrors,
    query: &DataSelectQuery,
    metrics: Option<Arc<dyn MetricSource>>,
) -> ReplicaSetList {
    let cache = CachedResources::with_pods(pods);
    let (selection, promises) = select_with_metrics(replica_sets, query, metrics, &cache);
    let metrics = promises.resolve_into(&mut errors).await;

    ReplicaSetList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        replica_sets: selection
            .cells
            .iter()
            .map(|rs| to_replica_set_item(rs, cache.pods(), events))
            .collect(),
        cumulative_metrics: metrics.cumulative,
        errors,
    }
}

/// Replica sets in `scope` with their pod counts
///
/// # Errors
///
/// Fails when the replica set listing fails for any reason other than authorization
pub async fn get_replica_set_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<ReplicaSetList> {
    info!("Getting list of replica sets in {:?}", scope);
    let replica_sets = channels.replica_sets(scope, ListOptions::default());
    let pods = channels.pods(scope);
    let events = channels.events(scope);

    let mut errors = NonCriticalErrors::new();
    let replica_sets = errors.append(replica_sets.resolve().await)?.unwrap_or_default();
    let pods = errors.absorb(pods.resolve().await);
    let mut events = errors.absorb(events.resolve().await);
    fill_event_types(&mut events);

    Ok(to_replica_set_list(replica_sets, pods, &events, errors, query, metrics).await)
}

/// One replica set with its pods, the services selecting them, and events
///
/// # Errors
///
/// Fails when the replica set can not be fetched
pub async fn get_replica_set_detail<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    namespace: &str,
    name: &str,
    query: &DataSelectQuery,
) -> Result<ReplicaSetDetail> {
    info!("Getting details of {} replica set in {} namespace", name, namespace);
    let scope = NamespaceScope::same(namespace);
    let pods = channels.pods(&scope);
    let services = channels.services(&scope);
    let pod_events = channels.events(&scope);
    let related_events = channels.events_for(&scope, name);

    let replica_set: ReplicaSet = channels.source().get(namespace, name).await?;

    let mut errors = NonCriticalErrors::new();
    let pods = errors.absorb(pods.resolve().await);
    let services: Vec<Service> = errors.absorb(services.resolve().await);
    let mut pod_events = errors.absorb(pod_events.resolve().await);
    fill_event_types(&mut pod_events);
    let event_list = to_event_list(
        errors.absorb(related_events.resolve().await),
        &DataSelectQuery::default(),
    );

    let owned = filter_pods_by_controller(replica_set.metadata.uid.as_deref(), &pods);
    let template_labels = replica_set
        .spec
        .as_ref()
        .and_then(|s| s.template.as_ref())
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.labels.clone());
    let selecting: Vec<Service> = services
        .into_iter()
        .filter(|svc| {
            svc.spec
                .as_ref()
                .and_then(|s| s.selector.as_ref())
                .is_some_and(|selector| labels_match(selector, template_labels.as_ref()))
        })
        .collect();

    let pod_info = replica_set_pod_info(&replica_set, &pods, &pod_events);
    let pod_list = to_pod_list(owned, &pod_events, NonCriticalErrors::new(), query, metrics).await;

    Ok(ReplicaSetDetail {
        object_meta: ObjectMeta::from(&replica_set.metadata),
        type_meta: TypeMeta::new(ResourceKind::ReplicaSet),
        pod_info,
        selector: replica_set
            .spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.clone()),
        pod_list,
        service_list: to_service_list(selecting, &DataSelectQuery::default()),
        event_list,
        errors,
    })
}
