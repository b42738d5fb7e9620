use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::{Event, Pod, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

use super::common::{
    ListMeta, ObjectMeta, PodInfo, TypeMeta, container_images, filter_pods_by_controller,
    is_controlled_by,
};
use super::event::{EventList, fill_event_types, pod_warnings, to_event_list};
use super::pod::{PodList, to_pod_list};
use super::replicaset::{ReplicaSetItem, ReplicaSetList, to_replica_set_item, to_replica_set_list};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    CachedResources, ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property,
    object_selector, select_with_metrics,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::{ListOptions, ListSource};
use crate::kind::ResourceKind;
use crate::metric::{Metric, MetricSource, ResourceSelector};

/// Label the deployment controller adds to distinguish replica set templates
const POD_TEMPLATE_HASH_LABEL: &str = "pod-template-hash";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub pods: PodInfo,
    pub container_images: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentList {
    pub list_meta: ListMeta,
    pub deployments: Vec<DeploymentItem>,
    pub cumulative_metrics: Vec<Metric>,
    pub errors: NonCriticalErrors,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusInfo {
    pub replicas: i32,
    pub updated: i32,
    pub available: i32,
    pub unavailable: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateStrategy {
    pub max_surge: Option<String>,
    pub max_unavailable: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetail {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub selector: BTreeMap<String, String>,
    pub status_info: DeploymentStatusInfo,
    pub strategy: String,
    pub min_ready_seconds: i32,
    pub revision_history_limit: Option<i32>,
    pub rolling_update_strategy: Option<RollingUpdateStrategy>,
    pub pod_info: PodInfo,
    pub new_replica_set: Option<ReplicaSetItem>,
    pub old_replica_sets: ReplicaSetList,
    pub pod_list: PodList,
    pub event_list: EventList,
    pub errors: NonCriticalErrors,
}

impl DataCell for Deployment {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        object_property(&self.metadata, name)
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Deployment).with_label_selector(
            self.spec
                .as_ref()
                .and_then(|s| s.selector.match_labels.clone()),
        )
    }
}

/// Replica sets controlled by `deployment`
#[must_use]
pub fn owned_replica_sets(deployment: &Deployment, replica_sets: &[ReplicaSet]) -> Vec<ReplicaSet> {
    let Some(uid) = deployment.metadata.uid.as_deref() else {
        return Vec::new();
    };
    replica_sets
        .iter()
        .filter(|rs| is_controlled_by(&rs.metadata, uid))
        .cloned()
        .collect()
}

/// Pods controlled by any replica set of `deployment`
#[must_use]
pub fn deployment_pods(deployment: &Deployment, replica_sets: &[ReplicaSet], pods: &[Pod]) -> Vec<Pod> {
    let Some(uid) = deployment.metadata.uid.as_deref() else {
        return Vec::new();
    };
    let owned: HashSet<&str> = replica_sets
        .iter()
        .filter(|rs| is_controlled_by(&rs.metadata, uid))
        .filter_map(|rs| rs.metadata.uid.as_deref())
        .collect();
    pods.iter()
        .filter(|pod| owned.iter().any(|rs_uid| is_controlled_by(&pod.metadata, rs_uid)))
        .cloned()
        .collect()
}

fn without_hash(template: &PodTemplateSpec) -> PodTemplateSpec {
    let mut template = template.clone();
    if let Some(labels) = template.metadata.as_mut().and_then(|m| m.labels.as_mut()) {
        labels.remove(POD_TEMPLATE_HASH_LABEL);
    }
    template
}

/// True when `a` and `b` are the same template apart from the pod template hash label
#[must_use]
pub fn equal_ignore_hash(a: &PodTemplateSpec, b: &PodTemplateSpec) -> bool {
    without_hash(a) == without_hash(b)
}

/// Split the replica sets of `deployment` into the one running its current
/// template and the older ones
#[must_use]
pub fn split_replica_sets(
    deployment: &Deployment,
    replica_sets: &[ReplicaSet],
) -> (Option<ReplicaSet>, Vec<ReplicaSet>) {
    let template = deployment.spec.as_ref().map(|s| &s.template);
    let (new, old): (Vec<ReplicaSet>, Vec<ReplicaSet>) = owned_replica_sets(deployment, replica_sets)
        .into_iter()
        .partition(|rs| {
            let rs_template = rs.spec.as_ref().and_then(|s| s.template.as_ref());
            matches!((rs_template, template), (Some(a), Some(b)) if equal_ignore_hash(a, b))
        });
    let mut new = new.into_iter();
    let current = new.next();
    let mut old = old;
    old.extend(new);
    (current, old)
}

#[must_use]
pub fn deployment_pod_info(
    deployment: &Deployment,
    replica_sets: &[ReplicaSet],
    pods: &[Pod],
    events: &[Event],
) -> PodInfo {
    let owned = deployment_pods(deployment, replica_sets, pods);
    PodInfo::new(
        deployment.status.as_ref().and_then(|s| s.replicas).unwrap_or(0),
        deployment.spec.as_ref().and_then(|s| s.replicas),
        &owned,
    )
    .with_warnings(pod_warnings(events, &owned))
}

/// Select `deployments` and attach pod info and metrics
pub async fn to_deployment_list(
    deployments: Vec<Deployment>,
    replica_sets: &[ReplicaSet],
    pods: Vec<Pod>,
    events: &[Event],
    mut errors: NonCriticalErrors,
    query: &DataSelectQuery,
    metrics: Option<Arc<dyn MetricSource>>,
) -> DeploymentList {
    let cache = CachedResources::with_pods(pods);
    let (selection, promises) = select_with_metrics(deployments, query, metrics, &cache);
    let metrics = promises.resolve_into(&mut errors).await;

    let deployments = selection
        .cells
        .iter()
        .map(|deployment| DeploymentItem {
            object_meta: ObjectMeta::from(&deployment.metadata),
            type_meta: TypeMeta::new(ResourceKind::Deployment),
            pods: deployment_pod_info(deployment, replica_sets, cache.pods(), events),
            container_images: container_images(
                deployment.spec.as_ref().and_then(|s| s.template.spec.as_ref()),
            ),
        })
        .collect();

    DeploymentList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        deployments,
        cumulative_metrics: metrics.cumulative,
        errors,
    }
}

/// Deployments in `scope` with their pod counts
///
/// # Errors
///
/// Fails when the deployment listing fails for any reason other than authorization
pub async fn get_deployment_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<DeploymentList> {
    info!("Getting list of deployments in {:?}", scope);
    let deployments = channels.deployments(scope);
    let replica_sets = channels.replica_sets(scope, ListOptions::default());
    let pods = channels.pods(scope);
    let events = channels.events(scope);

    let mut errors = NonCriticalErrors::new();
    let deployments = errors.append(deployments.resolve().await)?.unwrap_or_default();
    let replica_sets = errors.absorb(replica_sets.resolve().await);
    let pods = errors.absorb(pods.resolve().await);
    let mut events = errors.absorb(events.resolve().await);
    fill_event_types(&mut events);

    Ok(to_deployment_list(deployments, &replica_sets, pods, &events, errors, query, metrics).await)
}

fn int_or_string(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(i) => i.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

/// One deployment with its replica sets, pods and events
///
/// # Errors
///
/// Fails when the deployment can not be fetched
pub async fn get_deployment_detail<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    namespace: &str,
    name: &str,
    query: &DataSelectQuery,
) -> Result<DeploymentDetail> {
    info!("Getting details of {} deployment in {} namespace", name, namespace);
    let scope = NamespaceScope::same(namespace);
    let replica_sets = channels.replica_sets(&scope, ListOptions::default());
    let pods = channels.pods(&scope);
    let pod_events = channels.events(&scope);
    let related_events = channels.events_for(&scope, name);

    let deployment: Deployment = channels.source().get(namespace, name).await?;

    let mut errors = NonCriticalErrors::new();
    let replica_sets = errors.absorb(replica_sets.resolve().await);
    let pods = errors.absorb(pods.resolve().await);
    let mut pod_events = errors.absorb(pod_events.resolve().await);
    fill_event_types(&mut pod_events);
    let event_list = to_event_list(
        errors.absorb(related_events.resolve().await),
        &DataSelectQuery::default(),
    );

    let (new_rs, old_rs) = split_replica_sets(&deployment, &replica_sets);
    let owned_pods = deployment_pods(&deployment, &replica_sets, &pods);
    let pod_info = deployment_pod_info(&deployment, &replica_sets, &pods, &pod_events);

    let new_replica_set = new_rs.map(|rs| {
        let rs_pods = filter_pods_by_controller(rs.metadata.uid.as_deref(), &pods);
        to_replica_set_item(&rs, &rs_pods, &pod_events)
    });
    let old_replica_sets = to_replica_set_list(
        old_rs,
        pods,
        &pod_events,
        NonCriticalErrors::new(),
        &DataSelectQuery::default(),
        None,
    )
    .await;
    let pod_list = to_pod_list(owned_pods, &pod_events, NonCriticalErrors::new(), query, metrics).await;

    let spec = deployment.spec.as_ref();
    let strategy = spec.and_then(|s| s.strategy.as_ref());
    let status = deployment.status.as_ref();

    Ok(DeploymentDetail {
        object_meta: ObjectMeta::from(&deployment.metadata),
        type_meta: TypeMeta::new(ResourceKind::Deployment),
        selector: spec
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default(),
        status_info: DeploymentStatusInfo {
            replicas: status.and_then(|s| s.replicas).unwrap_or(0),
            updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
            available: status.and_then(|s| s.available_replicas).unwrap_or(0),
            unavailable: status.and_then(|s| s.unavailable_replicas).unwrap_or(0),
        },
        strategy: strategy
            .and_then(|s| s.type_.clone())
            .unwrap_or_else(|| "RollingUpdate".to_string()),
        min_ready_seconds: spec.and_then(|s| s.min_ready_seconds).unwrap_or(0),
        revision_history_limit: spec.and_then(|s| s.revision_history_limit),
        rolling_update_strategy: strategy.and_then(|s| s.rolling_update.as_ref()).map(|ru| {
            RollingUpdateStrategy {
                max_surge: ru.max_surge.as_ref().map(int_or_string),
                max_unavailable: ru.max_unavailable.as_ref().map(int_or_string),
            }
        }),
        pod_info,
        new_replica_set,
        old_replica_sets,
        pod_list,
        event_list,
        errors,
    })
}
