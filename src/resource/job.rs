use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, PodInfo, TypeMeta, container_images, is_controlled_by};
use super::event::{fill_event_types, pod_warnings};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    CachedResources, ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property,
    object_selector, select_with_metrics,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::ListSource;
use crate::kind::ResourceKind;
use crate::metric::{Metric, MetricSource, ResourceSelector};

/// Labels the job controller stamps on its pods
const CONTROLLER_UID_LABELS: [&str; 2] = ["batch.kubernetes.io/controller-uid", "controller-uid"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub pods: PodInfo,
    pub container_images: Vec<String>,
    pub parallelism: Option<i32>,
    pub completions: Option<i32>,
    pub job_status: JobStatus,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobList {
    pub list_meta: ListMeta,
    pub jobs: Vec<JobItem>,
    pub cumulative_metrics: Vec<Metric>,
    pub errors: NonCriticalErrors,
}

impl DataCell for Job {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(job_status(self).status.into()),
            _ => object_property(&self.metadata, name),
        }
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Job).with_label_selector(
            self.spec
                .as_ref()
                .and_then(|s| s.selector.as_ref())
                .and_then(|s| s.match_labels.clone()),
        )
    }
}

/// Pods created by `job`, matched on the controller uid label or owner reference
#[must_use]
pub fn job_pods(job: &Job, pods: &[Pod]) -> Vec<Pod> {
    let Some(uid) = job.metadata.uid.as_deref() else {
        return Vec::new();
    };
    pods.iter()
        .filter(|pod| pod.metadata.namespace == job.metadata.namespace)
        .filter(|pod| {
            let labelled = pod.metadata.labels.as_ref().is_some_and(|labels| {
                CONTROLLER_UID_LABELS
                    .iter()
                    .any(|key| labels.get(*key).map(String::as_str) == Some(uid))
            });
            labelled || is_controlled_by(&pod.metadata, uid)
        })
        .cloned()
        .collect()
}

/// Summarize the job conditions: a true `Failed` wins over `Complete`
#[must_use]
pub fn job_status(job: &Job) -> JobStatus {
    let conditions = job
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    let active = |kind: &str| {
        conditions
            .iter()
            .find(|c| c.type_ == kind && c.status == "True")
    };

    if let Some(failed) = active("Failed") {
        return JobStatus {
            status: "Failed".to_string(),
            message: failed.message.clone(),
        };
    }
    if active("Complete").is_some() {
        return JobStatus {
            status: "Succeeded".to_string(),
            message: None,
        };
    }
    JobStatus {
        status: "Running".to_string(),
        message: None,
    }
}

#[must_use]
pub fn to_job_item(job: &Job, pods: &[Pod], events: &[Event]) -> JobItem {
    let owned = job_pods(job, pods);
    let spec = job.spec.as_ref();
    let status = job.status.as_ref();
    let current = status.and_then(|s| s.active).unwrap_or(0)
        + status.and_then(|s| s.succeeded).unwrap_or(0)
        + status.and_then(|s| s.failed).unwrap_or(0);

    JobItem {
        object_meta: ObjectMeta::from(&job.metadata),
        type_meta: TypeMeta::new(ResourceKind::Job),
        pods: PodInfo::new(current, spec.and_then(|s| s.completions), &owned)
            .with_warnings(pod_warnings(events, &owned)),
        container_images: container_images(spec.and_then(|s| s.template.spec.as_ref())),
        parallelism: spec.and_then(|s| s.parallelism),
        completions: spec.and_then(|s| s.completions),
        job_status: job_status(job),
    }
}

/// Jobs in `scope` with their pod counts and status
///
/// # Errors
///
/// Fails when the job listing fails for any reason other than authorization
pub async fn get_job_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<JobList> {
    info!("Getting list of jobs in {:?}", scope);
    let jobs = channels.jobs(scope);
    let pods = channels.pods(scope);
    let events = channels.events(scope);

    let mut errors = NonCriticalErrors::new();
    let jobs = errors.append(jobs.resolve().await)?.unwrap_or_default();
    let pods = errors.absorb(pods.resolve().await);
    let mut events = errors.absorb(events.resolve().await);
    fill_event_types(&mut events);

    let cache = CachedResources::with_pods(pods);
    let (selection, promises) = select_with_metrics(jobs, query, metrics, &cache);
    let metrics = promises.resolve_into(&mut errors).await;

    Ok(JobList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        jobs: selection
            .cells
            .iter()
            .map(|job| to_job_item(job, cache.pods(), &events))
            .collect(),
        cumulative_metrics: metrics.cumulative,
        errors,
    })
}
