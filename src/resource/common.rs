//! View types and ownership helpers shared by every resource view

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as meta;
use serde::Serialize;
use std::collections::BTreeMap;

use super::event::{EventItem, pod_warnings};
use crate::kind::ResourceKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    /// Filtered count before pagination
    pub total_items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl From<&meta::ObjectMeta> for ObjectMeta {
    fn from(m: &meta::ObjectMeta) -> Self {
        Self {
            name: m.name.clone().unwrap_or_default(),
            namespace: m.namespace.clone(),
            uid: m.uid.clone().unwrap_or_default(),
            labels: m.labels.clone().unwrap_or_default(),
            annotations: m.annotations.clone().unwrap_or_default(),
            creation_timestamp: m.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMeta {
    pub kind: String,
}

impl TypeMeta {
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind: kind.as_str().to_string(),
        }
    }

    /// Kind named after a custom resource definition
    #[must_use]
    pub fn custom(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// Pod counts of a controller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    /// Pods the controller has created
    pub current: i32,
    /// Pods the controller wants; `None` when unspecified
    pub desired: Option<i32>,
    pub running: i32,
    pub pending: i32,
    pub failed: i32,
    pub succeeded: i32,
    pub warnings: Vec<EventItem>,
}

impl PodInfo {
    /// Count `pods` by phase
    #[must_use]
    pub fn new(current: i32, desired: Option<i32>, pods: &[Pod]) -> Self {
        let mut info = Self {
            current,
            desired,
            ..Self::default()
        };
        for pod in pods {
            match pod_phase(pod) {
                "Running" => info.running += 1,
                "Pending" => info.pending += 1,
                "Failed" => info.failed += 1,
                "Succeeded" => info.succeeded += 1,
                _ => {}
            }
        }
        info
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<EventItem>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[must_use]
pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown")
}

/// True when `meta` has a controller owner reference with `uid`
#[must_use]
pub fn is_controlled_by(meta: &meta::ObjectMeta, uid: &str) -> bool {
    meta.owner_references.as_ref().is_some_and(|owners| {
        owners
            .iter()
            .any(|owner| owner.controller == Some(true) && owner.uid == uid)
    })
}

/// Pods controlled by the object with `uid`
#[must_use]
pub fn filter_pods_by_controller(uid: Option<&str>, pods: &[Pod]) -> Vec<Pod> {
    let Some(uid) = uid else {
        return Vec::new();
    };
    pods.iter()
        .filter(|pod| is_controlled_by(&pod.metadata, uid))
        .cloned()
        .collect()
}

#[must_use]
pub fn container_images(spec: Option<&PodSpec>) -> Vec<String> {
    spec.map(|spec| {
        spec.containers
            .iter()
            .filter_map(|c| c.image.clone())
            .collect()
    })
    .unwrap_or_default()
}

/// Pod counts of the controller with `uid`, with warnings of its troubled pods
#[must_use]
pub fn controller_pod_info(
    uid: Option<&str>,
    current: i32,
    desired: Option<i32>,
    pods: &[Pod],
    events: &[Event],
) -> PodInfo {
    let owned = filter_pods_by_controller(uid, pods);
    PodInfo::new(current, desired, &owned).with_warnings(pod_warnings(events, &owned))
}
