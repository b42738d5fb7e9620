#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::serde_json::{self, Value};
use kube::api::{ApiResource, DynamicObject};
use kube::core::ErrorResponse;
use navidash::error::{Error, Result};
use navidash::k8s::source::{ClusterKind, ListOptions, ListSource, NamespacedKind};
use navidash::metric::{
    Metric, MetricName, MetricPoint, MetricSource, MetricSubject, SeriesByResource,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub fn api_error(code: u16) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("request failed with {code}"),
        reason: "Testing".to_string(),
        code,
    }))
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn matches_labels(object: &Value, selector: &str) -> bool {
    selector.split(',').all(|term| {
        let Some((key, expected)) = term.split_once('=') else {
            return false;
        };
        lookup(object, "metadata.labels")
            .and_then(|labels| labels.get(key))
            .and_then(Value::as_str)
            == Some(expected)
    })
}

fn matches_fields(object: &Value, selector: &str) -> bool {
    selector.split(',').all(|term| {
        let Some((path, expected)) = term.split_once('=') else {
            return false;
        };
        lookup(object, path).and_then(Value::as_str) == Some(expected)
    })
}

/// In-memory cluster: objects are stored as json by kind
#[derive(Default)]
pub struct FakeSource {
    objects: HashMap<String, Vec<Value>>,
    failures: HashMap<String, u16>,
    gate: Option<(String, Notify)>,
    pub list_calls: AtomicUsize,
}

impl FakeSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object; its kind is read from the `kind` field
    #[must_use]
    pub fn with(mut self, object: Value) -> Self {
        let kind = object["kind"].as_str().unwrap_or_default().to_string();
        self.objects.entry(kind).or_default().push(object);
        self
    }

    /// Make every call for `kind` fail with an api error of `code`
    #[must_use]
    pub fn failing(mut self, kind: &str, code: u16) -> Self {
        self.failures.insert(kind.to_string(), code);
        self
    }

    /// Hold every `get` until `kind` is listed with a field selector;
    /// a get still waiting after a second fails with 504
    #[must_use]
    pub fn gets_wait_for_listing(mut self, kind: &str) -> Self {
        self.gate = Some((kind.to_string(), Notify::new()));
        self
    }

    async fn wait_for_gate(&self) -> Result<()> {
        let Some((_, listed)) = &self.gate else {
            return Ok(());
        };
        tokio::time::timeout(Duration::from_secs(1), listed.notified())
            .await
            .map_err(|_| api_error(504))
    }

    fn select(
        &self,
        kind: &str,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<Value>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((gated, listed)) = &self.gate {
            if gated == kind && options.field_selector.is_some() {
                listed.notify_one();
            }
        }
        if let Some(code) = self.failures.get(kind) {
            return Err(api_error(*code));
        }
        Ok(self
            .objects
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|o| {
                namespace.is_none_or(|ns| {
                    lookup(o, "metadata.namespace").and_then(Value::as_str) == Some(ns)
                })
            })
            .filter(|o| {
                options
                    .label_selector
                    .as_deref()
                    .is_none_or(|s| matches_labels(o, s))
            })
            .filter(|o| {
                options
                    .field_selector
                    .as_deref()
                    .is_none_or(|s| matches_fields(o, s))
            })
            .cloned()
            .collect())
    }

    fn find(&self, kind: &str, namespace: Option<&str>, name: &str) -> Result<Value> {
        self.select(kind, namespace, &ListOptions::default())?
            .into_iter()
            .find(|o| lookup(o, "metadata.name").and_then(Value::as_str) == Some(name))
            .ok_or_else(|| Error::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }
}

fn decode<K: serde::de::DeserializeOwned>(values: Vec<Value>) -> Result<Vec<K>> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(Error::from))
        .collect()
}

#[async_trait]
impl ListSource for FakeSource {
    async fn list_namespaced<K: NamespacedKind>(
        &self,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<K>> {
        decode(self.select(&K::kind(&()), namespace, options)?)
    }

    async fn list_cluster<K: ClusterKind>(&self, options: &ListOptions) -> Result<Vec<K>> {
        decode(self.select(&K::kind(&()), None, options)?)
    }

    async fn get<K: NamespacedKind>(&self, namespace: &str, name: &str) -> Result<K> {
        self.wait_for_gate().await?;
        let value = self.find(&K::kind(&()), Some(namespace), name)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<DynamicObject>> {
        decode(self.select(&resource.kind, namespace, options)?)
    }

    async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        self.wait_for_gate().await?;
        let value = self.find(&resource.kind, namespace, name)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Metric source returning one constant point per metric for every subject
#[derive(Default)]
pub struct FakeMetrics {
    pub fail: bool,
    pub requests: Mutex<Vec<usize>>,
}

impl FakeMetrics {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MetricSource for FakeMetrics {
    async fn metrics_for(
        &self,
        subjects: &[MetricSubject],
        names: &[MetricName],
    ) -> Result<SeriesByResource> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(subjects.len());
        }
        if self.fail {
            return Err(Error::MetricSource("metrics unavailable".to_string()));
        }
        let timestamp = chrono::Utc::now();
        Ok(subjects
            .iter()
            .map(|subject| {
                let metrics = names
                    .iter()
                    .map(|name| {
                        Metric::new(*name, vec![MetricPoint { timestamp, value: 10.0 }])
                            .labeled(subject.selector.kind, subject.selector.name.clone())
                    })
                    .collect();
                (subject.selector.uid.clone(), metrics)
            })
            .collect())
    }
}

pub fn pod(namespace: &str, name: &str, phase: &str) -> Value {
    serde_json::json!({
        "apiVersion": "v1", "kind": "Pod",
        "metadata": {
            "name": name, "namespace": namespace, "uid": format!("{name}-uid"),
            "labels": {"app": name.split('-').next().unwrap_or(name)}
        },
        "spec": {"containers": [{"name": "main", "image": "nginx:1.27"}]},
        "status": {"phase": phase}
    })
}

pub fn owned_pod(namespace: &str, name: &str, owner_uid: &str, phase: &str) -> Value {
    let mut value = pod(namespace, name, phase);
    value["metadata"]["ownerReferences"] = serde_json::json!([{
        "apiVersion": "apps/v1", "kind": "ReplicaSet", "name": "owner",
        "uid": owner_uid, "controller": true
    }]);
    value
}

pub fn event(namespace: &str, name: &str, involved: &str, reason: &str) -> Value {
    serde_json::json!({
        "apiVersion": "v1", "kind": "Event",
        "metadata": {"name": name, "namespace": namespace, "uid": format!("{name}-uid")},
        "involvedObject": {"kind": "Pod", "name": involved, "namespace": namespace,
            "uid": format!("{involved}-uid")},
        "reason": reason,
        "message": format!("{reason} on {involved}")
    })
}
