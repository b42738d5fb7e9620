//! Resource parsing utilities for Kubernetes CPU and Memory
//!
//! Parses Kubernetes resource quantities (CPU and Memory) into plain numbers
//! and sums container requests/limits into node allocation summaries.

use k8s_openapi::api::core::v1::{Node, Pod, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Parse CPU resource string to millicores
///
/// Examples:
/// - `"12345678n"` -> `12.345678`
/// - `"100m"` -> `100.0`
/// - `"1"` -> `1000.0`
/// - `"0.5"` -> `500.0`
#[must_use]
pub fn parse_cpu(cpu_str: &str) -> Option<f64> {
    let cpu_str = cpu_str.trim();

    if cpu_str.is_empty() {
        return None;
    }

    // nanocores, as reported by the metrics api
    if let Some(nanos) = cpu_str.strip_suffix('n') {
        return nanos.parse::<f64>().ok().map(|n| n / 1_000_000.0);
    }

    if let Some(micros) = cpu_str.strip_suffix('u') {
        return micros.parse::<f64>().ok().map(|u| u / 1000.0);
    }

    if let Some(millis) = cpu_str.strip_suffix('m') {
        return millis.parse::<f64>().ok();
    }

    cpu_str.parse::<f64>().ok().map(|cores| cores * 1000.0)
}

/// Parse memory resource string to bytes
///
/// Examples:
/// - `"128Mi"` -> `134217728`
/// - `"1Gi"` -> `1073741824`
/// - `"500M"` -> `500000000`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn parse_memory(mem_str: &str) -> Option<u64> {
    let mem_str = mem_str.trim();

    if mem_str.is_empty() {
        return None;
    }

    let (num_str, unit) = mem_str
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map_or((mem_str, ""), |(idx, _)| mem_str.split_at(idx));

    let value = num_str.parse::<f64>().ok()?;

    let multiplier = match unit {
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "K" | "k" => 1000.0,
        "M" => 1000.0 * 1000.0,
        "G" => 1000.0 * 1000.0 * 1000.0,
        "T" => 1000.0 * 1000.0 * 1000.0 * 1000.0,
        "" => 1.0,
        _ => {
            warn!("Unknown memory unit: {}", unit);
            return None;
        }
    };

    Some((value * multiplier) as u64)
}

fn quantity_cpu(map: Option<&BTreeMap<String, Quantity>>) -> f64 {
    map.and_then(|m| m.get("cpu"))
        .and_then(|q| parse_cpu(&q.0))
        .unwrap_or(0.0)
}

fn quantity_memory(map: Option<&BTreeMap<String, Quantity>>) -> u64 {
    map.and_then(|m| m.get("memory"))
        .and_then(|q| parse_memory(&q.0))
        .unwrap_or(0)
}

/// Requests and limits of a node's pods against its allocatable capacity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAllocation {
    /// millicores
    pub cpu_requests: f64,
    pub cpu_limits: f64,
    pub cpu_capacity: f64,
    pub cpu_requests_fraction: f64,
    pub cpu_limits_fraction: f64,
    /// bytes
    pub memory_requests: u64,
    pub memory_limits: u64,
    pub memory_capacity: u64,
    pub memory_requests_fraction: f64,
    pub memory_limits_fraction: f64,
    pub allocated_pods: usize,
    pub pod_capacity: u64,
}

fn fraction(used: f64, capacity: f64) -> f64 {
    if capacity <= 0.0 {
        0.0
    } else {
        used / capacity * 100.0
    }
}

impl NodeAllocation {
    /// Sum container requests/limits of `pods` scheduled on `node`.
    ///
    /// Pods whose `spec.nodeName` is not the node are ignored.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn for_node(node: &Node, pods: &[Pod]) -> Self {
        let node_name = node.metadata.name.as_deref();
        let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());

        let mut allocation = Self {
            cpu_capacity: quantity_cpu(allocatable),
            memory_capacity: quantity_memory(allocatable),
            pod_capacity: allocatable
                .and_then(|m| m.get("pods"))
                .and_then(|q| q.0.parse().ok())
                .unwrap_or(0),
            ..Self::default()
        };

        let on_node = pods.iter().filter(|pod| {
            node_name.is_some()
                && pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) == node_name
        });

        for pod in on_node {
            allocation.allocated_pods += 1;
            let Some(spec) = pod.spec.as_ref() else {
                continue;
            };
            for resources in spec.containers.iter().filter_map(|c| c.resources.as_ref()) {
                allocation.add(resources);
            }
        }

        allocation.cpu_requests_fraction = fraction(allocation.cpu_requests, allocation.cpu_capacity);
        allocation.cpu_limits_fraction = fraction(allocation.cpu_limits, allocation.cpu_capacity);
        allocation.memory_requests_fraction = fraction(
            allocation.memory_requests as f64,
            allocation.memory_capacity as f64,
        );
        allocation.memory_limits_fraction = fraction(
            allocation.memory_limits as f64,
            allocation.memory_capacity as f64,
        );
        allocation
    }

    fn add(&mut self, resources: &ResourceRequirements) {
        self.cpu_requests += quantity_cpu(resources.requests.as_ref());
        self.cpu_limits += quantity_cpu(resources.limits.as_ref());
        self.memory_requests += quantity_memory(resources.requests.as_ref());
        self.memory_limits += quantity_memory(resources.limits.as_ref());
    }
}
