use k8s_openapi::api::core::v1::{Node, Pod};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, TypeMeta};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    CachedResources, ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property,
    object_selector, select_with_metrics,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::resources::NodeAllocation;
use crate::k8s::source::ListSource;
use crate::kind::ResourceKind;
use crate::metric::{Metric, MetricSource, ResourceSelector};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    /// Status of the `Ready` condition: True, False or Unknown
    pub ready: String,
    pub unschedulable: bool,
    pub allocated_resources: NodeAllocation,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeList {
    pub list_meta: ListMeta,
    pub nodes: Vec<NodeItem>,
    pub cumulative_metrics: Vec<Metric>,
    pub errors: NonCriticalErrors,
}

#[must_use]
pub fn node_ready(node: &Node) -> String {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map_or_else(|| "Unknown".to_string(), |c| c.status.clone())
}

impl DataCell for Node {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(node_ready(self).into()),
            _ => object_property(&self.metadata, name),
        }
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Node)
    }
}

#[must_use]
pub fn to_node_item(node: &Node, pods: &[Pod], metrics: Vec<Metric>) -> NodeItem {
    NodeItem {
        object_meta: ObjectMeta::from(&node.metadata),
        type_meta: TypeMeta::new(ResourceKind::Node),
        ready: node_ready(node),
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false),
        allocated_resources: NodeAllocation::for_node(node, pods),
        metrics,
    }
}

/// Nodes with their resource allocation and usage
///
/// # Errors
///
/// Fails when the node listing fails for any reason other than authorization
pub async fn get_node_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    query: &DataSelectQuery,
) -> Result<NodeList> {
    info!("Getting list of nodes");
    let nodes = channels.nodes();
    let pods = channels.pods(&NamespaceScope::All);

    let mut errors = NonCriticalErrors::new();
    let nodes = errors.append(nodes.resolve().await)?.unwrap_or_default();
    let pods: Vec<Pod> = errors.absorb(pods.resolve().await);

    let (selection, promises) =
        select_with_metrics(nodes, query, metrics, &CachedResources::default());
    let mut node_metrics = promises.resolve_into(&mut errors).await;

    Ok(NodeList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        nodes: selection
            .cells
            .iter()
            .map(|node| {
                let uid = node.metadata.uid.as_deref().unwrap_or_default();
                to_node_item(node, &pods, node_metrics.per_item.remove(uid).unwrap_or_default())
            })
            .collect(),
        cumulative_metrics: node_metrics.cumulative,
        errors,
    })
}
