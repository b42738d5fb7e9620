use k8s_openapi::api::core::v1::Service;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, TypeMeta};
use super::event::{EventList, fill_event_types, to_event_list};
use super::pod::{PodList, to_pod_list};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property, object_selector,
    select,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::{ListOptions, ListSource};
use crate::kind::ResourceKind;
use crate::metric::{MetricSource, ResourceSelector};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    pub port: i32,
    pub protocol: String,
    pub node_port: Option<i32>,
}

/// Host reachable on a set of ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    /// In-cluster DNS name with the service ports
    pub internal_endpoint: Endpoint,
    /// Load balancer and external addresses with the service ports
    pub external_endpoints: Vec<Endpoint>,
    pub selector: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceList {
    pub list_meta: ListMeta,
    pub services: Vec<ServiceItem>,
    pub errors: NonCriticalErrors,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetail {
    #[serde(flatten)]
    pub service: ServiceItem,
    pub pod_list: PodList,
    pub event_list: EventList,
    pub errors: NonCriticalErrors,
}

fn service_ports(service: &Service) -> Vec<ServicePort> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| ServicePort {
                    port: p.port,
                    protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    node_port: p.node_port,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn external_endpoints(service: &Service) -> Vec<Endpoint> {
    let ports = service_ports(service);
    let ingress_hosts = service
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|ingress| ingress.hostname.clone().or_else(|| ingress.ip.clone()));
    let external_ips = service
        .spec
        .as_ref()
        .and_then(|s| s.external_ips.clone())
        .unwrap_or_default();

    ingress_hosts
        .chain(external_ips)
        .map(|host| Endpoint {
            host,
            ports: ports.clone(),
        })
        .collect()
}

impl From<&Service> for ServiceItem {
    fn from(service: &Service) -> Self {
        let meta = ObjectMeta::from(&service.metadata);
        let spec = service.spec.as_ref();
        let host = meta.namespace.as_ref().map_or_else(
            || meta.name.clone(),
            |ns| format!("{}.{}", meta.name, ns),
        );
        Self {
            internal_endpoint: Endpoint {
                host,
                ports: service_ports(service),
            },
            external_endpoints: external_endpoints(service),
            selector: spec.and_then(|s| s.selector.clone()).unwrap_or_default(),
            type_: spec
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
            object_meta: meta,
            type_meta: TypeMeta::new(ResourceKind::Service),
        }
    }
}

impl DataCell for Service {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Type => self
                .spec
                .as_ref()
                .and_then(|s| s.type_.clone())
                .map(Into::into),
            other => object_property(&self.metadata, other),
        }
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Service)
    }
}

#[must_use]
pub fn to_service_list(services: Vec<Service>, query: &DataSelectQuery) -> ServiceList {
    let selection = select(services, query);
    ServiceList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        services: selection.cells.iter().map(ServiceItem::from).collect(),
        errors: NonCriticalErrors::new(),
    }
}

/// Services in `scope`
///
/// # Errors
///
/// Fails when the service listing fails for any reason other than authorization
pub async fn get_service_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<ServiceList> {
    info!("Getting list of services in {:?}", scope);
    let mut errors = NonCriticalErrors::new();
    let services = errors
        .append(channels.services(scope).resolve().await)?
        .unwrap_or_default();

    let mut list = to_service_list(services, query);
    list.errors = errors;
    Ok(list)
}

/// Pods selected by `service`; a service without a selector targets no pods
///
/// # Errors
///
/// Fails when the pod listing fails for any reason other than authorization
pub async fn get_service_pods<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    service: &Service,
    query: &DataSelectQuery,
) -> Result<PodList> {
    let selector = service
        .spec
        .as_ref()
        .and_then(|s| s.selector.clone())
        .unwrap_or_default();
    let Some(namespace) = service.metadata.namespace.as_deref() else {
        return Ok(PodList::default());
    };
    if selector.is_empty() {
        return Ok(PodList::default());
    }

    let scope = NamespaceScope::same(namespace);
    let pods = channels.pods_with_options(&scope, ListOptions::with_labels(&selector));
    let events = channels.events(&scope);

    let mut errors = NonCriticalErrors::new();
    let pods = errors.append(pods.resolve().await)?.unwrap_or_default();
    let mut events = errors.absorb(events.resolve().await);
    fill_event_types(&mut events);

    Ok(to_pod_list(pods, &events, errors, query, metrics).await)
}

/// One service with the pods it selects and its events
///
/// # Errors
///
/// Fails when the service can not be fetched, or its pods can not be listed
/// for a reason other than authorization
pub async fn get_service_detail<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    metrics: Option<Arc<dyn MetricSource>>,
    namespace: &str,
    name: &str,
    query: &DataSelectQuery,
) -> Result<ServiceDetail> {
    info!("Getting details of {} service in {} namespace", name, namespace);
    let related_events = channels.events_for(&NamespaceScope::same(namespace), name);
    let service: Service = channels.source().get(namespace, name).await?;

    let mut errors = NonCriticalErrors::new();
    let pod_list = get_service_pods(channels, metrics, &service, query).await?;
    let event_list = to_event_list(
        errors.absorb(related_events.resolve().await),
        &DataSelectQuery::default(),
    );

    Ok(ServiceDetail {
        service: ServiceItem::from(&service),
        pod_list,
        event_list,
        errors,
    })
}
