//! Upstream listing capability.
//!
//! [`ListSource`] is the seam between the retrieval core and the cluster api.
//! [`KubeSource`] is the production implementation over `kube::Client`;
//! tests supply in-memory sources.

use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::core::NamespaceResourceScope;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

use super::utils::format_label_selector;

/// Any namespaced `k8s-openapi` kind
pub trait NamespacedKind:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + DeserializeOwned
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> NamespacedKind for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// Any `k8s-openapi` kind listed across the whole cluster (namespaces, nodes)
pub trait ClusterKind:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
}

impl<K> ClusterKind for K where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
}

/// Narrowing applied to a list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub limit: Option<u32>,
}

impl ListOptions {
    /// Select by exact label matches; an empty map selects everything
    #[must_use]
    pub fn with_labels(labels: &BTreeMap<String, String>) -> Self {
        Self {
            label_selector: (!labels.is_empty()).then(|| format_label_selector(labels)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fields(field_selector: impl Into<String>) -> Self {
        Self {
            field_selector: Some(field_selector.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl From<&ListOptions> for ListParams {
    fn from(options: &ListOptions) -> Self {
        Self {
            label_selector: options.label_selector.clone(),
            field_selector: options.field_selector.clone(),
            limit: options.limit,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ListSource: Send + Sync {
    /// List a namespaced kind in one namespace, or in all of them for `None`
    async fn list_namespaced<K: NamespacedKind>(
        &self,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<K>>;

    /// List a cluster-scoped kind
    async fn list_cluster<K: ClusterKind>(&self, options: &ListOptions) -> Result<Vec<K>>;

    /// Fetch one named object; a missing object is `Error::NotFound`
    async fn get<K: NamespacedKind>(&self, namespace: &str, name: &str) -> Result<K>;

    /// List objects of a custom resource
    async fn list_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<DynamicObject>>;

    /// Fetch one object of a custom resource
    async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject>;
}

/// [`ListSource`] backed by the cluster api
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn dynamic_api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        namespace.map_or_else(
            || Api::all_with(self.client.clone(), resource),
            |ns| Api::namespaced_with(self.client.clone(), ns, resource),
        )
    }
}

#[async_trait]
impl ListSource for KubeSource {
    async fn list_namespaced<K: NamespacedKind>(
        &self,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<K>> {
        let api: Api<K> = namespace.map_or_else(
            || Api::all(self.client.clone()),
            |ns| Api::namespaced(self.client.clone(), ns),
        );
        debug!(
            "Listing {} in {} ({:?})",
            K::kind(&()),
            namespace.unwrap_or("all namespaces"),
            options
        );
        Ok(api.list(&options.into()).await?.items)
    }

    async fn list_cluster<K: ClusterKind>(&self, options: &ListOptions) -> Result<Vec<K>> {
        let api: Api<K> = Api::all(self.client.clone());
        debug!("Listing {} ({:?})", K::kind(&()), options);
        Ok(api.list(&options.into()).await?.items)
    }

    async fn get<K: NamespacedKind>(&self, namespace: &str, name: &str) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await?.ok_or_else(|| Error::NotFound {
            kind: K::kind(&()).into_owned(),
            name: name.to_string(),
        })
    }

    async fn list_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<DynamicObject>> {
        debug!("Listing {} ({:?})", resource.plural, options);
        let api = self.dynamic_api(resource, namespace);
        Ok(api.list(&options.into()).await?.items)
    }

    async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        let api = self.dynamic_api(resource, namespace);
        api.get_opt(name).await?.ok_or_else(|| Error::NotFound {
            kind: resource.kind.clone(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_options_from_labels() {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        labels.insert("tier".to_string(), "front".to_string());

        let options = ListOptions::with_labels(&labels);
        assert_eq!(options.label_selector.as_deref(), Some("app=web,tier=front"));

        let everything = ListOptions::with_labels(&BTreeMap::new());
        assert_eq!(everything.label_selector, None);
    }

    #[test]
    fn test_list_params_conversion() {
        let options = ListOptions::with_fields("involvedObject.name=web-1").limit(20);
        let params: ListParams = (&options).into();
        assert_eq!(params.field_selector.as_deref(), Some("involvedObject.name=web-1"));
        assert_eq!(params.limit, Some(20));
        assert_eq!(params.label_selector, None);
    }
}
