use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Event, Namespace, Node, Pod, Secret, Service};
use kube::Resource;
use kube::api::{ApiResource, DynamicObject};
use std::sync::Arc;
use tracing::debug;

use super::{NamespaceScope, ResultFuture};
use crate::k8s::source::{ClusterKind, ListOptions, ListSource, NamespacedKind};

/// Starts one concurrent listing per requested resource kind.
///
/// Each starter spawns a task doing exactly one upstream list call and hands
/// back its [`ResultFuture`]. Callers start everything they may need up front
/// and resolve only the futures they use, in any order.
pub struct ResourceChannels<S> {
    source: Arc<S>,
}

impl<S> Clone for ResourceChannels<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: ListSource + 'static> ResourceChannels<S> {
    #[must_use]
    pub const fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// List a namespaced kind in `scope`
    #[must_use]
    pub fn start<K: NamespacedKind>(&self, scope: &NamespaceScope) -> ResultFuture<Vec<K>> {
        self.start_with_options(scope, ListOptions::default())
    }

    /// List a namespaced kind in `scope`, narrowed by selectors and limit
    #[must_use]
    pub fn start_with_options<K: NamespacedKind>(
        &self,
        scope: &NamespaceScope,
        options: ListOptions,
    ) -> ResultFuture<Vec<K>> {
        let source = Arc::clone(&self.source);
        let scope = scope.clone();
        let kind = K::kind(&()).into_owned();
        debug!("Starting {} retrieval in {:?}", kind, scope);

        ResultFuture::spawn(kind, async move {
            let mut items: Vec<K> = source
                .list_namespaced(scope.request_namespace(), &options)
                .await?;
            items.retain(|item| scope.matches(item.meta().namespace.as_deref()));
            Ok(items)
        })
    }

    /// List a cluster-scoped kind
    #[must_use]
    pub fn start_cluster<K: ClusterKind>(&self, options: ListOptions) -> ResultFuture<Vec<K>> {
        let source = Arc::clone(&self.source);
        let kind = K::kind(&()).into_owned();
        debug!("Starting {} retrieval", kind);

        ResultFuture::spawn(kind, async move { source.list_cluster(&options).await })
    }

    /// List objects of a custom resource in `scope`
    #[must_use]
    pub fn start_dynamic(
        &self,
        resource: ApiResource,
        scope: &NamespaceScope,
        options: ListOptions,
    ) -> ResultFuture<Vec<DynamicObject>> {
        let source = Arc::clone(&self.source);
        let scope = scope.clone();
        debug!("Starting {} retrieval in {:?}", resource.plural, scope);

        ResultFuture::spawn(resource.kind.clone(), async move {
            let mut items = source
                .list_dynamic(&resource, scope.request_namespace(), &options)
                .await?;
            items.retain(|item| scope.matches(item.metadata.namespace.as_deref()));
            Ok(items)
        })
    }

    #[must_use]
    pub fn pods(&self, scope: &NamespaceScope) -> ResultFuture<Vec<Pod>> {
        self.start(scope)
    }

    #[must_use]
    pub fn pods_with_options(
        &self,
        scope: &NamespaceScope,
        options: ListOptions,
    ) -> ResultFuture<Vec<Pod>> {
        self.start_with_options(scope, options)
    }

    #[must_use]
    pub fn events(&self, scope: &NamespaceScope) -> ResultFuture<Vec<Event>> {
        self.start(scope)
    }

    /// Events whose involved object has `name`
    #[must_use]
    pub fn events_for(&self, scope: &NamespaceScope, name: &str) -> ResultFuture<Vec<Event>> {
        self.start_with_options(
            scope,
            ListOptions::with_fields(format!("involvedObject.name={name}")),
        )
    }

    #[must_use]
    pub fn services(&self, scope: &NamespaceScope) -> ResultFuture<Vec<Service>> {
        self.start(scope)
    }

    #[must_use]
    pub fn replica_sets(
        &self,
        scope: &NamespaceScope,
        options: ListOptions,
    ) -> ResultFuture<Vec<ReplicaSet>> {
        self.start_with_options(scope, options)
    }

    #[must_use]
    pub fn deployments(&self, scope: &NamespaceScope) -> ResultFuture<Vec<Deployment>> {
        self.start(scope)
    }

    #[must_use]
    pub fn jobs(&self, scope: &NamespaceScope) -> ResultFuture<Vec<Job>> {
        self.start(scope)
    }

    #[must_use]
    pub fn config_maps(&self, scope: &NamespaceScope) -> ResultFuture<Vec<ConfigMap>> {
        self.start(scope)
    }

    #[must_use]
    pub fn secrets(&self, scope: &NamespaceScope) -> ResultFuture<Vec<Secret>> {
        self.start(scope)
    }

    #[must_use]
    pub fn namespaces(&self) -> ResultFuture<Vec<Namespace>> {
        self.start_cluster(ListOptions::default())
    }

    #[must_use]
    pub fn nodes(&self) -> ResultFuture<Vec<Node>> {
        self.start_cluster(ListOptions::default())
    }
}
