use k8s_openapi::serde_json::Value;
use kube::api::{ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use serde::Serialize;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, TypeMeta};
use super::event::{EventList, to_event_list};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property, object_selector,
    select,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::{ListOptions, ListSource};
use crate::kind::ResourceKind;
use crate::metric::ResourceSelector;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomObjectItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomObjectList {
    pub list_meta: ListMeta,
    pub items: Vec<CustomObjectItem>,
    pub errors: NonCriticalErrors,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomObjectDetail {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    /// Everything besides the metadata, as served
    pub data: Value,
    pub event_list: EventList,
    pub errors: NonCriticalErrors,
}

/// Describe a custom resource by group, version, kind and plural name
#[must_use]
pub fn api_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

impl DataCell for DynamicObject {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        object_property(&self.metadata, name)
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::CustomResource)
    }
}

fn to_custom_item(resource: &ApiResource, object: &DynamicObject) -> CustomObjectItem {
    CustomObjectItem {
        object_meta: ObjectMeta::from(&object.metadata),
        type_meta: TypeMeta::custom(resource.kind.clone()),
    }
}

/// Objects of a custom resource in `scope`
///
/// # Errors
///
/// Fails when the listing fails for any reason other than authorization
pub async fn get_custom_object_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    resource: &ApiResource,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<CustomObjectList> {
    info!("Getting list of {} in {:?}", resource.plural, scope);
    let mut errors = NonCriticalErrors::new();
    let objects = errors
        .append(
            channels
                .start_dynamic(resource.clone(), scope, ListOptions::default())
                .resolve()
                .await,
        )?
        .unwrap_or_default();

    let selection = select(objects, query);
    Ok(CustomObjectList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        items: selection
            .cells
            .iter()
            .map(|object| to_custom_item(resource, object))
            .collect(),
        errors,
    })
}

/// One custom object with its events; `namespace` is `None` for cluster-scoped resources
///
/// # Errors
///
/// Fails when the object can not be fetched
pub async fn get_custom_object_detail<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    resource: &ApiResource,
    namespace: Option<&str>,
    name: &str,
) -> Result<CustomObjectDetail> {
    info!("Getting details of {} {}", resource.kind, name);
    let related_events =
        namespace.map(|ns| channels.events_for(&NamespaceScope::same(ns), name));
    let object = channels
        .source()
        .get_dynamic(resource, namespace, name)
        .await?;

    let mut errors = NonCriticalErrors::new();
    let event_list = match related_events {
        Some(events) => to_event_list(
            errors.absorb(events.resolve().await),
            &DataSelectQuery::default(),
        ),
        None => EventList::default(),
    };

    Ok(CustomObjectDetail {
        object_meta: ObjectMeta::from(&object.metadata),
        type_meta: TypeMeta::custom(resource.kind.clone()),
        data: object.data,
        event_list,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataselect::SortQuery;
    use k8s_openapi::serde_json::{self, json};

    #[test]
    fn test_api_resource() {
        let resource = api_resource("example.com", "v1", "Widget", "widgets");
        assert_eq!(resource.api_version, "example.com/v1");
        assert_eq!(resource.plural, "widgets");
        assert_eq!(resource.kind, "Widget");
    }

    #[test]
    fn test_sort_custom_objects_by_name() {
        let objects: Vec<DynamicObject> = ["b", "c", "a"]
            .iter()
            .map(|name| {
                serde_json::from_value(json!({
                    "apiVersion": "example.com/v1", "kind": "Widget",
                    "metadata": {"name": name, "namespace": "default"},
                    "spec": {"size": 1}
                }))
                .unwrap()
            })
            .collect();
        let query =
            DataSelectQuery::default().with_sort(SortQuery::new([(PropertyName::Name, true)]));
        let selection = select(objects, &query);
        let names: Vec<_> = selection
            .cells
            .iter()
            .filter_map(|o| o.metadata.name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(selection.cells[0].data["spec"]["size"], 1);
    }
}
