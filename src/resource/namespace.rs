use k8s_openapi::api::core::v1::Namespace;
use serde::Serialize;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, TypeMeta};
use crate::channels::ResourceChannels;
use crate::dataselect::{
    ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property, object_selector,
    select,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::ListSource;
use crate::kind::ResourceKind;
use crate::metric::ResourceSelector;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub phase: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceList {
    pub list_meta: ListMeta,
    pub namespaces: Vec<NamespaceItem>,
    pub errors: NonCriticalErrors,
}

fn namespace_phase(namespace: &Namespace) -> String {
    namespace
        .status
        .as_ref()
        .and_then(|s| s.phase.clone())
        .unwrap_or_else(|| "Active".to_string())
}

impl DataCell for Namespace {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::Status => Some(namespace_phase(self).into()),
            _ => object_property(&self.metadata, name),
        }
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Namespace)
    }
}

impl From<&Namespace> for NamespaceItem {
    fn from(namespace: &Namespace) -> Self {
        Self {
            object_meta: ObjectMeta::from(&namespace.metadata),
            type_meta: TypeMeta::new(ResourceKind::Namespace),
            phase: namespace_phase(namespace),
        }
    }
}

/// All namespaces in the cluster
///
/// # Errors
///
/// Fails when the namespace listing fails for any reason other than authorization
pub async fn get_namespace_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    query: &DataSelectQuery,
) -> Result<NamespaceList> {
    info!("Getting list of namespaces");
    let mut errors = NonCriticalErrors::new();
    let namespaces = errors
        .append(channels.namespaces().resolve().await)?
        .unwrap_or_default();

    let selection = select(namespaces, query);
    Ok(NamespaceList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        namespaces: selection.cells.iter().map(NamespaceItem::from).collect(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataselect::FilterQuery;
    use crate::resource::common::fixtures::object;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_filter_namespaces_by_phase() {
        let namespaces: Vec<Namespace> = vec![
            object(json!({"metadata": {"name": "default"}, "status": {"phase": "Active"}})),
            object(json!({"metadata": {"name": "old"}, "status": {"phase": "Terminating"}})),
            object(json!({"metadata": {"name": "fresh"}})),
        ];
        let query = DataSelectQuery::default()
            .with_filter(FilterQuery::new([(PropertyName::Status, "Active")]));
        let selection = select(namespaces, &query);

        assert_eq!(selection.total_items, 2);
        let names: Vec<_> = selection
            .cells
            .iter()
            .map(|n| NamespaceItem::from(n).object_meta.name)
            .collect();
        assert_eq!(names, vec!["default".to_string(), "fresh".to_string()]);
    }
}
