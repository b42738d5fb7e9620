use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::property::{ComparableValue, PropertyName};
use crate::kind::ResourceKind;
use crate::metric::ResourceSelector;

/// Uniform view of one resource item for the data select engine.
///
/// Implemented directly on the api object of each resource kind. The engine
/// only ever talks to cells through it.
pub trait DataCell {
    /// Value of `name`, or `None` when this kind does not support the property
    fn property(&self, name: &PropertyName) -> Option<ComparableValue>;

    /// Identity of the item for metric lookups
    fn resource_selector(&self) -> ResourceSelector;
}

/// Properties every object exposes through its metadata
#[must_use]
pub fn object_property(meta: &ObjectMeta, name: &PropertyName) -> Option<ComparableValue> {
    match name {
        PropertyName::Name => meta.name.clone().map(Into::into),
        PropertyName::Namespace => meta.namespace.clone().map(Into::into),
        PropertyName::CreationTimestamp => meta.creation_timestamp.as_ref().map(|t| t.0.into()),
        _ => None,
    }
}

/// Selector built from object metadata; `label_selector` narrows the pods of controllers
#[must_use]
pub fn object_selector(meta: &ObjectMeta, kind: ResourceKind) -> ResourceSelector {
    ResourceSelector {
        namespace: meta.namespace.clone(),
        kind,
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
        label_selector: None,
    }
}
