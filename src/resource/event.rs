use chrono::{DateTime, Utc};
use itertools::Itertools;
use k8s_openapi::api::core::v1::{Event, Pod};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::common::{ListMeta, ObjectMeta, TypeMeta, pod_phase};
use crate::channels::{NamespaceScope, ResourceChannels};
use crate::dataselect::{
    ComparableValue, DataCell, DataSelectQuery, PropertyName, object_property, object_selector,
};
use crate::error::{NonCriticalErrors, Result};
use crate::k8s::source::ListSource;
use crate::kind::ResourceKind;
use crate::metric::ResourceSelector;

pub const EVENT_TYPE_NORMAL: &str = "Normal";
pub const EVENT_TYPE_WARNING: &str = "Warning";

/// Reason fragments that mark an untyped event as a warning
const FAILED_REASON_PARTIALS: [&str; 11] = [
    "failed",
    "err",
    "exceeded",
    "invalid",
    "unhealthy",
    "mismatch",
    "insufficient",
    "conflict",
    "outof",
    "nil",
    "backoff",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub object_meta: ObjectMeta,
    pub type_meta: TypeMeta,
    pub message: String,
    pub source_component: String,
    pub source_host: String,
    /// Name of the object the event is about
    pub object: String,
    pub object_kind: String,
    pub count: i32,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub reason: String,
    #[serde(rename = "type")]
    pub type_: String,
}

impl From<&Event> for EventItem {
    fn from(event: &Event) -> Self {
        let source = event.source.as_ref();
        Self {
            object_meta: ObjectMeta::from(&event.metadata),
            type_meta: TypeMeta::new(ResourceKind::Event),
            message: event.message.clone().unwrap_or_default(),
            source_component: source
                .and_then(|s| s.component.clone())
                .unwrap_or_default(),
            source_host: source.and_then(|s| s.host.clone()).unwrap_or_default(),
            object: event.involved_object.name.clone().unwrap_or_default(),
            object_kind: event.involved_object.kind.clone().unwrap_or_default(),
            count: event.count.unwrap_or(0),
            first_seen: first_seen(event),
            last_seen: last_seen(event),
            reason: event.reason.clone().unwrap_or_default(),
            type_: event.type_.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    pub list_meta: ListMeta,
    pub events: Vec<EventItem>,
    pub errors: NonCriticalErrors,
}

fn first_seen(event: &Event) -> Option<DateTime<Utc>> {
    event
        .first_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
}

fn last_seen(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
}

impl DataCell for Event {
    fn property(&self, name: &PropertyName) -> Option<ComparableValue> {
        match name {
            PropertyName::FirstSeen => first_seen(self).map(Into::into),
            PropertyName::LastSeen => last_seen(self).map(Into::into),
            PropertyName::Count => self.count.map(Into::into),
            PropertyName::Reason => self.reason.clone().map(Into::into),
            PropertyName::Type => self.type_.clone().map(Into::into),
            other => object_property(&self.metadata, other),
        }
    }

    fn resource_selector(&self) -> ResourceSelector {
        object_selector(&self.metadata, ResourceKind::Event)
    }
}

/// True when `reason` looks like a failure
#[must_use]
pub fn is_failed_reason(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    FAILED_REASON_PARTIALS
        .iter()
        .any(|partial| reason.contains(partial))
}

/// Give untyped events a type guessed from their reason
pub fn fill_event_types(events: &mut [Event]) {
    for event in events.iter_mut().filter(|e| e.type_.as_deref().unwrap_or("").is_empty()) {
        let failed = event.reason.as_deref().is_some_and(is_failed_reason);
        event.type_ = Some(if failed { EVENT_TYPE_WARNING } else { EVENT_TYPE_NORMAL }.to_string());
    }
}

/// Warning events of `pods` that are neither running nor succeeded, without repeats
#[must_use]
pub fn pod_warnings(events: &[Event], pods: &[Pod]) -> Vec<EventItem> {
    let troubled: HashSet<&str> = pods
        .iter()
        .filter(|pod| !matches!(pod_phase(pod), "Running" | "Succeeded"))
        .filter_map(|pod| pod.metadata.uid.as_deref())
        .collect();
    if troubled.is_empty() {
        return Vec::new();
    }

    events
        .iter()
        .filter(|e| e.type_.as_deref() == Some(EVENT_TYPE_WARNING))
        .filter(|e| {
            e.involved_object
                .uid
                .as_deref()
                .is_some_and(|uid| troubled.contains(uid))
        })
        .unique_by(|e| (e.reason.clone(), e.message.clone()))
        .map(EventItem::from)
        .collect()
}

/// Type, select and convert `events`
#[must_use]
pub fn to_event_list(mut events: Vec<Event>, query: &DataSelectQuery) -> EventList {
    fill_event_types(&mut events);
    let selection = crate::dataselect::select(events, query);
    EventList {
        list_meta: ListMeta {
            total_items: selection.total_items,
        },
        events: selection.cells.iter().map(EventItem::from).collect(),
        errors: NonCriticalErrors::new(),
    }
}

/// Events in `scope`
///
/// # Errors
///
/// Fails when the event listing fails for any reason other than authorization
pub async fn get_event_list<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    scope: &NamespaceScope,
    query: &DataSelectQuery,
) -> Result<EventList> {
    info!("Getting list of events in {:?}", scope);
    let mut errors = NonCriticalErrors::new();
    let events = errors
        .append(channels.events(scope).resolve().await)?
        .unwrap_or_default();

    let mut list = to_event_list(events, query);
    list.errors = errors;
    Ok(list)
}

/// Events about the object `name` in `namespace`
///
/// # Errors
///
/// Fails when the event listing fails for any reason other than authorization
pub async fn get_events_for_resource<S: ListSource + 'static>(
    channels: &ResourceChannels<S>,
    namespace: &str,
    name: &str,
    query: &DataSelectQuery,
) -> Result<EventList> {
    info!("Getting events related to {} in {} namespace", name, namespace);
    let mut errors = NonCriticalErrors::new();
    let events = errors
        .append(
            channels
                .events_for(&NamespaceScope::same(namespace), name)
                .resolve()
                .await,
        )?
        .unwrap_or_default();

    let mut list = to_event_list(events, query);
    list.errors = errors;
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataselect::SortQuery;
    use crate::resource::common::fixtures::{object, pod};
    use k8s_openapi::serde_json::json;

    fn event(name: &str, reason: &str, type_: Option<&str>, uid: &str) -> Event {
        object(json!({
            "metadata": {"name": name, "namespace": "default"},
            "involvedObject": {"kind": "Pod", "name": "p", "uid": uid},
            "reason": reason,
            "message": format!("{reason} happened"),
            "type": type_,
            "count": 1,
            "lastTimestamp": "2024-05-01T12:00:00Z"
        }))
    }

    #[test]
    fn test_fill_event_types_from_reason() {
        let mut events = vec![
            event("a", "FailedScheduling", None, "x"),
            event("b", "Pulled", None, "x"),
            event("c", "BackOff", Some("Normal"), "x"),
        ];
        fill_event_types(&mut events);
        assert_eq!(events[0].type_.as_deref(), Some(EVENT_TYPE_WARNING));
        assert_eq!(events[1].type_.as_deref(), Some(EVENT_TYPE_NORMAL));
        assert_eq!(events[2].type_.as_deref(), Some(EVENT_TYPE_NORMAL));
    }

    #[test]
    fn test_pod_warnings_only_for_troubled_pods() {
        let pods = vec![pod("ok", None, "Running"), pod("stuck", None, "Pending")];
        let events = vec![
            event("a", "FailedMount", Some("Warning"), "stuck-uid"),
            event("a2", "FailedMount", Some("Warning"), "stuck-uid"),
            event("b", "Unhealthy", Some("Warning"), "ok-uid"),
            event("c", "Scheduled", Some("Normal"), "stuck-uid"),
        ];
        let warnings = pod_warnings(&events, &pods);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, "FailedMount");
        assert_eq!(warnings[0].object, "p");
    }

    #[test]
    fn test_to_event_list_sorts_by_reason() {
        let events = vec![
            event("a", "Pulled", None, "x"),
            event("b", "Created", None, "x"),
        ];
        let query = DataSelectQuery::default().with_sort(SortQuery::new([("reason", true)]));
        let list = to_event_list(events, &query);
        assert_eq!(list.list_meta.total_items, 2);
        assert_eq!(list.events[0].reason, "Created");
        assert_eq!(list.events[1].type_, EVENT_TYPE_NORMAL);
        assert!(list.events[0].last_seen.is_some());
    }
}
