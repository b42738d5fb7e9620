use itertools::Itertools;
use std::collections::BTreeMap;

pub(crate) fn format_label_selector(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .join(",")
}

/// True when every `selector` pair is present in `labels`.
///
/// An empty selector matches nothing, so selector-less controllers own no pods.
#[must_use]
pub fn labels_match(
    selector: &BTreeMap<String, String>,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    if selector.is_empty() {
        return false;
    }
    labels.is_some_and(|labels| selector.iter().all(|(k, v)| labels.get(k) == Some(v)))
}
