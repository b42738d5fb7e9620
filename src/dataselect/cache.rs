use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;

/// Already-fetched objects that relationship and metric lookups may consult.
///
/// Read-only for the duration of a request. Absent collections mean no side
/// data is available, never an error.
#[derive(Debug, Clone, Default)]
pub struct CachedResources {
    pub pods: Option<Arc<Vec<Pod>>>,
}

impl CachedResources {
    #[must_use]
    pub fn with_pods(pods: Vec<Pod>) -> Self {
        Self {
            pods: Some(Arc::new(pods)),
        }
    }

    #[must_use]
    pub fn pods(&self) -> &[Pod] {
        self.pods.as_deref().map_or(&[], Vec::as_slice)
    }
}
