use serde::Serialize;
use std::fmt;

/// Resource kinds the aggregation layer produces views for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Event,
    Service,
    ReplicaSet,
    Deployment,
    Job,
    Namespace,
    Node,
    CustomResource,
}

impl ResourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Event => "event",
            Self::Service => "service",
            Self::ReplicaSet => "replicaset",
            Self::Deployment => "deployment",
            Self::Job => "job",
            Self::Namespace => "namespace",
            Self::Node => "node",
            Self::CustomResource => "customresource",
        }
    }

    /// Controllers whose pods are found through owner references or selectors
    #[must_use]
    pub const fn owns_pods(self) -> bool {
        matches!(self, Self::ReplicaSet | Self::Deployment | Self::Job)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
