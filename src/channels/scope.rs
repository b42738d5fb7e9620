use itertools::Itertools;

/// Which namespaces a retrieval covers.
///
/// The registry is agnostic to the strategy: it asks for the request
/// namespace and narrows the returned items with [`NamespaceScope::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceScope {
    /// Only the given namespace, usually the one of the primary resource
    Same(String),
    /// Every namespace in the cluster
    #[default]
    All,
    /// An explicit set of namespaces
    Explicit(Vec<String>),
}

impl NamespaceScope {
    #[must_use]
    pub fn same(namespace: impl Into<String>) -> Self {
        Self::Same(namespace.into())
    }

    /// Build a scope from a list of namespaces: none means all, one means same
    #[must_use]
    pub fn from_namespaces(namespaces: Vec<String>) -> Self {
        let mut namespaces: Vec<String> = namespaces
            .into_iter()
            .filter(|ns| !ns.is_empty())
            .unique()
            .collect();
        match namespaces.len() {
            0 => Self::All,
            1 => Self::Same(namespaces.remove(0)),
            _ => Self::Explicit(namespaces),
        }
    }

    /// Namespace to send with the list call; `None` lists across all namespaces
    #[must_use]
    pub fn request_namespace(&self) -> Option<&str> {
        match self {
            Self::Same(ns) => Some(ns.as_str()),
            Self::All | Self::Explicit(_) => None,
        }
    }

    #[must_use]
    pub fn matches(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Same(ns) => namespace == Some(ns.as_str()),
            Self::Explicit(list) => namespace.is_some_and(|ns| list.iter().any(|n| n == ns)),
        }
    }
}
