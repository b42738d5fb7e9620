//! Read-mostly aggregation layer over the Kubernetes api.
//!
//! Lists and details of cluster resources are assembled from concurrent
//! retrievals ([`channels`]), narrowed by a filter/sort/paginate engine
//! ([`dataselect`]) and annotated with usage metrics ([`metric`]).

pub mod channels;
pub mod config;
pub mod dataselect;
pub mod error;
pub mod k8s;
pub mod kind;
pub mod metric;
pub mod resource;

pub use error::{Error, NonCriticalErrors, Result};
