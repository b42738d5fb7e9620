use async_trait::async_trait;
use std::collections::HashMap;

use super::{Metric, MetricName, ResourceSelector};
use crate::config::DEFAULT_METRIC_CONCURRENCY;
use crate::error::Result;

/// A resource to fetch metrics for, with the pods that make up its usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSubject {
    pub selector: ResourceSelector,
    pub pods: Vec<String>,
}

/// Metric series keyed by the uid of the resource they describe
pub type SeriesByResource = HashMap<String, Vec<Metric>>;

/// External provider of resource usage metrics
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Series of each requested metric for each subject.
    ///
    /// Subjects the source has no data for are left out of the result.
    async fn metrics_for(
        &self,
        subjects: &[MetricSubject],
        names: &[MetricName],
    ) -> Result<SeriesByResource>;

    /// Number of `metrics_for` calls the aggregator may run at once
    fn concurrency(&self) -> usize {
        DEFAULT_METRIC_CONCURRENCY
    }
}
