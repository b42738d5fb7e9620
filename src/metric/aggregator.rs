use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    Aggregation, Metric, MetricLabel, MetricName, MetricPoint, MetricSource, MetricSubject,
    ResourceSelector, SeriesByResource,
};
use crate::channels::ResultFuture;
use crate::dataselect::{CachedResources, MetricQuery};
use crate::error::{NonCriticalErrors, Result};

/// Metrics attached to one data select result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMetrics {
    /// Series per displayed cell, by uid
    pub per_item: SeriesByResource,
    /// Sums over the whole filtered set
    pub cumulative: Vec<Metric>,
}

/// Sum series point by point, aligned by index from the newest point.
///
/// The result is as long as the longest series. Each point carries the newest
/// timestamp among the points summed into it.
#[must_use]
pub fn sum_series<'a, I>(series: I) -> Vec<MetricPoint>
where
    I: IntoIterator<Item = &'a [MetricPoint]>,
{
    let series: Vec<&[MetricPoint]> = series.into_iter().collect();
    let len = series.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut summed = Vec::with_capacity(len);

    for offset in (0..len).rev() {
        let mut value = 0.0;
        let mut timestamp: Option<DateTime<Utc>> = None;
        for points in &series {
            let Some(point) = points.len().checked_sub(offset + 1).map(|i| &points[i]) else {
                continue;
            };
            value += point.value;
            timestamp = Some(timestamp.map_or(point.timestamp, |t| t.max(point.timestamp)));
        }
        if let Some(timestamp) = timestamp {
            summed.push(MetricPoint { timestamp, value });
        }
    }
    summed
}

/// Sum the metrics of `uids` per (name, unit, aggregation).
///
/// Resources without a given metric are left out of that metric's sum.
#[must_use]
pub fn cumulative_metrics(series: &SeriesByResource, uids: &[String]) -> Vec<Metric> {
    let mut groups: BTreeMap<(MetricName, String, Aggregation), Vec<&Metric>> = BTreeMap::new();
    for metric in uids.iter().filter_map(|uid| series.get(uid)).flatten() {
        groups
            .entry((metric.metric_name, metric.unit.clone(), metric.aggregation))
            .or_default()
            .push(metric);
    }

    groups
        .into_iter()
        .map(|((metric_name, unit, aggregation), metrics)| {
            let mut label = MetricLabel::new();
            for (kind, names) in metrics.iter().flat_map(|m| m.label.iter()) {
                label.entry(*kind).or_default().extend(names.iter().cloned());
            }
            Metric {
                metric_name,
                unit,
                aggregation,
                data_points: sum_series(metrics.iter().map(|m| m.data_points.as_slice())),
                label,
            }
        })
        .collect()
}

/// Fetch metrics for a data select result.
///
/// Cumulative metrics cover `filtered`; per-item metrics cover `page`. One
/// request is issued per namespace, at most `source.concurrency()` at a time.
/// A missing source or a `None` query yields empty metrics without an error.
///
/// # Errors
///
/// Returns the first failed request; the caller decides whether it is fatal.
pub async fn attach_metrics(
    page: Vec<ResourceSelector>,
    filtered: Vec<ResourceSelector>,
    query: MetricQuery,
    source: Option<Arc<dyn MetricSource>>,
    cache: CachedResources,
) -> Result<CellMetrics> {
    let Some(source) = source else {
        debug!("No metric source, skipping metrics");
        return Ok(CellMetrics::default());
    };
    if query.is_none() {
        return Ok(CellMetrics::default());
    }

    let wanted = if query.cumulative() { &filtered } else { &page };
    if wanted.is_empty() {
        return Ok(CellMetrics::default());
    }

    let chunks: Vec<Vec<MetricSubject>> = wanted
        .iter()
        .map(|selector| MetricSubject {
            pods: selector.pods(&cache),
            selector: selector.clone(),
        })
        .into_group_map_by(|subject| subject.selector.namespace.clone())
        .into_values()
        .collect();
    debug!(
        "Fetching metrics for {} resources in {} requests",
        wanted.len(),
        chunks.len()
    );

    let names = MetricName::ALL;
    let concurrency = source.concurrency().max(1);
    let responses: Vec<Result<SeriesByResource>> = stream::iter(chunks)
        .map(|chunk| {
            let source = Arc::clone(&source);
            async move { source.metrics_for(&chunk, &names).await }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut series = SeriesByResource::new();
    for response in responses {
        series.extend(response?);
    }

    let cumulative = if query.cumulative() {
        let uids: Vec<String> = filtered.iter().map(|s| s.uid.clone()).collect();
        cumulative_metrics(&series, &uids)
    } else {
        Vec::new()
    };

    let per_item = if query.per_item() {
        page.iter()
            .filter_map(|s| series.remove(&s.uid).map(|metrics| (s.uid.clone(), metrics)))
            .collect()
    } else {
        SeriesByResource::new()
    };

    Ok(CellMetrics {
        per_item,
        cumulative,
    })
}

/// Pending metrics of one data select result
#[derive(Debug)]
pub struct MetricPromises {
    inner: ResultFuture<CellMetrics>,
}

impl MetricPromises {
    /// Start fetching metrics on the runtime; resolves immediately when there is nothing to fetch
    #[must_use]
    pub fn start(
        page: Vec<ResourceSelector>,
        filtered: Vec<ResourceSelector>,
        query: MetricQuery,
        source: Option<Arc<dyn MetricSource>>,
        cache: CachedResources,
    ) -> Self {
        if source.is_none() || query.is_none() {
            return Self::empty();
        }
        Self {
            inner: ResultFuture::spawn(
                "metrics",
                attach_metrics(page, filtered, query, source, cache),
            ),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: ResultFuture::ready("metrics", Ok(CellMetrics::default())),
        }
    }

    /// # Errors
    ///
    /// Returns the metric source failure
    pub async fn resolve(self) -> Result<CellMetrics> {
        self.inner.resolve().await
    }

    /// Resolve, recording a failure as non-critical and yielding empty metrics
    pub async fn resolve_into(self, errors: &mut NonCriticalErrors) -> CellMetrics {
        errors.absorb(self.resolve().await)
    }
}
