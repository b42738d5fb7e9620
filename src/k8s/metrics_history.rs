//! Time-series storage for metrics history
//!
//! Maintains a sliding window of recent samples per pod or node so each metric
//! carries a short historical series next to its latest value.

use crate::config::{MAX_METRIC_SAMPLES, MAX_METRIC_SAMPLE_AGE_SECS};
use crate::metric::{MetricName, MetricPoint};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

/// A single metric sample at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_millis: Option<f64>,
    pub memory_bytes: Option<u64>,
}

impl MetricSample {
    #[must_use]
    pub const fn new(
        timestamp: DateTime<Utc>,
        cpu_millis: Option<f64>,
        memory_bytes: Option<u64>,
    ) -> Self {
        Self {
            timestamp,
            cpu_millis,
            memory_bytes,
        }
    }

    /// Value of `name` in this sample, in the metric's unit
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self, name: MetricName) -> Option<f64> {
        match name {
            MetricName::CpuUsageRate => self.cpu_millis,
            MetricName::MemoryUsage => self.memory_bytes.map(|b| b as f64),
        }
    }
}

/// Time-series data for a single pod or node, oldest sample first
#[derive(Debug, Clone)]
pub struct MetricsTimeSeries {
    samples: VecDeque<MetricSample>,
}

impl Default for MetricsTimeSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsTimeSeries {
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_METRIC_SAMPLES),
        }
    }

    /// Add a sample. The metrics api reports the same window until it scrapes
    /// again, so a sample with an already-seen timestamp replaces the newest one.
    pub fn add_sample(&mut self, sample: MetricSample) {
        match self.samples.back_mut() {
            Some(last) if last.timestamp == sample.timestamp => *last = sample,
            Some(last) if last.timestamp > sample.timestamp => return,
            _ => self.samples.push_back(sample),
        }
        self.prune();
    }

    /// Remove samples older than the window relative to the newest, or beyond the count
    fn prune(&mut self) {
        let Some(newest) = self.samples.back().map(|s| s.timestamp) else {
            return;
        };
        let max_age = Duration::seconds(MAX_METRIC_SAMPLE_AGE_SECS);

        while let Some(front) = self.samples.front() {
            if newest - front.timestamp > max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > MAX_METRIC_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Points of `name`, oldest first; samples lacking the value are skipped
    #[must_use]
    pub fn points(&self, name: MetricName) -> Vec<MetricPoint> {
        self.samples
            .iter()
            .filter_map(|s| {
                s.value(name).map(|value| MetricPoint {
                    timestamp: s.timestamp,
                    value,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Storage for all metrics history, keyed by [`MetricsHistoryStore::pod_key`]
/// or [`MetricsHistoryStore::node_key`]
#[derive(Debug, Clone, Default)]
pub struct MetricsHistoryStore {
    series: HashMap<String, MetricsTimeSeries>,
}

impl MetricsHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pod_key(namespace: &str, pod: &str) -> String {
        format!("pod/{namespace}/{pod}")
    }

    #[must_use]
    pub fn node_key(node: &str) -> String {
        format!("node/{node}")
    }

    pub fn record(&mut self, key: String, sample: MetricSample) {
        self.series.entry(key).or_default().add_sample(sample);
    }

    #[must_use]
    pub fn history(&self, key: &str) -> Option<&MetricsTimeSeries> {
        self.series.get(key)
    }

    /// Drop series whose newest sample is older than the window at `now`
    pub fn prune_stale(&mut self, now: DateTime<Utc>) {
        let max_age = Duration::seconds(MAX_METRIC_SAMPLE_AGE_SECS);
        self.series.retain(|_, ts| {
            ts.latest()
                .is_some_and(|latest| now - latest.timestamp <= max_age)
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
