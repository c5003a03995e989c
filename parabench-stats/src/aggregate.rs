//! Metric Aggregation
//!
//! Reduces a benchmark's raw sample set into per-metric summary statistics.
//! Only non-failed samples contribute to the numeric aggregates; the
//! failure count always describes the full set. When every sample failed,
//! the numeric fields are `None`, undefined rather than zero, and the caller is
//! expected to surface the all-failed condition as a warning rather than
//! discard the record.

use parabench_core::{Sample, METRIC_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics for one metric across a sample set.
///
/// Standard deviation uses the population formula (divides by n, not
/// n - 1). Both conventions are common; callers comparing against other
/// tools must account for which one is in play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    /// Name of the metric these statistics describe
    pub metric_name: String,
    /// Arithmetic mean over non-failed samples
    pub mean: Option<f64>,
    /// Median over non-failed samples (average of the two middle values
    /// for even counts)
    pub median: Option<f64>,
    /// Population standard deviation over non-failed samples
    pub stddev: Option<f64>,
    /// Smallest non-failed value
    pub min: Option<f64>,
    /// Largest non-failed value
    pub max: Option<f64>,
    /// Size of the full sample set, failures included
    pub sample_count: u64,
    /// Number of failed samples in the full set
    pub failure_count: u64,
}

/// Compute aggregates for every metric over the full sample set.
pub fn aggregate(samples: &[Sample]) -> BTreeMap<String, AggregateStat> {
    let failure_count = samples.iter().filter(|s| s.failed).count() as u64;
    let sample_count = samples.len() as u64;

    let mut stats = BTreeMap::new();
    for name in METRIC_NAMES {
        let values: Vec<f64> = samples
            .iter()
            .filter(|s| !s.failed)
            .filter_map(|s| s.metric(name))
            .collect();
        stats.insert(
            name.to_string(),
            aggregate_metric(name, &values, sample_count, failure_count),
        );
    }
    stats
}

/// Whether every sample in the set failed: the "all iterations failed"
/// condition the harness surfaces as a warning.
pub fn all_failed(samples: &[Sample]) -> bool {
    !samples.is_empty() && samples.iter().all(|s| s.failed)
}

fn aggregate_metric(
    name: &str,
    values: &[f64],
    sample_count: u64,
    failure_count: u64,
) -> AggregateStat {
    if values.is_empty() {
        return AggregateStat {
            metric_name: name.to_string(),
            mean: None,
            median: None,
            stddev: None,
            min: None,
            max: None,
            sample_count,
            failure_count,
        };
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;

    // Population variance: divide by n, not n - 1.
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    let min = values
        .iter()
        .cloned()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let max = values
        .iter()
        .cloned()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    AggregateStat {
        metric_name: name.to_string(),
        mean: Some(mean),
        median: Some(compute_median(values)),
        stddev: Some(variance.sqrt()),
        min,
        max,
        sample_count,
        failure_count,
    }
}

fn compute_median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
