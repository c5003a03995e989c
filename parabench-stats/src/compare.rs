//! Aggregate Comparison
//!
//! Computes per-metric deltas between two finalized aggregate sets.
//! Percent change is relative to the base mean; a zero base mean leaves
//! the percentage undefined rather than dividing by zero. Metrics present
//! on only one side, or undefined because every iteration failed, are
//! reported as not comparable instead of being silently skipped.

use crate::aggregate::AggregateStat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from comparing two aggregate sets.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Neither set carries a metric name known to the other
    #[error("records share no common metric")]
    NoCommonMetrics,
}

/// Per-metric comparison outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricDelta {
    /// Both sides carry a defined mean for this metric
    Comparable {
        /// Mean from the base record
        base_mean: f64,
        /// Mean from the candidate record
        candidate_mean: f64,
        /// `candidate_mean - base_mean`
        absolute_delta: f64,
        /// Change relative to the base mean, in percent; `None` when the
        /// base mean is zero
        percent_change: Option<f64>,
    },
    /// Metric missing on one side, or undefined because every iteration
    /// of one record failed
    NotComparable {
        /// Why the metric could not be compared
        reason: String,
    },
}

/// Compare two aggregate sets metric by metric.
///
/// Every metric name appearing on either side gets an entry in the result;
/// at least one name must be present on both sides or the comparison as a
/// whole is rejected.
pub fn compare(
    base: &BTreeMap<String, AggregateStat>,
    candidate: &BTreeMap<String, AggregateStat>,
) -> Result<BTreeMap<String, MetricDelta>, CompareError> {
    let names: BTreeSet<&String> = base.keys().chain(candidate.keys()).collect();

    let mut common = 0usize;
    let mut deltas = BTreeMap::new();
    for name in names {
        let delta = match (base.get(name.as_str()), candidate.get(name.as_str())) {
            (Some(base_stat), Some(candidate_stat)) => {
                common += 1;
                match (base_stat.mean, candidate_stat.mean) {
                    (Some(base_mean), Some(candidate_mean)) => MetricDelta::Comparable {
                        base_mean,
                        candidate_mean,
                        absolute_delta: candidate_mean - base_mean,
                        percent_change: if base_mean == 0.0 {
                            None
                        } else {
                            Some((candidate_mean - base_mean) / base_mean * 100.0)
                        },
                    },
                    (None, _) => MetricDelta::NotComparable {
                        reason: "metric undefined in base record (all iterations failed)"
                            .to_string(),
                    },
                    (_, None) => MetricDelta::NotComparable {
                        reason: "metric undefined in candidate record (all iterations failed)"
                            .to_string(),
                    },
                }
            }
            (None, Some(_)) => MetricDelta::NotComparable {
                reason: "metric missing from base record".to_string(),
            },
            (Some(_), None) => MetricDelta::NotComparable {
                reason: "metric missing from candidate record".to_string(),
            },
            (None, None) => unreachable!("name came from one of the two maps"),
        };
        deltas.insert(name.clone(), delta);
    }

    if common == 0 {
        return Err(CompareError::NoCommonMetrics);
    }
    Ok(deltas)
}
