//! Analysis Records
//!
//! One record per benchmark invocation: raw samples, per-metric
//! aggregates, and enough metadata to reproduce the run. Records are
//! built once, persisted once, and never mutated afterwards; history is
//! append-only.

use chrono::{DateTime, Utc};
use parabench_core::{Sample, Strategy};
use parabench_stats::{AggregateStat, CompareError, MetricDelta};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the record document schema.
pub const SCHEMA_VERSION: u32 = 1;

/// The persisted result set of one benchmark invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Document schema version
    pub schema_version: u32,
    /// Unique, time-ordered identifier
    pub id: String,
    /// Path of the benchmarked executable as given by the caller
    pub target_path: String,
    /// Arguments forwarded to the target on every iteration
    pub target_args: Vec<String>,
    /// Scheduling strategy the run used
    pub strategy: Strategy,
    /// Number of iterations that were requested (and sampled)
    pub requested_iterations: u64,
    /// One sample per iteration, ordered by iteration index
    pub samples: Vec<Sample>,
    /// Per-metric summary statistics
    pub aggregates: BTreeMap<String, AggregateStat>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Host the run executed on
    pub host: HostInfo,
}

/// Host details captured alongside the measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Operating system name
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// Logical CPU core count
    pub cpu_cores: u32,
    /// Total system memory in GB (0 when unavailable)
    pub memory_gb: f64,
}

impl HostInfo {
    /// Capture details of the current host.
    pub fn capture() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_cores: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            memory_gb: total_memory_gb().unwrap_or(0.0),
        }
    }
}

/// Total system memory in GB (Linux only).
fn total_memory_gb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("MemTotal"))
                    .and_then(|l| {
                        l.split_whitespace()
                            .nth(1)
                            .and_then(|s| s.parse::<u64>().ok())
                    })
                    .map(|kb| kb as f64 / 1024.0 / 1024.0)
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Generate a unique, time-ordered record identifier.
///
/// Lexicographic order follows creation order: a compact UTC timestamp
/// with millisecond precision, then a random suffix to separate records
/// created within the same millisecond.
pub fn generate_record_id(created_at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x1_0000);
    format!("{}-{:04x}", created_at.format("%Y%m%dT%H%M%S%3f"), suffix)
}

/// Persisted output of comparing two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonDoc {
    /// Identifier of the base (older) record
    pub base_id: String,
    /// Identifier of the candidate (newer) record
    pub candidate_id: String,
    /// When the comparison was computed
    pub created_at: DateTime<Utc>,
    /// Per-metric deltas
    pub deltas: BTreeMap<String, MetricDelta>,
}

/// Compare two finalized records metric by metric.
///
/// The comparator only borrows the records; it never owns or modifies
/// them.
pub fn compare_records(
    base: &AnalysisRecord,
    candidate: &AnalysisRecord,
) -> Result<ComparisonDoc, CompareError> {
    let deltas = parabench_stats::compare(&base.aggregates, &candidate.aggregates)?;
    Ok(ComparisonDoc {
        base_id: base.id.clone(),
        candidate_id: candidate.id.clone(),
        created_at: Utc::now(),
        deltas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parabench_stats::aggregate;

    fn dummy_record(id: &str, wall_ms: f64) -> AnalysisRecord {
        let samples = vec![Sample {
            iteration_index: 0,
            wall_time_ms: wall_ms,
            cpu_time_ms: wall_ms / 2.0,
            peak_memory_kb: 512,
            exit_code: 0,
            failed: false,
            error_message: None,
            started_at_ms: 0.0,
            ended_at_ms: wall_ms,
        }];
        let aggregates = aggregate(&samples);
        AnalysisRecord {
            schema_version: SCHEMA_VERSION,
            id: id.to_string(),
            target_path: "/bin/true".to_string(),
            target_args: Vec::new(),
            strategy: Strategy::Sequential,
            requested_iterations: 1,
            samples,
            aggregates,
            created_at: Utc::now(),
            host: HostInfo::capture(),
        }
    }

    #[test]
    fn test_record_ids_are_time_ordered() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap();
        let a = generate_record_id(earlier);
        let b = generate_record_id(later);
        assert!(a < b, "{} should sort before {}", a, b);
    }

    #[test]
    fn test_record_id_shape() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let id = generate_record_id(at);
        assert!(id.starts_with("20260301T120000"));
        // timestamp (15) + millis (3) + dash + 4 hex digits
        assert_eq!(id.len(), 23);
    }

    #[test]
    fn test_compare_records_carries_ids() {
        let base = dummy_record("base-id", 100.0);
        let candidate = dummy_record("cand-id", 150.0);

        let doc = compare_records(&base, &candidate).unwrap();
        assert_eq!(doc.base_id, "base-id");
        assert_eq!(doc.candidate_id, "cand-id");
        assert!(matches!(
            doc.deltas["wall_time_ms"],
            MetricDelta::Comparable {
                percent_change: Some(p),
                ..
            } if (p - 50.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let record = dummy_record("roundtrip", 10.0);
        let json = serde_json::to_string_pretty(&record).unwrap();
        let decoded: AnalysisRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, decoded);
    }
}
