//! Per-Iteration Measurement Record

use serde::{Deserialize, Serialize};

/// Wall-clock duration metric name.
pub const METRIC_WALL_TIME_MS: &str = "wall_time_ms";
/// CPU time (user + system) metric name.
pub const METRIC_CPU_TIME_MS: &str = "cpu_time_ms";
/// Peak resident set size metric name.
pub const METRIC_PEAK_MEMORY_KB: &str = "peak_memory_kb";

/// All metric names, in report order.
pub const METRIC_NAMES: [&str; 3] = [
    METRIC_WALL_TIME_MS,
    METRIC_CPU_TIME_MS,
    METRIC_PEAK_MEMORY_KB,
];

/// One measurement of one run of the target program.
///
/// Exactly one sample exists per requested iteration: failures are recorded
/// in place (`failed` plus `error_message`) rather than dropped, so a result
/// set for N iterations always holds N samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Zero-based index of the iteration this sample belongs to
    pub iteration_index: u64,
    /// Wall-clock duration of the run in milliseconds, from a monotonic clock
    pub wall_time_ms: f64,
    /// CPU time (user + system) consumed by the child, in milliseconds
    pub cpu_time_ms: f64,
    /// Peak resident set size of the child, in kilobytes
    pub peak_memory_kb: u64,
    /// Raw exit code; `-(signal number)` for signal-terminated children
    pub exit_code: i32,
    /// Whether this iteration failed: spawn error, non-zero exit, signal,
    /// timeout, or cancellation
    pub failed: bool,
    /// Failure description when `failed` is true
    pub error_message: Option<String>,
    /// Start of the run, in milliseconds since the runner's epoch
    pub started_at_ms: f64,
    /// End of the run, in milliseconds since the runner's epoch
    pub ended_at_ms: f64,
}

impl Sample {
    /// Build a failure sample for an iteration that never produced a
    /// measurement (spawn error, lost forked worker, cancellation before
    /// start).
    pub fn failure(iteration_index: u64, at_ms: f64, message: impl Into<String>) -> Self {
        Self {
            iteration_index,
            wall_time_ms: 0.0,
            cpu_time_ms: 0.0,
            peak_memory_kb: 0,
            exit_code: -1,
            failed: true,
            error_message: Some(message.into()),
            started_at_ms: at_ms,
            ended_at_ms: at_ms,
        }
    }

    /// Value of a named metric, `None` for unknown names.
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            METRIC_WALL_TIME_MS => Some(self.wall_time_ms),
            METRIC_CPU_TIME_MS => Some(self.cpu_time_ms),
            METRIC_PEAK_MEMORY_KB => Some(self.peak_memory_kb as f64),
            _ => None,
        }
    }
}
