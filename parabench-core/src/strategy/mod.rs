//! Execution Strategies
//!
//! Four scheduling variants behind one contract: run N iterations of the
//! target and return one raw sample per iteration, never more, never
//! fewer. The returned order is unspecified (concurrent variants finish
//! out of order) and [`crate::collect`] restores iteration order and
//! verifies the no-loss/no-duplication invariant.

mod forked;
mod sequential;
mod subshell;
mod thread_pool;

use crate::cancel::CancelToken;
use crate::runner::ProcessRunner;
use crate::sample::Sample;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised before or while a strategy schedules iterations.
///
/// Per-iteration failures never show up here; they are recorded inside the
/// affected [`Sample`].
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Pre-flight validation failure; nothing has run
    #[error("invalid benchmark plan: {0}")]
    Validation(String),

    /// The worker pool could not be constructed
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// How the iterations of a benchmark run are scheduled.
///
/// A closed set: each variant's scheduling is self-contained and the
/// harness never needs to grow new variants at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One iteration after another on the caller's thread; iteration i+1
    /// only starts after i completed. Baseline with the lowest
    /// measurement noise.
    #[serde(rename = "sequential")]
    Sequential,

    /// Iterations submitted to a fixed-size pool of worker threads, each
    /// spawning the target as its own child process. Peak-memory figures
    /// describe each child individually, but concurrent children share
    /// the host, so wall times include scheduler contention the
    /// sequential baseline does not have.
    #[serde(rename = "thread")]
    ThreadPool,

    /// Each iteration runs in a freshly forked image of the harness
    /// process, fully isolating iterations from one another. A crash in
    /// one forked iteration is confined to that iteration's sample.
    #[serde(rename = "fork")]
    ForkedProcess,

    /// Each iteration runs under a freshly spawned `sh` with a cleared
    /// environment and its own scratch working directory. Interpreter
    /// startup stays inside the measured window, so wall times sit above
    /// the other strategies for the same target.
    #[serde(rename = "subshell")]
    IsolatedShell,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Sequential => "sequential",
            Strategy::ThreadPool => "thread",
            Strategy::ForkedProcess => "fork",
            Strategy::IsolatedShell => "subshell",
        };
        write!(f, "{}", name)
    }
}

impl Strategy {
    /// Run `iterations` runs of the target and return one raw sample per
    /// iteration.
    ///
    /// `concurrency_cap` bounds the parallel variants and is clamped to at
    /// least 1; the effective worker count never exceeds the iteration
    /// count. On cancellation, completed samples are kept, in-flight
    /// children are killed and recorded as failed, and iterations that
    /// never started are recorded as failed too, so the returned length is
    /// always `iterations`.
    pub fn execute(
        &self,
        runner: &ProcessRunner,
        iterations: u64,
        concurrency_cap: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<Sample>, StrategyError> {
        if iterations == 0 {
            return Err(StrategyError::Validation(
                "iteration count must be at least 1".to_string(),
            ));
        }

        let degree = concurrency_degree(iterations, concurrency_cap);
        match self {
            Strategy::Sequential => Ok(sequential::execute(runner, iterations, cancel)),
            Strategy::ThreadPool => thread_pool::execute(runner, iterations, degree, cancel),
            Strategy::ForkedProcess => forked::execute(runner, iterations, degree, cancel),
            Strategy::IsolatedShell => subshell::execute(runner, iterations, degree, cancel),
        }
    }
}

/// Worker count for the concurrent strategies: bounded by the iteration
/// count and the configured cap, never below 1.
fn concurrency_degree(iterations: u64, cap: usize) -> usize {
    let cap = cap.max(1) as u64;
    iterations.min(cap) as usize
}

/// Host logical core count, the default concurrency cap.
pub fn default_concurrency_cap() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_concurrency_degree_clamping() {
        assert_eq!(concurrency_degree(10, 4), 4);
        assert_eq!(concurrency_degree(2, 4), 2);
        assert_eq!(concurrency_degree(10, 0), 1);
        assert_eq!(concurrency_degree(1, 64), 1);
    }

    #[test]
    fn test_zero_iterations_is_a_validation_error() {
        let runner = ProcessRunner::new("/bin/true", Vec::new(), Duration::from_secs(1));
        let result = Strategy::Sequential.execute(&runner, 0, 1, &CancelToken::new());
        assert!(matches!(result, Err(StrategyError::Validation(_))));
    }

    #[test]
    fn test_strategy_serde_names() {
        assert_eq!(
            serde_json::to_string(&Strategy::ForkedProcess).unwrap(),
            "\"fork\""
        );
        assert_eq!(
            serde_json::to_string(&Strategy::IsolatedShell).unwrap(),
            "\"subshell\""
        );
        let decoded: Strategy = serde_json::from_str("\"thread\"").unwrap();
        assert_eq!(decoded, Strategy::ThreadPool);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::Sequential.to_string(), "sequential");
        assert_eq!(Strategy::ForkedProcess.to_string(), "fork");
    }
}
