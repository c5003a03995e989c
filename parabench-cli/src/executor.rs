//! Benchmark Orchestration
//!
//! Drives one benchmark invocation end to end:
//! validate → execute → collect → aggregate → persist → compare.
//!
//! Per-iteration failures are recovered locally and recorded as failed
//! samples inside the record. Only pre-flight validation and batch-level
//! integrity violations abort the run, and an abort reports how many
//! iterations had already completed.

use indicatif::{ProgressBar, ProgressStyle};
use parabench_core::{
    collect, CancelToken, CollectError, ProcessRunner, Strategy, StrategyError,
};
use parabench_report::{
    compare_records, generate_record_id, AnalysisRecord, HostInfo, RecordStore, StoreError,
    SCHEMA_VERSION,
};
use parabench_stats::{aggregate, all_failed, CompareError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Everything needed to run one benchmark invocation.
#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    /// Executable to benchmark
    pub target: PathBuf,
    /// Arguments forwarded to the target on every iteration
    pub target_args: Vec<String>,
    /// Scheduling strategy
    pub strategy: Strategy,
    /// Number of iterations to run
    pub iterations: u64,
    /// Upper bound on concurrent workers
    pub concurrency_cap: usize,
    /// Per-iteration timeout
    pub timeout: Duration,
    /// Root of the record tree
    pub output_dir: PathBuf,
    /// Prior record id to compare the new record against
    pub compare_to: Option<String>,
}

/// Errors that abort a benchmark invocation.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Pre-flight validation failure; nothing ran and nothing was persisted
    #[error("invalid benchmark plan: {0}")]
    Validation(String),

    /// A strategy broke the one-sample-per-iteration invariant; nothing
    /// was persisted
    #[error("{source} ({completed} of {requested} iterations had completed)")]
    Integrity {
        /// The underlying integrity violation
        #[source]
        source: CollectError,
        /// Samples that had been produced before the violation was caught
        completed: u64,
        /// Iterations originally requested
        requested: u64,
    },

    /// Strategy-level failure (validation or pool construction)
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Record could not be persisted or loaded
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Records could not be compared
    #[error("comparison error: {0}")]
    Compare(#[from] CompareError),
}

/// Result of a finished invocation.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// The persisted record
    pub record: AnalysisRecord,
    /// Path of the record document
    pub record_path: PathBuf,
    /// Path of the comparison document, when one was requested
    pub comparison_path: Option<PathBuf>,
}

/// Run one benchmark invocation end to end.
pub fn run_analysis(
    plan: &BenchmarkPlan,
    cancel: &CancelToken,
) -> Result<AnalysisOutcome, HarnessError> {
    validate(plan)?;

    let store = RecordStore::new(&plan.output_dir);

    // Resolve the baseline before running anything so a bad id fails fast
    // instead of after minutes of measurement.
    let baseline = match &plan.compare_to {
        Some(id) => Some(store.load(id)?),
        None => None,
    };

    let runner = ProcessRunner::new(&plan.target, plan.target_args.clone(), plan.timeout);

    tracing::info!(
        target_path = %plan.target.display(),
        strategy = %plan.strategy,
        iterations = plan.iterations,
        concurrency_cap = plan.concurrency_cap,
        "starting benchmark run"
    );

    let progress = spinner(format!(
        "running {} iterations ({})",
        plan.iterations, plan.strategy
    ));
    let raw = plan
        .strategy
        .execute(&runner, plan.iterations, plan.concurrency_cap, cancel)?;
    progress.finish_and_clear();

    let completed = raw.len() as u64;
    let samples = collect(raw, plan.iterations).map_err(|source| HarnessError::Integrity {
        source,
        completed,
        requested: plan.iterations,
    })?;

    let aggregates = aggregate(&samples);
    if all_failed(&samples) {
        tracing::warn!(
            "all {} iterations failed; aggregates are undefined",
            plan.iterations
        );
    }
    if cancel.is_cancelled() {
        let finished = samples.iter().filter(|s| !s.failed).count();
        tracing::warn!(
            "run cancelled after {} completed iteration(s); persisting partial record",
            finished
        );
    }

    let created_at = chrono::Utc::now();
    let record = AnalysisRecord {
        schema_version: SCHEMA_VERSION,
        id: generate_record_id(created_at),
        target_path: plan.target.display().to_string(),
        target_args: plan.target_args.clone(),
        strategy: plan.strategy,
        requested_iterations: plan.iterations,
        samples,
        aggregates,
        created_at,
        host: HostInfo::capture(),
    };

    let record_path = store.persist(&record)?;
    tracing::info!(id = %record.id, path = %record_path.display(), "record persisted");

    let comparison_path = match baseline {
        Some(base) => {
            let doc = compare_records(&base, &record)?;
            let path = store.persist_comparison(&doc)?;
            tracing::info!(
                base = %doc.base_id,
                path = %path.display(),
                "comparison written"
            );
            Some(path)
        }
        None => None,
    };

    Ok(AnalysisOutcome {
        record,
        record_path,
        comparison_path,
    })
}

fn validate(plan: &BenchmarkPlan) -> Result<(), HarnessError> {
    if plan.iterations == 0 {
        return Err(HarnessError::Validation(
            "iteration count must be at least 1".to_string(),
        ));
    }
    if plan.timeout.is_zero() {
        return Err(HarnessError::Validation(
            "per-iteration timeout must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message(message);
    progress
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_plan(output_dir: PathBuf, script: &str, iterations: u64) -> BenchmarkPlan {
        BenchmarkPlan {
            target: PathBuf::from("/bin/sh"),
            target_args: vec!["-c".to_string(), script.to_string()],
            strategy: Strategy::Sequential,
            iterations,
            concurrency_cap: 2,
            timeout: Duration::from_secs(10),
            output_dir,
            compare_to: None,
        }
    }

    #[test]
    fn test_zero_iterations_rejected_before_running() {
        let root = tempfile::tempdir().unwrap();
        let plan = sh_plan(root.path().to_path_buf(), "exit 0", 0);

        let result = run_analysis(&plan, &CancelToken::new());
        assert!(matches!(result, Err(HarnessError::Validation(_))));
        // Nothing may be persisted on a validation failure.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_successful_run_persists_full_record() {
        let root = tempfile::tempdir().unwrap();
        let plan = sh_plan(root.path().to_path_buf(), "exit 0", 5);

        let outcome = run_analysis(&plan, &CancelToken::new()).unwrap();
        assert_eq!(outcome.record.samples.len(), 5);
        assert!(outcome.record.samples.iter().all(|s| !s.failed));
        assert_eq!(
            outcome.record.aggregates["wall_time_ms"].failure_count,
            0
        );
        assert!(outcome.record_path.is_file());
        assert!(outcome.comparison_path.is_none());

        // The persisted document reloads bit-for-bit.
        let store = RecordStore::new(root.path());
        let reloaded = store.load(&outcome.record.id).unwrap();
        assert_eq!(outcome.record, reloaded);
    }

    #[test]
    fn test_all_failed_run_is_still_persisted() {
        let root = tempfile::tempdir().unwrap();
        let mut plan = sh_plan(root.path().to_path_buf(), "exit 1", 3);
        plan.target = PathBuf::from("/nonexistent/target");
        plan.target_args = Vec::new();

        let outcome = run_analysis(&plan, &CancelToken::new()).unwrap();
        assert_eq!(outcome.record.samples.len(), 3);
        assert!(outcome.record.samples.iter().all(|s| s.failed));
        assert_eq!(outcome.record.aggregates["wall_time_ms"].mean, None);
        assert!(outcome.record_path.is_file());
    }

    #[test]
    fn test_compare_against_prior_record() {
        let root = tempfile::tempdir().unwrap();

        let first = run_analysis(
            &sh_plan(root.path().to_path_buf(), "exit 0", 3),
            &CancelToken::new(),
        )
        .unwrap();

        let mut second_plan = sh_plan(root.path().to_path_buf(), "exit 0", 3);
        second_plan.compare_to = Some(first.record.id.clone());
        let second = run_analysis(&second_plan, &CancelToken::new()).unwrap();

        let comparison_path = second.comparison_path.unwrap();
        assert!(comparison_path.is_file());
        assert!(comparison_path.starts_with(
            RecordStore::new(root.path()).record_dir(&second.record.id)
        ));
    }

    #[test]
    fn test_unknown_baseline_fails_before_running() {
        let root = tempfile::tempdir().unwrap();
        let mut plan = sh_plan(root.path().to_path_buf(), "exit 0", 3);
        plan.compare_to = Some("no-such-record".to_string());

        let result = run_analysis(&plan, &CancelToken::new());
        assert!(matches!(
            result,
            Err(HarnessError::Store(StoreError::NotFound(_)))
        ));
        // The failed invocation must not leave a record behind.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
