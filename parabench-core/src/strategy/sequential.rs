//! Sequential Strategy
//!
//! Iterations run one after another on the caller's thread; the runner's
//! own cancellation check turns not-yet-started iterations into failed
//! samples, so the result set stays complete even when a run is cut short.

use crate::cancel::CancelToken;
use crate::runner::ProcessRunner;
use crate::sample::Sample;

pub(super) fn execute(
    runner: &ProcessRunner,
    iterations: u64,
    cancel: &CancelToken,
) -> Vec<Sample> {
    (0..iterations).map(|index| runner.run(index, cancel)).collect()
}
