//! Thread-Pool Strategy
//!
//! Iterations are submitted to a fixed-size rayon pool; each worker spawns
//! the target as its own child process and sends the resulting sample back
//! over a bounded channel. One sample is sent per iteration, exactly once,
//! so the no-loss/no-duplication invariant is enforced by the channel
//! discipline rather than by a shared, lock-guarded collection.

use crate::cancel::CancelToken;
use crate::runner::ProcessRunner;
use crate::sample::Sample;
use crate::strategy::StrategyError;
use rayon::ThreadPoolBuilder;
use std::sync::mpsc;

pub(super) fn execute(
    runner: &ProcessRunner,
    iterations: u64,
    degree: usize,
    cancel: &CancelToken,
) -> Result<Vec<Sample>, StrategyError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(degree)
        .build()
        .map_err(|e| StrategyError::Pool(e.to_string()))?;

    let (tx, rx) = mpsc::sync_channel::<Sample>(degree);
    let samples = pool.in_place_scope(|scope| {
        for index in 0..iterations {
            let tx = tx.clone();
            scope.spawn(move |_| {
                // A closed receiver cannot happen while the drain below is
                // running; the send result is ignored rather than unwrapped
                // so a worker can never panic the pool.
                let _ = tx.send(runner.run(index, cancel));
            });
        }
        drop(tx);

        // Drain on the calling thread while the workers run; the iterator
        // ends once every worker has sent its sample and hung up.
        rx.iter().collect::<Vec<Sample>>()
    });

    Ok(samples)
}
