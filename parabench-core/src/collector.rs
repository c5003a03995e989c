//! Sample Collection
//!
//! Assembles raw per-iteration samples (possibly produced out of order by
//! concurrent strategies) into the ordered result set, with a fail-fast
//! integrity check that every requested iteration is present exactly once.
//! An integrity violation signals a strategy implementation bug, not a user
//! error, and must abort the run before anything is persisted.

use crate::sample::Sample;
use thiserror::Error;

/// Integrity violations in a strategy's sample set.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The strategy returned a different number of samples than requested
    #[error("strategy returned {actual} samples for {expected} iterations")]
    CountMismatch {
        /// Requested iteration count
        expected: u64,
        /// Samples actually returned
        actual: u64,
    },

    /// Two samples claim the same iteration
    #[error("duplicate sample for iteration {index}")]
    DuplicateIndex {
        /// The duplicated iteration index
        index: u64,
    },

    /// No sample claims this iteration
    #[error("missing sample for iteration {index}")]
    MissingIndex {
        /// The absent iteration index
        index: u64,
    },
}

/// Order a raw sample set by iteration index and verify its integrity.
///
/// Exactly `expected` samples with indices `0..expected`, each appearing
/// once, must be present.
pub fn collect(mut samples: Vec<Sample>, expected: u64) -> Result<Vec<Sample>, CollectError> {
    if samples.len() as u64 != expected {
        return Err(CollectError::CountMismatch {
            expected,
            actual: samples.len() as u64,
        });
    }

    samples.sort_by_key(|s| s.iteration_index);

    // After sorting, position and index must agree everywhere: a sample
    // above its position means the position's index is missing, one below
    // means that index appeared twice.
    for (position, sample) in samples.iter().enumerate() {
        let index = position as u64;
        if sample.iteration_index > index {
            return Err(CollectError::MissingIndex { index });
        }
        if sample.iteration_index < index {
            return Err(CollectError::DuplicateIndex {
                index: sample.iteration_index,
            });
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(index: u64) -> Sample {
        Sample::failure(index, 0.0, "test")
    }

    #[test]
    fn test_sorts_out_of_order_samples() {
        let raw = vec![sample(2), sample(0), sample(1)];
        let ordered = collect(raw, 3).unwrap();
        let indices: Vec<u64> = ordered.iter().map(|s| s.iteration_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_count_mismatch() {
        let raw = vec![sample(0), sample(1)];
        assert!(matches!(
            collect(raw, 3),
            Err(CollectError::CountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_duplicate_index() {
        let raw = vec![sample(0), sample(1), sample(1)];
        assert!(matches!(
            collect(raw, 3),
            Err(CollectError::DuplicateIndex { index: 1 })
        ));
    }

    #[test]
    fn test_missing_index() {
        let raw = vec![sample(0), sample(2), sample(3)];
        assert!(matches!(
            collect(raw, 3),
            Err(CollectError::MissingIndex { index: 1 })
        ));
    }

    #[test]
    fn test_single_sample() {
        let ordered = collect(vec![sample(0)], 1).unwrap();
        assert_eq!(ordered.len(), 1);
    }
}
