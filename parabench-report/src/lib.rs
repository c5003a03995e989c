#![warn(missing_docs)]
//! Parabench Reports
//!
//! The persisted unit of one benchmark invocation and its storage:
//! - [`AnalysisRecord`] holds raw samples, aggregates and metadata under a
//!   unique, time-ordered identifier
//! - [`RecordStore`] persists records in a directory-per-id layout with a
//!   copy of the benchmarked executable for reproducibility
//! - [`compare_records`] produces the comparison document written
//!   alongside a new record

mod record;
mod store;

pub use record::{
    compare_records, generate_record_id, AnalysisRecord, ComparisonDoc, HostInfo, SCHEMA_VERSION,
};
pub use store::{RecordStore, StoreError, COMPARISON_FILE, RECORD_FILE, TARGET_COPY_FILE};
