//! Record Store
//!
//! Directory-per-record persistence: `<root>/<id>/record.json`, a byte
//! copy of the benchmarked executable for reproducibility, and (when a
//! comparison was requested) `comparison.json` alongside. Records are
//! written once and never revised. The root of the tree is provided by
//! the caller; only per-id subdirectories are created here.

use crate::record::{AnalysisRecord, ComparisonDoc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the record document inside its directory.
pub const RECORD_FILE: &str = "record.json";
/// File name of the comparison document inside the candidate's directory.
pub const COMPARISON_FILE: &str = "comparison.json";
/// File name of the copied target executable.
pub const TARGET_COPY_FILE: &str = "target";

/// Errors from persisting or loading records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record directory exists for this id
    #[error("record {0} not found")]
    NotFound(String),

    /// A record directory already exists for this id
    #[error("record {0} already exists")]
    AlreadyExists(String),

    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document does not parse
    #[error("malformed record document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Handle on the record tree.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Open a store rooted at the given directory. The directory itself is
    /// expected to exist; an external initializer owns creation policy.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root of the record tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a record with this id lives in.
    pub fn record_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Persist a finalized record, returning the path of the written
    /// document. A record is written exactly once; an existing directory
    /// for the same id is an error, never an overwrite.
    pub fn persist(&self, record: &AnalysisRecord) -> Result<PathBuf, StoreError> {
        let dir = self.record_dir(&record.id);
        if dir.exists() {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        fs::create_dir_all(&dir)?;

        let path = dir.join(RECORD_FILE);
        fs::write(&path, serde_json::to_string_pretty(record)?)?;

        // Keep a copy of the executable next to its measurements so the
        // run can be reproduced even after the original moves.
        let target = Path::new(&record.target_path);
        if target.is_file() {
            if let Err(e) = fs::copy(target, dir.join(TARGET_COPY_FILE)) {
                tracing::warn!(
                    target_path = %target.display(),
                    "could not copy target for reproducibility: {}", e
                );
            }
        }

        Ok(path)
    }

    /// Load a record by id.
    pub fn load(&self, id: &str) -> Result<AnalysisRecord, StoreError> {
        let path = self.record_dir(id).join(RECORD_FILE);
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write a comparison document into the candidate record's directory,
    /// returning the path of the written document.
    pub fn persist_comparison(&self, doc: &ComparisonDoc) -> Result<PathBuf, StoreError> {
        let dir = self.record_dir(&doc.candidate_id);
        if !dir.exists() {
            return Err(StoreError::NotFound(doc.candidate_id.clone()));
        }
        let path = dir.join(COMPARISON_FILE);
        fs::write(&path, serde_json::to_string_pretty(doc)?)?;
        Ok(path)
    }
}
