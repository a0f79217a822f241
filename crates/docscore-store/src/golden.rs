//! Golden (hand-labelled) records, one JSON file per document.

use std::path::{Path, PathBuf};

use docscore_core::Record;

use crate::StoreError;

/// Reads `<dir>/<document-id>.json`.
pub struct GoldenStore {
    dir: PathBuf,
}

impl GoldenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("{document_id}.json"))
    }

    /// Load and validate the golden record for a document.
    pub fn load(&self, document_id: &str) -> Result<Record, StoreError> {
        let path = self.path_for(document_id);
        load_golden(&path)
    }
}

fn load_golden(path: &Path) -> Result<Record, StoreError> {
    if !path.is_file() {
        return Err(StoreError::GoldenNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| StoreError::GoldenUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&text).map_err(|source| StoreError::GoldenMalformed {
        path: path.to_path_buf(),
        source,
    })?;
    Record::from_golden(value).map_err(|source| StoreError::GoldenInvalid {
        path: path.to_path_buf(),
        source,
    })
}
