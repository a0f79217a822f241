use std::path::PathBuf;

use docscore_core::{BoxError, RecordError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("documents {first} and {second} share the id `{id}`")]
    DuplicateDocument {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("golden file not found: {0}")]
    GoldenNotFound(PathBuf),

    #[error("failed to read golden file {path}: {source}")]
    GoldenUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("golden file {path} is not valid JSON: {source}")]
    GoldenMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("golden file {path} does not match the schema: {source}")]
    GoldenInvalid {
        path: PathBuf,
        #[source]
        source: RecordError,
    },

    #[error("text extraction failed for {document}: {source}")]
    Extraction {
        document: String,
        #[source]
        source: BoxError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl StoreError {
    /// Whether this error concerns a document's golden record.
    pub fn is_golden(&self) -> bool {
        matches!(
            self,
            Self::GoldenNotFound(_)
                | Self::GoldenUnreadable { .. }
                | Self::GoldenMalformed { .. }
                | Self::GoldenInvalid { .. }
        )
    }
}
