//! Storage layer: source documents, golden labels, extraction cache, and run artifacts.

mod error;
pub use error::StoreError;

pub mod artifacts;
pub mod cache;
pub mod documents;
pub mod golden;
pub mod report;

pub use artifacts::{PassRecord, RunDirectory};
pub use cache::ExtractionCache;
pub use documents::{Document, list_documents};
pub use golden::GoldenStore;
pub use report::{read_parquet, write_report};
