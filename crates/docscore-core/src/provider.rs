//! Capability interfaces for the external collaborators.
//!
//! The evaluation loop only talks to these traits; HTTP backends live in
//! `docscore-ocr` and `docscore-ai`.

use std::path::Path;

use async_trait::async_trait;

use crate::record::Extraction;

/// Boxed error returned by collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a scanned document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the text of the document at `path`. Errors propagate to the
    /// caller unretried.
    async fn extract(&self, path: &Path) -> Result<String, BoxError>;
}

/// Structured extraction backed by a language model.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Model identifier, used for result paths and logs.
    fn name(&self) -> &str;

    /// Predict a record for `text`. Never fails: transport, status, and
    /// parse problems come back as [`Extraction::Failure`].
    async fn predict(&self, text: &str) -> Extraction;
}
