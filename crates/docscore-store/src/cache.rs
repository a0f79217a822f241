//! On-disk memo of extracted document text.
//!
//! One `<document-id>.txt` per document. A present file is trusted as-is;
//! there is no invalidation when the source document changes.

use std::io::Write;
use std::path::PathBuf;

use docscore_core::TextExtractor;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::StoreError;
use crate::documents::Document;

pub struct ExtractionCache {
    dir: PathBuf,
    extractor: Box<dyn TextExtractor>,
}

impl ExtractionCache {
    /// Open (and create if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>, extractor: Box<dyn TextExtractor>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, extractor })
    }

    pub fn path_for(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("{document_id}.txt"))
    }

    /// Cached text for a document, if any.
    pub fn lookup(&self, document_id: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(document_id);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    /// Return the document's text, calling the extractor on a miss.
    ///
    /// Extractor errors propagate and leave no cache entry behind. The entry
    /// is written to a temporary file and renamed into place, so a partial
    /// write is never read back as a hit.
    pub async fn get_text(&self, document: &Document) -> Result<String, StoreError> {
        if let Some(text) = self.lookup(&document.id)? {
            debug!(document = %document.id, "extraction cache hit");
            return Ok(text);
        }

        debug!(document = %document.id, "extraction cache miss");
        let text = self
            .extractor
            .extract(&document.path)
            .await
            .map_err(|source| StoreError::Extraction {
                document: document.id.clone(),
                source,
            })?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(self.path_for(&document.id))
            .map_err(|e| StoreError::Io(e.error))?;

        info!(document = %document.id, chars = text.len(), "cached extracted text");
        Ok(text)
    }
}
