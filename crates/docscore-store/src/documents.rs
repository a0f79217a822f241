//! Source document discovery.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::StoreError;

/// A scanned source document. Its id (file stem) keys the golden file,
/// the extraction cache entry, and the prediction artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
}

impl Document {
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let id = path.file_stem()?.to_string_lossy().into_owned();
        Some(Self { id, path })
    }
}

/// List the regular, non-hidden files in `dir`, sorted lexicographically by
/// file name so every run visits documents in the same order.
pub fn list_documents(dir: &Path) -> Result<Vec<Document>, StoreError> {
    if !dir.is_dir() {
        return Err(StoreError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut documents: Vec<Document> = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(doc) = Document::from_path(path) else {
            continue;
        };
        if let Some(prev) = documents.iter().find(|d| d.id == doc.id) {
            return Err(StoreError::DuplicateDocument {
                id: doc.id,
                first: prev.path.clone(),
                second: doc.path,
            });
        }
        documents.push(doc);
    }

    info!(dir = %dir.display(), count = documents.len(), "listed documents");
    Ok(documents)
}
