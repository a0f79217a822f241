//! Few-shot prompt variants.
//!
//! Prompts live in one directory as `0shot.txt`, `1shot.txt`, ... The
//! zero-shot text is the shared base instruction; every k-shot file holds
//! only the worked examples that precede the document.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read prompt {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no prompt shots configured")]
    Empty,
}

/// One immutable prompt variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptVariant {
    /// `<k>shot`
    pub name: String,
    /// Shared task instruction, appended after the document text.
    pub base: String,
    /// Shot-specific worked examples, placed before the document text.
    pub prefix: String,
}

impl PromptVariant {
    /// Request text sent to the model for one document.
    pub fn render(&self, document_text: &str) -> String {
        format!("{}\n\n{}\n\n{}", self.prefix, document_text, self.base)
    }
}

/// Load `shots` prompt variants (`0shot` .. `<shots-1>shot`) from `dir`.
pub fn load_prompts(dir: &Path, shots: usize) -> Result<Vec<PromptVariant>, PromptError> {
    if shots == 0 {
        return Err(PromptError::Empty);
    }

    let base = read_prompt(&dir.join("0shot.txt"))?;
    let mut variants = Vec::with_capacity(shots);
    variants.push(PromptVariant {
        name: "0shot".to_string(),
        base: base.clone(),
        prefix: String::new(),
    });

    for k in 1..shots {
        let name = format!("{k}shot");
        let prefix = read_prompt(&dir.join(format!("{name}.txt")))?;
        variants.push(PromptVariant {
            name,
            base: base.clone(),
            prefix,
        });
    }

    info!(dir = %dir.display(), count = variants.len(), "loaded prompt variants");
    Ok(variants)
}

/// Read one prompt file, trimmed, with double quotes swapped for single
/// quotes so the text embeds cleanly in the JSON request.
fn read_prompt(path: &Path) -> Result<String, PromptError> {
    if !path.exists() {
        return Err(PromptError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.trim().replace('"', "'"))
}
