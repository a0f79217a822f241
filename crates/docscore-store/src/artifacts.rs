//! Per-run result layout: `<results>/<execution>/<model>/<prompt>/`.
//!
//! Each pass directory holds one prediction JSON per document, the score
//! table, and `summary.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docscore_core::{Extraction, ReportFormat, Summary, path_component};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::StoreError;

/// Aggregates of one (model, prompt) pass as written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PassRecord {
    pub execution: String,
    pub model: String,
    pub prompt: String,
    pub macro_accuracy: f64,
    /// Field name → mean, in report column order.
    pub field_means: Map<String, Value>,
    pub documents: usize,
    pub failures: usize,
    /// Documents left out because their golden record could not be loaded.
    pub skipped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PassRecord {
    pub fn new(
        execution: &str,
        model: &str,
        prompt: &str,
        summary: &Summary,
        skipped: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let field_means = summary
            .field_means
            .iter()
            .map(|(field, mean)| (field.name().to_string(), Value::from(*mean)))
            .collect();
        Self {
            execution: execution.to_string(),
            model: model.to_string(),
            prompt: prompt.to_string(),
            macro_accuracy: summary.macro_accuracy,
            field_means,
            documents: summary.documents,
            failures: summary.failures,
            skipped,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Results directory of one execution.
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    /// Create `root` (and parents) if missing.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pass_dir(&self, model: &str, prompt: &str) -> PathBuf {
        self.root.join(path_component(model)).join(path_component(prompt))
    }

    /// Write the full extraction (error fields included) for one document.
    pub fn write_prediction(
        &self,
        model: &str,
        prompt: &str,
        document_id: &str,
        prediction: &Extraction,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.pass_dir(model, prompt);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{document_id}.json"));
        write_json(&path, &prediction.to_artifact())?;
        debug!(path = %path.display(), "wrote prediction");
        Ok(path)
    }

    pub fn report_path(&self, model: &str, prompt: &str, format: ReportFormat) -> PathBuf {
        self.pass_dir(model, prompt)
            .join(format!("scores.{}", format.extension()))
    }

    pub fn write_summary(&self, record: &PassRecord) -> Result<PathBuf, StoreError> {
        let dir = self.pass_dir(&record.model, &record.prompt);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("summary.json");
        write_json(&path, record)?;
        Ok(path)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
    Ok(())
}
