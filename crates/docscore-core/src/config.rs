//! Run configuration (`config.json`) and service credentials (`secrets.json`).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::Field;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no models configured in `models_used`")]
    NoModels,
    #[error("model `{0}` has no entry in `models_config`")]
    MissingModelConfig(String),
    #[error("no scorable fields configured")]
    NoFields,
    #[error("field `{0}` listed more than once")]
    DuplicateField(Field),
    #[error("`shots` must be at least 1")]
    NoShots,
    #[error("model `{0}` listed more than once")]
    DuplicateModel(String),
    #[error("models `{first}` and `{second}` share the result directory `{dir}`")]
    ModelDirCollision {
        first: String,
        second: String,
        dir: String,
    },
    #[error("execution name must be a non-empty single path segment, got {0:?}")]
    InvalidExecution(String),
    #[error("required directory does not exist: {0}")]
    MissingDirectory(PathBuf),
}

/// Tabular format of the per-pass report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Parquet,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// What to do when a document's golden record cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoldenPolicy {
    /// Leave the document out of the table and list it as skipped.
    #[default]
    Skip,
    /// Stop the whole run.
    Abort,
}

/// Filesystem roots.
#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Holds `docs/`, `golden/`, and the `ocr/` extraction cache.
    pub data: PathBuf,
    /// Holds `<k>shot.txt` prompt files.
    pub prompts: PathBuf,
    /// Results root; each execution gets its own subdirectory.
    pub results: PathBuf,
}

impl Paths {
    pub fn docs(&self) -> PathBuf {
        self.data.join("docs")
    }

    pub fn golden(&self) -> PathBuf {
        self.data.join("golden")
    }

    pub fn ocr_cache(&self) -> PathBuf {
        self.data.join("ocr")
    }
}

fn default_shots() -> usize {
    4
}

/// Evaluation run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Run name; results land in `<results>/<execution>`.
    pub execution: String,
    /// Model identifiers, evaluated in this order.
    pub models_used: Vec<String>,
    /// Per-model inference parameters, forwarded verbatim.
    #[serde(default)]
    pub models_config: BTreeMap<String, Map<String, Value>>,
    pub paths: Paths,
    /// Scorable fields; this order is the report column order.
    pub fields: Vec<Field>,
    /// Number of prompt variants (`0shot` .. `<shots-1>shot`).
    #[serde(default = "default_shots")]
    pub shots: usize,
    #[serde(default)]
    pub report_format: ReportFormat,
    #[serde(default)]
    pub on_golden_error: GoldenPolicy,
    /// `tokenizer.json` for exact token counts; approximated when unset.
    #[serde(default)]
    pub tokenizer: Option<PathBuf>,
}

impl RunConfig {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not touch the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.is_empty()
            || self.execution.contains(['/', '\\'])
            || self.execution == "."
            || self.execution == ".."
        {
            return Err(ConfigError::InvalidExecution(self.execution.clone()));
        }
        if self.models_used.is_empty() {
            return Err(ConfigError::NoModels);
        }
        let mut dirs: HashMap<String, &String> = HashMap::new();
        for model in &self.models_used {
            if let Some(first) = dirs.insert(path_component(model), model) {
                if first == model {
                    return Err(ConfigError::DuplicateModel(model.clone()));
                }
                return Err(ConfigError::ModelDirCollision {
                    first: first.clone(),
                    second: model.clone(),
                    dir: path_component(model),
                });
            }
        }
        if let Some(model) = self
            .models_used
            .iter()
            .find(|m| !self.models_config.contains_key(*m))
        {
            return Err(ConfigError::MissingModelConfig(model.clone()));
        }
        if self.fields.is_empty() {
            return Err(ConfigError::NoFields);
        }
        let mut seen = HashSet::new();
        if let Some(field) = self.fields.iter().find(|f| !seen.insert(**f)) {
            return Err(ConfigError::DuplicateField(*field));
        }
        if self.shots == 0 {
            return Err(ConfigError::NoShots);
        }
        Ok(())
    }

    /// Check that every input directory exists.
    pub fn check_inputs(&self) -> Result<(), ConfigError> {
        for dir in [
            self.paths.data.clone(),
            self.paths.prompts.clone(),
            self.paths.docs(),
            self.paths.golden(),
        ] {
            if !dir.is_dir() {
                return Err(ConfigError::MissingDirectory(dir));
            }
        }
        Ok(())
    }

    pub fn model_params(&self, model: &str) -> Option<&Map<String, Value>> {
        self.models_config.get(model)
    }

    /// `<results>/<execution>`
    pub fn results_dir(&self) -> PathBuf {
        self.paths.results.join(&self.execution)
    }
}

/// Credentials for the inference endpoint and the OCR service.
#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub inference: InferenceSecrets,
    pub ocr: OcrSecrets,
}

#[derive(Clone, Deserialize)]
pub struct InferenceSecrets {
    pub url: String,
    /// Extra request headers (auth, resource group, ...).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Clone, Deserialize)]
pub struct OcrSecrets {
    pub url: String,
    pub api_key: String,
}

impl fmt::Debug for InferenceSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceSecrets")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Debug for OcrSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrSecrets")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }
}

/// Directory name for a model or prompt id: `/`, `\` and `:` become `_`
/// so ids like `org/model` do not create nested directories.
pub fn path_component(name: &str) -> String {
    name.replace(['/', '\\', ':'], "_")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
