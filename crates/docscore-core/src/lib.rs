pub mod config;
pub mod prompt;
pub mod provider;
pub mod record;
pub mod scoring;
pub mod table;

pub use config::{
    ConfigError, GoldenPolicy, Paths, ReportFormat, RunConfig, Secrets, path_component,
};
pub use prompt::{PromptError, PromptVariant, load_prompts};
pub use provider::{BoxError, ModelProvider, TextExtractor};
pub use record::{Extraction, Failure, Field, FieldKind, Record, RecordError, json_type_name};
pub use scoring::Scorer;
pub use table::{Row, RunTable, Summary};
