mod display;
mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use docscore_ai::{InferenceClient, load_counter};
use docscore_core::{ModelProvider, RunConfig, Scorer, Secrets, load_prompts};
use docscore_ocr::OcrClient;
use docscore_store::{ExtractionCache, GoldenStore, RunDirectory, list_documents};
use tracing::{Level, info, warn};

use crate::run::Evaluator;

/// Score LLM document extraction against golden records across a matrix of
/// models and few-shot prompts.
#[derive(Parser, Debug)]
#[command(name = "docscore", version)]
struct Cli {
    /// Run configuration.
    #[arg(long, env = "DOCSCORE_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Inference and OCR credentials.
    #[arg(long, env = "DOCSCORE_SECRETS", default_value = "secrets.json")]
    secrets: PathBuf,

    /// Override the execution name from the config.
    #[arg(long)]
    execution: Option<String>,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Hide the progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    info!("docscore v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RunConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if let Some(execution) = cli.execution {
        config.execution = execution;
        config.validate().context("invalid --execution")?;
    }
    config.check_inputs()?;
    let secrets = Secrets::load(&cli.secrets)
        .with_context(|| format!("loading secrets {}", cli.secrets.display()))?;

    let models = config
        .models_used
        .iter()
        .map(|model| {
            let params = config
                .model_params(model)
                .with_context(|| format!("no parameters for model {model}"))?;
            let client = InferenceClient::new(&secrets.inference, model, params)
                .with_context(|| format!("building inference client for {model}"))?;
            Ok(Box::new(client) as Box<dyn ModelProvider>)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let prompts = load_prompts(&config.paths.prompts, config.shots)?;
    let documents = list_documents(&config.paths.docs())?;
    if documents.is_empty() {
        warn!(dir = %config.paths.docs().display(), "no documents to evaluate");
    }
    info!(
        execution = %config.execution,
        models = models.len(),
        prompts = prompts.len(),
        documents = documents.len(),
        "starting evaluation"
    );

    let ocr = OcrClient::from_secrets(&secrets.ocr);
    let evaluator = Evaluator {
        execution: config.execution.clone(),
        scorer: Scorer::new(config.fields.clone()),
        cache: ExtractionCache::open(config.paths.ocr_cache(), Box::new(ocr))?,
        golden: GoldenStore::new(config.paths.golden()),
        results: RunDirectory::create(config.results_dir())?,
        tokens: load_counter(config.tokenizer.as_deref())?,
        report_format: config.report_format,
        on_golden_error: config.on_golden_error,
        progress: !cli.no_progress,
    };

    let reports = evaluator.run(&models, &prompts, &documents).await?;
    for report in &reports {
        display::print_pass_card(report);
    }
    display::print_leaderboard(&reports)?;
    info!(results = %evaluator.results.root().display(), "evaluation complete");
    Ok(())
}
