//! Evaluation loop: every model × prompt variant × document.
//!
//! Each (model, prompt) pass produces one score table, one prediction
//! artifact per document, a report file, and `summary.json`.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use docscore_ai::TokenCounter;
use docscore_core::{
    Extraction, GoldenPolicy, ModelProvider, PromptVariant, ReportFormat, Row, RunTable, Scorer,
    Summary,
};
use docscore_store::{Document, ExtractionCache, GoldenStore, PassRecord, RunDirectory, write_report};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} {msg}";

/// Outcome of one (model, prompt) pass.
#[derive(Debug)]
pub struct PassReport {
    pub model: String,
    pub prompt: String,
    pub table: RunTable,
    pub summary: Summary,
    pub skipped: Vec<String>,
    pub report_path: PathBuf,
}

/// Everything one execution needs besides the models and prompts.
pub struct Evaluator {
    pub execution: String,
    pub scorer: Scorer,
    pub cache: ExtractionCache,
    pub golden: GoldenStore,
    pub results: RunDirectory,
    pub tokens: Box<dyn TokenCounter>,
    pub report_format: ReportFormat,
    pub on_golden_error: GoldenPolicy,
    pub progress: bool,
}

impl Evaluator {
    /// Run every pass in configuration order: models outer, prompts inner.
    pub async fn run(
        &self,
        models: &[Box<dyn ModelProvider>],
        prompts: &[PromptVariant],
        documents: &[Document],
    ) -> anyhow::Result<Vec<PassReport>> {
        let mut reports = Vec::with_capacity(models.len() * prompts.len());
        for model in models {
            for prompt in prompts {
                reports.push(self.run_pass(model.as_ref(), prompt, documents).await?);
            }
        }
        Ok(reports)
    }

    /// Score one model with one prompt over all documents.
    pub async fn run_pass(
        &self,
        model: &dyn ModelProvider,
        prompt: &PromptVariant,
        documents: &[Document],
    ) -> anyhow::Result<PassReport> {
        let started_at = Utc::now();
        info!(
            model = model.name(),
            prompt = %prompt.name,
            documents = documents.len(),
            "starting pass"
        );

        let progress = self.progress_bar(documents.len(), model.name(), &prompt.name);
        let mut table = RunTable::new(self.scorer.fields().to_vec());
        let mut skipped = Vec::new();

        for document in documents {
            progress.set_message(document.id.clone());

            // Golden first: no inference is spent on a document that cannot be scored.
            let reference = match self.golden.load(&document.id) {
                Ok(record) => Extraction::from(record),
                Err(e) if e.is_golden() && self.on_golden_error == GoldenPolicy::Skip => {
                    warn!(document = %document.id, error = %e, "skipping document");
                    skipped.push(document.id.clone());
                    progress.inc(1);
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("loading golden record for {}", document.id));
                }
            };

            let text = self
                .cache
                .get_text(document)
                .await
                .with_context(|| format!("extracting text of {}", document.path.display()))?;

            let request = prompt.render(&text);
            let prediction = model.predict(&request).await;
            let scores = self.scorer.score(&prediction, &reference);

            self.results
                .write_prediction(model.name(), &prompt.name, &document.id, &prediction)
                .with_context(|| format!("writing prediction for {}", document.id))?;

            let rendered = prediction.render();
            let tokens = self.tokens.count(&request) + self.tokens.count(&rendered);
            debug!(document = %document.id, ?scores, tokens, "scored document");

            table.push(Row {
                scores,
                file: document.id.clone(),
                prediction: rendered,
                tokens,
                accuracy: None,
                failed: prediction.is_failure(),
            });
            progress.inc(1);
        }
        progress.finish_and_clear();

        let summary = table.finalize();
        for (field, mean) in &summary.field_means {
            info!(model = model.name(), prompt = %prompt.name, field = %field, mean, "field mean");
        }
        info!(
            model = model.name(),
            prompt = %prompt.name,
            macro_accuracy = summary.macro_accuracy,
            rows = summary.documents,
            failures = summary.failures,
            skipped = skipped.len(),
            "pass complete"
        );

        let report_path = self
            .results
            .report_path(model.name(), &prompt.name, self.report_format);
        write_report(&table, &report_path, self.report_format)
            .with_context(|| format!("writing report {}", report_path.display()))?;

        let record = PassRecord::new(
            &self.execution,
            model.name(),
            &prompt.name,
            &summary,
            skipped.clone(),
            started_at,
        );
        self.results
            .write_summary(&record)
            .context("writing pass summary")?;

        Ok(PassReport {
            model: model.name().to_string(),
            prompt: prompt.name.clone(),
            table,
            summary,
            skipped,
            report_path,
        })
    }

    fn progress_bar(&self, len: usize, model: &str, prompt: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_prefix(format!("{model}/{prompt}"));
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use docscore_ai::ApproxTokenCounter;
    use docscore_core::{BoxError, Field, Record, TextExtractor};
    use docscore_store::list_documents;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    /// Returns `text of <stem>` and counts calls.
    struct CountingExtractor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextExtractor for CountingExtractor {
        async fn extract(&self, path: &Path) -> Result<String, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(format!("text of {stem}"))
        }
    }

    struct BrokenExtractor;

    #[async_trait]
    impl TextExtractor for BrokenExtractor {
        async fn extract(&self, _path: &Path) -> Result<String, BoxError> {
            Err("service unavailable".into())
        }
    }

    /// Answers by matching the document text embedded in the request.
    struct ScriptedModel {
        name: String,
        answers: HashMap<String, Extraction>,
    }

    #[async_trait]
    impl ModelProvider for ScriptedModel {
        fn name(&self) -> &str {
            &self.name
        }

        async fn predict(&self, text: &str) -> Extraction {
            self.answers
                .iter()
                .find(|(doc, _)| text.contains(doc.as_str()))
                .map(|(_, answer)| answer.clone())
                .unwrap_or_else(|| Extraction::failure("no script", "NotAvail"))
        }
    }

    fn golden_a() -> Record {
        Record::default()
            .with(Field::Subject, "Invoice Due")
            .with(Field::Currency, "EUR")
    }

    fn golden_b() -> Record {
        Record::default()
            .with(Field::Subject, "Reminder")
            .with(Field::Currency, "USD")
    }

    struct Fixture {
        tmp: TempDir,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            for dir in ["docs", "golden"] {
                std::fs::create_dir(tmp.path().join(dir)).unwrap();
            }
            for (id, record) in [("a", golden_a()), ("b", golden_b())] {
                std::fs::write(tmp.path().join("docs").join(format!("{id}.pdf")), b"%PDF").unwrap();
                let golden = Value::Object(record.to_json()).to_string();
                std::fs::write(tmp.path().join("golden").join(format!("{id}.json")), golden)
                    .unwrap();
            }
            Self {
                tmp,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn documents(&self) -> Vec<Document> {
            list_documents(&self.tmp.path().join("docs")).unwrap()
        }

        fn evaluator(&self, policy: GoldenPolicy) -> Evaluator {
            let extractor = CountingExtractor {
                calls: self.calls.clone(),
            };
            Evaluator {
                execution: "test".into(),
                scorer: Scorer::new(vec![Field::Subject, Field::Currency]),
                cache: ExtractionCache::open(self.tmp.path().join("ocr"), Box::new(extractor))
                    .unwrap(),
                golden: GoldenStore::new(self.tmp.path().join("golden")),
                results: RunDirectory::create(self.tmp.path().join("results/test")).unwrap(),
                tokens: Box::new(ApproxTokenCounter),
                report_format: ReportFormat::Csv,
                on_golden_error: policy,
                progress: false,
            }
        }
    }

    fn prompt(name: &str) -> PromptVariant {
        PromptVariant {
            name: name.into(),
            base: "Return JSON.".into(),
            prefix: String::new(),
        }
    }

    fn perfect_model() -> Box<dyn ModelProvider> {
        Box::new(ScriptedModel {
            name: "perfect".into(),
            answers: HashMap::from([
                ("text of a".to_string(), golden_a().into()),
                ("text of b".to_string(), golden_b().into()),
            ]),
        })
    }

    fn half_model() -> Box<dyn ModelProvider> {
        Box::new(ScriptedModel {
            name: "org/half".into(),
            answers: HashMap::from([
                ("text of a".to_string(), golden_a().into()),
                (
                    "text of b".to_string(),
                    Extraction::failure("server returned 500", "boom"),
                ),
            ]),
        })
    }

    #[tokio::test]
    async fn one_row_per_document_in_order() {
        let fx = Fixture::new();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);

        let report = evaluator
            .run_pass(perfect_model().as_ref(), &prompt("0shot"), &fx.documents())
            .await
            .unwrap();

        let files: Vec<&str> = report.table.rows().iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["a", "b"]);
        assert_eq!(report.summary.macro_accuracy, 1.0);
        assert_eq!(report.summary.failures, 0);
        assert!(report.report_path.ends_with("perfect/0shot/scores.csv"));
        assert!(report.report_path.exists());
    }

    #[tokio::test]
    async fn failure_rows_score_zero_and_keep_raw_text() {
        let fx = Fixture::new();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);

        let report = evaluator
            .run_pass(half_model().as_ref(), &prompt("0shot"), &fx.documents())
            .await
            .unwrap();

        let rows = report.table.rows();
        assert_eq!(rows[1].scores, vec![0.0, 0.0]);
        assert!(rows[1].failed);
        assert_eq!(rows[1].prediction, "server returned 500\nboom");
        assert_eq!(rows[1].accuracy, Some(0.0));
        assert_eq!(report.summary.failures, 1);

        // Macro accuracy equals the mean of row accuracies.
        let row_mean = rows.iter().filter_map(|r| r.accuracy).sum::<f64>() / rows.len() as f64;
        assert!((report.summary.macro_accuracy - row_mean).abs() < 1e-12);
        assert!((report.summary.macro_accuracy - 0.5).abs() < 1e-12);

        let artifact = fx
            .tmp
            .path()
            .join("results/test/org_half/0shot/b.json");
        let artifact: Value =
            serde_json::from_str(&std::fs::read_to_string(artifact).unwrap()).unwrap();
        assert_eq!(artifact["error_message"], json!("server returned 500"));
        assert_eq!(artifact["error_prediction"], json!("boom"));
    }

    #[tokio::test]
    async fn extraction_is_cached_across_passes() {
        let fx = Fixture::new();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);
        let models = vec![perfect_model(), half_model()];
        let prompts = vec![prompt("0shot"), prompt("1shot")];

        let reports = evaluator
            .run(&models, &prompts, &fx.documents())
            .await
            .unwrap();

        assert_eq!(reports.len(), 4);
        let order: Vec<(&str, &str)> = reports
            .iter()
            .map(|r| (r.model.as_str(), r.prompt.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("perfect", "0shot"),
                ("perfect", "1shot"),
                ("org/half", "0shot"),
                ("org/half", "1shot"),
            ]
        );
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
        assert!(fx.tmp.path().join("ocr/a.txt").exists());
    }

    #[tokio::test]
    async fn missing_golden_is_skipped_and_recorded() {
        let fx = Fixture::new();
        std::fs::remove_file(fx.tmp.path().join("golden/b.json")).unwrap();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);

        let report = evaluator
            .run_pass(perfect_model().as_ref(), &prompt("0shot"), &fx.documents())
            .await
            .unwrap();

        assert_eq!(report.table.len(), 1);
        assert_eq!(report.skipped, vec!["b"]);
        // No inference or extraction for the skipped document.
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        let summary = fx.tmp.path().join("results/test/perfect/0shot/summary.json");
        let summary: Value =
            serde_json::from_str(&std::fs::read_to_string(summary).unwrap()).unwrap();
        assert_eq!(summary["skipped"], json!(["b"]));
        assert_eq!(summary["documents"], json!(1));
    }

    #[tokio::test]
    async fn unreadable_golden_is_skipped() {
        let fx = Fixture::new();
        std::fs::write(fx.tmp.path().join("golden/b.json"), b"\xff\xfe").unwrap();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);

        let report = evaluator
            .run_pass(perfect_model().as_ref(), &prompt("0shot"), &fx.documents())
            .await
            .unwrap();

        assert_eq!(report.table.len(), 1);
        assert_eq!(report.table.rows()[0].file, "a");
        assert_eq!(report.skipped, vec!["b"]);
    }

    #[tokio::test]
    async fn missing_golden_aborts_under_abort_policy() {
        let fx = Fixture::new();
        std::fs::write(fx.tmp.path().join("golden/b.json"), "{ broken").unwrap();
        let evaluator = fx.evaluator(GoldenPolicy::Abort);

        let err = evaluator
            .run_pass(perfect_model().as_ref(), &prompt("0shot"), &fx.documents())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("loading golden record for b"));
    }

    #[tokio::test]
    async fn extraction_failure_aborts_the_pass() {
        let fx = Fixture::new();
        let mut evaluator = fx.evaluator(GoldenPolicy::Skip);
        evaluator.cache =
            ExtractionCache::open(fx.tmp.path().join("ocr"), Box::new(BrokenExtractor)).unwrap();

        let err = evaluator
            .run_pass(perfect_model().as_ref(), &prompt("0shot"), &fx.documents())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("extracting text of"));
        assert!(!fx.tmp.path().join("ocr/a.txt").exists());
    }

    #[tokio::test]
    async fn tokens_cover_request_and_response() {
        let fx = Fixture::new();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);
        let prompt = prompt("0shot");

        let report = evaluator
            .run_pass(perfect_model().as_ref(), &prompt, &fx.documents())
            .await
            .unwrap();

        let row = &report.table.rows()[0];
        let expected = ApproxTokenCounter.count(&prompt.render("text of a"))
            + ApproxTokenCounter.count(&row.prediction);
        assert_eq!(row.tokens, expected);
    }

    #[tokio::test]
    async fn empty_document_set_reports_zero() {
        let fx = Fixture::new();
        let evaluator = fx.evaluator(GoldenPolicy::Skip);

        let report = evaluator
            .run_pass(perfect_model().as_ref(), &prompt("0shot"), &[])
            .await
            .unwrap();
        assert!(report.table.is_empty());
        assert_eq!(report.summary.macro_accuracy, 0.0);
    }
}
