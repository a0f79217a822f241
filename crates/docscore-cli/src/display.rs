//! Terminal summaries: a card per pass and the final leaderboard.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::run::PassReport;

/// Print one pass as a vertical card: per-field means, then totals.
pub fn print_pass_card(report: &PassReport) {
    println!("=== {} / {} ===", report.model, report.prompt);
    println!();

    println!("Field means");
    for (field, mean) in &report.summary.field_means {
        println!("  {:<26} {:.4}", field.name(), mean);
    }
    println!();

    println!("Totals");
    println!("  {:<26} {:.4}", "macro_accuracy", report.summary.macro_accuracy);
    println!("  {:<26} {}", "documents", report.summary.documents);
    println!("  {:<26} {}", "failures", report.summary.failures);
    let tokens: usize = report.table.rows().iter().map(|r| r.tokens).sum();
    println!("  {:<26} {}", "tokens", tokens);
    if !report.skipped.is_empty() {
        println!("  {:<26} {}", "skipped", report.skipped.join(", "));
    }
    println!("  {:<26} {}", "report", report.report_path.display());
    println!();
}

/// Passes ranked by macro accuracy, best first. Ties keep run order.
pub fn leaderboard_batch(reports: &[PassReport]) -> anyhow::Result<RecordBatch> {
    let mut ranked: Vec<&PassReport> = reports.iter().collect();
    ranked.sort_by(|a, b| b.summary.macro_accuracy.total_cmp(&a.summary.macro_accuracy));

    let schema = Arc::new(Schema::new(vec![
        Field::new("model", DataType::Utf8, false),
        Field::new("prompt", DataType::Utf8, false),
        Field::new("macro_accuracy", DataType::Float64, false),
        Field::new("documents", DataType::UInt64, false),
        Field::new("failures", DataType::UInt64, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(ranked.iter().map(|r| r.model.as_str()))),
        Arc::new(StringArray::from_iter_values(ranked.iter().map(|r| r.prompt.as_str()))),
        Arc::new(Float64Array::from_iter_values(
            ranked.iter().map(|r| r.summary.macro_accuracy),
        )),
        Arc::new(UInt64Array::from_iter_values(
            ranked.iter().map(|r| r.summary.documents as u64),
        )),
        Arc::new(UInt64Array::from_iter_values(
            ranked.iter().map(|r| r.summary.failures as u64),
        )),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn print_leaderboard(reports: &[PassReport]) -> anyhow::Result<()> {
    if reports.is_empty() {
        println!("(no passes)");
        return Ok(());
    }
    let batch = leaderboard_batch(reports)?;
    println!("Leaderboard");
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}
