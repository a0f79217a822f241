//! Score table persistence.
//!
//! A finalized [`RunTable`] becomes one Arrow batch: one `Float64` column per
//! scorable field (configured order), then `file`, `prediction`, `tokens`,
//! and `acc` (row-level overall accuracy). The batch is written as CSV or
//! Parquet.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field as ArrowField, Schema};
use arrow::record_batch::RecordBatch;
use docscore_core::{Field, ReportFormat, RunTable};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::StoreError;

pub const FILE_COLUMN: &str = "file";
pub const PREDICTION_COLUMN: &str = "prediction";
pub const TOKENS_COLUMN: &str = "tokens";
pub const ACCURACY_COLUMN: &str = "acc";

/// Schema of the score table for the given field order.
pub fn report_schema(fields: &[Field]) -> Schema {
    let mut columns: Vec<ArrowField> = fields
        .iter()
        .map(|f| ArrowField::new(f.name(), DataType::Float64, false))
        .collect();
    columns.push(ArrowField::new(FILE_COLUMN, DataType::Utf8, false));
    columns.push(ArrowField::new(PREDICTION_COLUMN, DataType::Utf8, false));
    columns.push(ArrowField::new(TOKENS_COLUMN, DataType::UInt64, false));
    columns.push(ArrowField::new(ACCURACY_COLUMN, DataType::Float64, true));
    Schema::new(columns)
}

/// Convert a run table into a single record batch.
///
/// `acc` is null for rows of a table that has not been finalized.
pub fn to_record_batch(table: &RunTable) -> Result<RecordBatch, StoreError> {
    let rows = table.rows();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(table.fields().len() + 4);

    for i in 0..table.fields().len() {
        let scores: Float64Array = rows.iter().map(|r| Some(r.scores[i])).collect();
        columns.push(Arc::new(scores));
    }
    columns.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|r| r.file.as_str()),
    )));
    columns.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|r| r.prediction.as_str()),
    )));
    columns.push(Arc::new(UInt64Array::from_iter_values(
        rows.iter().map(|r| r.tokens as u64),
    )));
    columns.push(Arc::new(rows.iter().map(|r| r.accuracy).collect::<Float64Array>()));

    let schema = Arc::new(report_schema(table.fields()));
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write the score table to `path` in the requested format.
pub fn write_report(table: &RunTable, path: &Path, format: ReportFormat) -> Result<(), StoreError> {
    let batch = to_record_batch(table)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    match format {
        ReportFormat::Csv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(true)
                .build(file);
            writer.write(&batch)?;
        }
        ReportFormat::Parquet => {
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
        }
    }

    info!(path = %path.display(), rows = batch.num_rows(), "wrote score table");
    Ok(())
}

/// Read all record batches from a Parquet file.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use docscore_core::Row;
    use tempfile::TempDir;

    fn sample_table() -> RunTable {
        let mut table = RunTable::new(vec![Field::Subject, Field::Currency]);
        table.push(Row {
            scores: vec![1.0, 0.0],
            file: "letter_1".into(),
            prediction: r#"{"subject":"Rechnung","currency":"USD"}"#.into(),
            tokens: 120,
            accuracy: None,
            failed: false,
        });
        table.push(Row {
            scores: vec![0.0, 0.0],
            file: "letter_2".into(),
            prediction: "timed out\nNotAvail".into(),
            tokens: 80,
            accuracy: None,
            failed: true,
        });
        table
    }

    #[test]
    fn schema_column_order() {
        let schema = report_schema(&[Field::Persons, Field::Sender]);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["persons", "sender", "file", "prediction", "tokens", "acc"]
        );
    }

    #[test]
    fn unfinalized_accuracy_is_null() {
        let batch = to_record_batch(&sample_table()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        let acc = batch.column_by_name("acc").unwrap();
        assert_eq!(acc.null_count(), 2);
    }

    #[test]
    fn finalized_accuracy_is_row_mean() {
        let mut table = sample_table();
        table.finalize();
        let batch = to_record_batch(&table).unwrap();
        let acc = batch
            .column_by_name("acc")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(acc.value(0), 0.5);
        assert_eq!(acc.value(1), 0.0);
    }

    #[test]
    fn writes_csv_with_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gpt-4/0shot/scores.csv");
        let mut table = sample_table();
        table.finalize();

        write_report(&table, &path, ReportFormat::Csv).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "subject,currency,file,prediction,tokens,acc");
        assert!(text.contains("letter_2"));
    }

    #[test]
    fn writes_parquet_readable_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scores.parquet");
        let mut table = sample_table();
        table.finalize();

        write_report(&table, &path, ReportFormat::Parquet).unwrap();

        let batches = read_parquet(&path).unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
        let files = batches[0]
            .column_by_name("file")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(files.value(1), "letter_2");
    }
}
