//! Run table: one row per document for a single (model, prompt) pass.

use serde::Serialize;

use crate::record::Field;

/// Scores and metadata for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// One score per scorable field, in table field order.
    pub scores: Vec<f64>,
    /// Document id.
    pub file: String,
    /// Rendered prediction, or `<message>\n<raw>` for failures.
    pub prediction: String,
    /// Estimated tokens of request plus response.
    pub tokens: usize,
    /// Mean of `scores`; unset until the table is finalized.
    pub accuracy: Option<f64>,
    pub failed: bool,
}

/// Aggregates reported at the end of a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Per-field mean in table field order.
    pub field_means: Vec<(Field, f64)>,
    /// Mean of the per-field means.
    pub macro_accuracy: f64,
    pub documents: usize,
    pub failures: usize,
}

/// Ordered rows for one (model, prompt) pass.
#[derive(Debug, Clone)]
pub struct RunTable {
    fields: Vec<Field>,
    rows: Vec<Row>,
}

impl RunTable {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. The score vector must have one entry per field.
    pub fn push(&mut self, row: Row) {
        debug_assert_eq!(row.scores.len(), self.fields.len());
        self.rows.push(row);
    }

    /// Mean of each field column (0 for an empty table).
    pub fn field_means(&self) -> Vec<f64> {
        (0..self.fields.len())
            .map(|i| mean(self.rows.iter().map(|r| r.scores[i])))
            .collect()
    }

    /// Mean of the per-field means.
    pub fn macro_accuracy(&self) -> f64 {
        mean(self.field_means())
    }

    /// Fill each row's overall accuracy and return the pass aggregates.
    pub fn finalize(&mut self) -> Summary {
        for row in &mut self.rows {
            row.accuracy = Some(mean(row.scores.iter().copied()));
        }

        let means = self.field_means();
        Summary {
            macro_accuracy: mean(means.iter().copied()),
            field_means: self.fields.iter().copied().zip(means).collect(),
            documents: self.rows.len(),
            failures: self.rows.iter().filter(|r| r.failed).count(),
        }
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(file: &str, scores: &[f64]) -> Row {
        Row {
            scores: scores.to_vec(),
            file: file.into(),
            prediction: "{}".into(),
            tokens: 10,
            accuracy: None,
            failed: false,
        }
    }

    #[test]
    fn field_means_per_column() {
        let mut table = RunTable::new(vec![Field::Subject, Field::Currency]);
        table.push(row("a", &[1.0, 0.0]));
        table.push(row("b", &[0.5, 1.0]));

        assert_eq!(table.field_means(), vec![0.75, 0.5]);
        assert!((table.macro_accuracy() - 0.625).abs() < 1e-12);
    }

    #[test]
    fn finalize_fills_row_accuracy() {
        let mut table = RunTable::new(vec![Field::Subject, Field::Currency]);
        table.push(row("a", &[1.0, 0.0]));
        table.push(row("b", &[0.5, 1.0]));

        let summary = table.finalize();
        assert_eq!(table.rows()[0].accuracy, Some(0.5));
        assert_eq!(table.rows()[1].accuracy, Some(0.75));

        // Macro accuracy equals the mean of row accuracies when every row has
        // the same field count.
        let row_mean = (0.5 + 0.75) / 2.0;
        assert!((summary.macro_accuracy - row_mean).abs() < 1e-12);
        assert_eq!(
            summary.field_means,
            vec![(Field::Subject, 0.75), (Field::Currency, 0.5)]
        );
        assert_eq!(summary.documents, 2);
    }

    #[test]
    fn failed_rows_count_and_drag_means() {
        let mut table = RunTable::new(vec![Field::Subject]);
        table.push(row("a", &[1.0]));
        table.push(Row {
            failed: true,
            ..row("b", &[0.0])
        });

        let summary = table.finalize();
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.macro_accuracy, 0.5);
    }

    #[test]
    fn empty_table_aggregates_to_zero() {
        let mut table = RunTable::new(vec![Field::Subject, Field::Sender]);
        let summary = table.finalize();
        assert!(table.is_empty());
        assert_eq!(summary.macro_accuracy, 0.0);
        assert_eq!(summary.field_means, vec![(Field::Subject, 0.0), (Field::Sender, 0.0)]);
    }
}
