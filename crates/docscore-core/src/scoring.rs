//! Field-aware similarity scoring of a predicted record against a golden one.
//!
//! # Per-field rules
//!
//! - Type mismatch between candidate and reference value: 0
//! - Identity text (subject, sender, action): Jaro-Winkler similarity
//! - Sets (persons, companies): Jaccard similarity, 1 when both are empty,
//!   0 when any candidate element is not a string
//! - Dates: mean of key-set Jaccard and the mean value similarity over shared
//!   keys (0 when no key is shared), 0 when any candidate value is not a string
//! - Everything else: exact equality
//!
//! All scores lie in `[0, 1]`.

use std::collections::HashSet;
use std::hash::Hash;
use std::mem;

use serde_json::Value;
use tracing::debug;

use crate::record::{Extraction, Field, FieldKind, Record};

/// Normalised edit similarity of two strings (Jaro-Winkler).
pub fn text_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b).clamp(0.0, 1.0)
}

/// `|A ∩ B| / |A ∪ B|`, with 1 for two empty sets.
pub fn jaccard<T, A, B>(a: A, b: B) -> f64
where
    T: Eq + Hash,
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
{
    let a: HashSet<T> = a.into_iter().collect();
    let b: HashSet<T> = b.into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Scores candidates against references over a configured, ordered field list.
#[derive(Debug, Clone)]
pub struct Scorer {
    fields: Vec<Field>,
}

impl Scorer {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Scorable fields in report column order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// One score per configured field, in configured order.
    ///
    /// A failure on either side yields an all-zero vector so failed documents
    /// flow through the same aggregation as successful ones.
    pub fn score(&self, candidate: &Extraction, reference: &Extraction) -> Vec<f64> {
        match (candidate, reference) {
            (Extraction::Success(candidate), Extraction::Success(reference)) => self
                .fields
                .iter()
                .map(|&field| score_field(field, candidate, reference))
                .collect(),
            _ => {
                debug!("failure placeholder, scoring all fields as zero");
                vec![0.0; self.fields.len()]
            }
        }
    }
}

/// Score a single field of `candidate` against `reference`.
pub fn score_field(field: Field, candidate: &Record, reference: &Record) -> f64 {
    let candidate = candidate.get(field);
    let reference = reference.get(field);

    if mem::discriminant(candidate) != mem::discriminant(reference) {
        return 0.0;
    }

    match field.kind() {
        FieldKind::Identity => match (candidate.as_str(), reference.as_str()) {
            (Some(c), Some(r)) => text_similarity(c, r),
            _ => exact(candidate, reference),
        },
        FieldKind::Set => score_set(candidate, reference),
        FieldKind::DateMap => score_dates(candidate, reference),
        FieldKind::Exact => exact(candidate, reference),
    }
}

fn exact(candidate: &Value, reference: &Value) -> f64 {
    if candidate == reference { 1.0 } else { 0.0 }
}

fn score_set(candidate: &Value, reference: &Value) -> f64 {
    let (Some(candidate), Some(reference)) = (candidate.as_array(), reference.as_array()) else {
        return exact(candidate, reference);
    };
    let Some(candidate) = all_strings(candidate) else {
        return 0.0;
    };
    // Golden sets are validated as strings; anything else cannot match.
    let reference = reference.iter().filter_map(Value::as_str);
    jaccard(candidate, reference)
}

fn score_dates(candidate: &Value, reference: &Value) -> f64 {
    let (Some(candidate), Some(reference)) = (candidate.as_object(), reference.as_object())
    else {
        return exact(candidate, reference);
    };
    if !candidate.values().all(Value::is_string) {
        return 0.0;
    }

    let key_similarity = jaccard(
        candidate.keys().map(String::as_str),
        reference.keys().map(String::as_str),
    );

    let shared: Vec<f64> = reference
        .iter()
        .filter_map(|(key, r)| {
            let c = candidate.get(key)?.as_str()?;
            Some(text_similarity(c, r.as_str().unwrap_or_default()))
        })
        .collect();
    let value_similarity = if shared.is_empty() {
        0.0
    } else {
        shared.iter().sum::<f64>() / shared.len() as f64
    };

    (key_similarity + value_similarity) / 2.0
}

fn all_strings(items: &[Value]) -> Option<Vec<&str>> {
    items.iter().map(Value::as_str).collect()
}
