//! Entity model for one extracted document record.
//!
//! The schema is fixed: a static field table declares every scorable field,
//! its wire name in golden/prediction JSON, and the comparison kind the
//! scorer dispatches on. Declared order is the canonical order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One scorable field of the extraction schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Subject,
    Sender,
    Persons,
    Companies,
    Dates,
    Action,
    Deadline,
    Priority,
    Country,
    Currency,
    Language,
}

/// How a field is compared against its golden value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text identifying the document; scored by edit similarity.
    Identity,
    /// Unordered collection of names; scored by Jaccard similarity.
    Set,
    /// Date label → date text; scored on keys and shared values.
    DateMap,
    /// Normalised scalar; exact match only.
    Exact,
}

struct FieldDef {
    field: Field,
    name: &'static str,
    kind: FieldKind,
}

const FIELD_TABLE: [FieldDef; Field::COUNT] = [
    FieldDef { field: Field::Subject, name: "subject", kind: FieldKind::Identity },
    FieldDef { field: Field::Sender, name: "sender", kind: FieldKind::Identity },
    FieldDef { field: Field::Persons, name: "persons", kind: FieldKind::Set },
    FieldDef { field: Field::Companies, name: "companies", kind: FieldKind::Set },
    FieldDef { field: Field::Dates, name: "dates", kind: FieldKind::DateMap },
    FieldDef { field: Field::Action, name: "action", kind: FieldKind::Identity },
    FieldDef { field: Field::Deadline, name: "deadline", kind: FieldKind::Exact },
    FieldDef { field: Field::Priority, name: "priority", kind: FieldKind::Exact },
    FieldDef { field: Field::Country, name: "country", kind: FieldKind::Exact },
    FieldDef { field: Field::Currency, name: "currency", kind: FieldKind::Exact },
    FieldDef { field: Field::Language, name: "language", kind: FieldKind::Exact },
];

impl Field {
    pub const COUNT: usize = 11;

    /// Every field in declared schema order.
    pub const ALL: [Field; Field::COUNT] = [
        Field::Subject,
        Field::Sender,
        Field::Persons,
        Field::Companies,
        Field::Dates,
        Field::Action,
        Field::Deadline,
        Field::Priority,
        Field::Country,
        Field::Currency,
        Field::Language,
    ];

    fn def(self) -> &'static FieldDef {
        &FIELD_TABLE[self as usize]
    }

    /// JSON key used in golden files, model responses, and report columns.
    pub fn name(self) -> &'static str {
        self.def().name
    }

    pub fn kind(self) -> FieldKind {
        self.def().kind
    }

    pub fn from_name(name: &str) -> Option<Field> {
        FIELD_TABLE.iter().find(|s| s.name == name).map(|s| s.field)
    }

    /// Value a prediction gets when the model omits the key.
    pub fn default_value(self) -> Value {
        match self.kind() {
            FieldKind::Identity | FieldKind::Exact => Value::String(String::new()),
            FieldKind::Set => Value::Array(Vec::new()),
            FieldKind::DateMap => Value::Object(Map::new()),
        }
    }

    fn expected_type(self) -> &'static str {
        match self.kind() {
            FieldKind::Identity | FieldKind::Exact => "a string",
            FieldKind::Set => "a list of strings",
            FieldKind::DateMap => "an object of strings",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match (self.kind(), value) {
            (FieldKind::Identity | FieldKind::Exact, Value::String(_)) => true,
            (FieldKind::Set, Value::Array(items)) => items.iter().all(Value::is_string),
            (FieldKind::DateMap, Value::Object(map)) => map.values().all(Value::is_string),
            _ => false,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    #[error("missing key `{0}`")]
    MissingKey(Field),
    #[error("key `{field}` must be {expected}")]
    InvalidType { field: Field, expected: &'static str },
}

/// A structured extraction for one document.
///
/// Golden records are validated against the schema on construction.
/// Predicted records keep whatever JSON types the model produced so the
/// scorer can penalise type mismatches instead of rejecting the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: [Value; Field::COUNT],
}

impl Default for Record {
    fn default() -> Self {
        Self {
            values: Field::ALL.map(Field::default_value),
        }
    }
}

impl Record {
    /// Build a golden record. Every schema key is required and must have the
    /// schema's type; unknown keys are ignored.
    pub fn from_golden(value: Value) -> Result<Self, RecordError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(RecordError::NotAnObject(json_type_name(&other))),
        };

        let mut record = Self::default();
        for field in Field::ALL {
            let value = object
                .remove(field.name())
                .ok_or(RecordError::MissingKey(field))?;
            if !field.accepts(&value) {
                return Err(RecordError::InvalidType {
                    field,
                    expected: field.expected_type(),
                });
            }
            record.values[field as usize] = value;
        }
        Ok(record)
    }

    /// Build a predicted record from a parsed model response.
    ///
    /// Keys outside the schema are dropped, missing keys take the field
    /// default, and values are kept verbatim.
    pub fn from_prediction(object: Map<String, Value>) -> Self {
        let mut record = Self::default();
        for (key, value) in object {
            if let Some(field) = Field::from_name(&key) {
                record.values[field as usize] = value;
            }
        }
        record
    }

    /// Return a copy with `field` set to `value`.
    pub fn with(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.values[field as usize] = value.into();
        self
    }

    pub fn get(&self, field: Field) -> &Value {
        &self.values[field as usize]
    }

    /// Fields as a JSON object in schema order.
    pub fn to_json(&self) -> Map<String, Value> {
        Field::ALL
            .iter()
            .map(|f| (f.name().to_string(), self.get(*f).clone()))
            .collect()
    }
}

/// Explicit failure payload produced when a model call cannot yield a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Human-readable reason.
    pub message: String,
    /// Best-effort raw response text, `NotAvail` when nothing came back.
    pub raw: String,
}

/// Outcome of one extraction: a record or a failure placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Success(Record),
    Failure(Failure),
}

impl From<Record> for Extraction {
    fn from(record: Record) -> Self {
        Self::Success(record)
    }
}

impl Extraction {
    pub fn failure(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Failure(Failure {
            message: message.into(),
            raw: raw.into(),
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Success(record) => Some(record),
            Self::Failure(_) => None,
        }
    }

    /// Flat artifact object: every schema field plus `error_message` and
    /// `error_prediction` (empty on success, defaults for the fields on failure).
    pub fn to_artifact(&self) -> Value {
        let (record, message, raw) = match self {
            Self::Success(record) => (record.to_json(), "", ""),
            Self::Failure(failure) => (
                Record::default().to_json(),
                failure.message.as_str(),
                failure.raw.as_str(),
            ),
        };
        let mut object = record;
        object.insert("error_message".into(), Value::String(message.into()));
        object.insert("error_prediction".into(), Value::String(raw.into()));
        Value::Object(object)
    }

    /// Text for the report's prediction column.
    pub fn render(&self) -> String {
        match self {
            Self::Success(record) => Value::Object(record.to_json()).to_string(),
            Self::Failure(failure) => format!("{}\n{}", failure.message, failure.raw),
        }
    }
}

/// Article-prefixed JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
