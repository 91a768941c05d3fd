use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A single cell value in a row
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// A date-like string; `raw` keeps the text exactly as the source sent it
    DateTime { at: NaiveDateTime, raw: String },
    Null,
}

impl DataValue {
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => DataValue::Null,
            JsonValue::Bool(b) => DataValue::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Integer(i),
                None => n.as_f64().map(DataValue::Float).unwrap_or(DataValue::Null),
            },
            JsonValue::String(s) => match parse_datetime(s) {
                Some(at) => DataValue::DateTime { at, raw: s.clone() },
                None => DataValue::String(s.clone()),
            },
            // Nested values are not expected, keep them searchable as text
            other => DataValue::String(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::String(s) => write!(f, "{s}"),
            DataValue::Integer(i) => write!(f, "{i}"),
            DataValue::Float(v) => write!(f, "{v}"),
            DataValue::Boolean(b) => write!(f, "{b}"),
            DataValue::DateTime { raw, .. } => write!(f, "{raw}"),
            DataValue::Null => Ok(()),
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// One opaque record returned by the data source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: BTreeMap<String, DataValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: DataValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Convert a JSON object into a row; anything else is not a row
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        let fields = object
            .iter()
            .map(|(k, v)| (k.clone(), DataValue::from_json(v)))
            .collect();
        Some(Self { fields })
    }

    /// Missing fields read as Null
    pub fn get(&self, field: &str) -> &DataValue {
        self.fields.get(field).unwrap_or(&DataValue::Null)
    }

    pub fn values(&self) -> impl Iterator<Item = &DataValue> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, DataValue>> for Row {
    fn from(fields: BTreeMap<String, DataValue>) -> Self {
        Self { fields }
    }
}

/// Convert a response body into rows. Fails with a description when the body
/// is not an array of objects.
pub fn rows_from_json(body: &JsonValue) -> Result<Vec<Row>, String> {
    let items = body
        .as_array()
        .ok_or_else(|| format!("expected a JSON array, got {}", json_kind(body)))?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            Row::from_json(item).ok_or_else(|| {
                format!("element {idx} is {}, expected an object", json_kind(item))
            })
        })
        .collect()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
