//! Record: an opaque mapping of named fields flowing through the pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the birth date (`YYYY-MM-DD`), required by validation.
pub const BIRTHDATE: &str = "birthdate";

/// Field attached by the processor once a record passes validation.
pub const AGE: &str = "age";

/// One unit of synthetic data.
///
/// The pipeline only interprets [`BIRTHDATE`] and [`AGE`]; every other field
/// is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// Ordered records captured by one drain of the store.
pub type Batch = Vec<Record>;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field, or `None` if missing or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Parsed birth date. `None` when the field is missing or malformed.
    pub fn birthdate(&self) -> Option<NaiveDate> {
        let raw = self.get_str(BIRTHDATE)?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    pub fn set_birthdate(&mut self, date: NaiveDate) {
        self.insert(BIRTHDATE, date.format("%Y-%m-%d").to_string());
    }

    pub fn age(&self) -> Option<u32> {
        self.0
            .get(AGE)
            .and_then(Value::as_u64)
            .and_then(|a| u32::try_from(a).ok())
    }

    pub fn set_age(&mut self, age: u32) {
        self.insert(AGE, age);
    }

    /// Short label for log lines: the `name` field, else `<unnamed>`
    pub fn label(&self) -> &str {
        self.get_str("name").unwrap_or("<unnamed>")
    }
}
