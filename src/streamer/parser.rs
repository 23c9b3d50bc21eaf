//! Line parsers for file-backed sources
//!
//! A parser turns one text line into one or more records. Returning an empty
//! vector is treated as a decode failure by the caller.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::container::{Mode, Record, RecordError};

/// Decodes one line of input.
pub trait LineParser<K, V>: Send + Sync {
    fn parse(&self, line: &str) -> Result<Vec<Record<K, V>>, RecordError>;
}

/// Delimited text: `key<TAB>value` or `mode<TAB>key<TAB>value`.
#[derive(Debug, Clone)]
pub struct TsvParser {
    delimiter: char,
}

impl TsvParser {
    pub fn new() -> Self {
        Self { delimiter: '\t' }
    }

    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl Default for TsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LineParser<String, V> for TsvParser
where
    V: From<String>,
{
    fn parse(&self, line: &str) -> Result<Vec<Record<String, V>>, RecordError> {
        let fields: Vec<&str> = line.split(self.delimiter).collect();
        let (mode, key, value) = match fields.as_slice() {
            [key, value] => (Mode::Add, *key, *value),
            [mode, key, value] => (mode.parse()?, *key, *value),
            _ => {
                return Err(RecordError::new(format!(
                    "expected 2 or 3 fields, got {}",
                    fields.len()
                )))
            }
        };

        if key.is_empty() {
            return Err(RecordError::new("empty key"));
        }

        Ok(vec![Record::new(mode, key.to_string(), V::from(value.to_string()))])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<K, V> {
    One(Record<K, V>),
    Many(Vec<Record<K, V>>),
}

/// One JSON record per line (`{"mode":"add","key":..,"value":..}`), or a
/// JSON array of records. `mode` defaults to `add`.
pub struct JsonLinesParser<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> JsonLinesParser<K, V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for JsonLinesParser<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for JsonLinesParser<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonLinesParser")
    }
}

impl<K, V> LineParser<K, V> for JsonLinesParser<K, V>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    fn parse(&self, line: &str) -> Result<Vec<Record<K, V>>, RecordError> {
        let parsed: OneOrMany<K, V> = serde_json::from_str(line)
            .map_err(|e| RecordError::new(format!("invalid json record: {}", e)))?;
        Ok(match parsed {
            OneOrMany::One(record) => vec![record],
            OneOrMany::Many(records) => records,
        })
    }
}
