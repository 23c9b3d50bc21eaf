//! # Records and the Record Iterator contract
//!
//! Every data source feeds containers through [`RecordIterator`]: a
//! pull-based cursor that yields one record at a time. Decode failures travel
//! as `Err(RecordError)` in place of a record; a cursor that cannot continue
//! reports `Err(SourceError)` from `has_next`.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{RecordError, SourceError};

/// How a record applies to a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Insert or overwrite
    #[default]
    Add,
    /// Insert or overwrite (same as `Add`)
    Update,
    /// Remove the key
    #[serde(alias = "del")]
    Delete,
}

impl Mode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Add => "add",
            Mode::Update => "update",
            Mode::Delete => "delete",
        }
    }

    /// Add and Update are both upserts
    pub fn is_upsert(&self) -> bool {
        matches!(self, Mode::Add | Mode::Update)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Mode::Add),
            "update" => Ok(Mode::Update),
            "delete" | "del" => Ok(Mode::Delete),
            other => Err(RecordError::new(format!("unknown mode '{}'", other))),
        }
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<K, V> {
    #[serde(default)]
    pub mode: Mode,
    pub key: K,
    pub value: V,
}

impl<K, V> Record<K, V> {
    /// Create a new record
    pub fn new(mode: Mode, key: K, value: V) -> Self {
        Self { mode, key, value }
    }

    /// Shorthand for an `Add` record
    pub fn add(key: K, value: V) -> Self {
        Self::new(Mode::Add, key, value)
    }

    /// Shorthand for an `Update` record
    pub fn update(key: K, value: V) -> Self {
        Self::new(Mode::Update, key, value)
    }

    /// Shorthand for a `Delete` record
    pub fn delete(key: K, value: V) -> Self {
        Self::new(Mode::Delete, key, value)
    }
}

/// Pull-based record cursor implemented by every data source.
pub trait RecordIterator<K, V> {
    /// Whether another record is available.
    ///
    /// `Ok(false)` ends the stream cleanly. `Err` means the source cannot be
    /// queried further and the current load pass must abort.
    fn has_next(&mut self) -> Result<bool, SourceError>;

    /// The next record. Only called after `has_next` returned `true`.
    fn next_record(&mut self) -> Result<Record<K, V>, RecordError>;
}

/// In-memory record iterator.
///
/// Used by parsers that emit several records per raw input and by callers
/// that already hold their records.
#[derive(Debug, Clone)]
pub struct RecordBatch<K, V> {
    items: VecDeque<Result<Record<K, V>, RecordError>>,
    fail_after: Option<(usize, SourceError)>,
    yielded: usize,
}

impl<K, V> RecordBatch<K, V> {
    /// Create a batch from record results
    pub fn new(items: Vec<Result<Record<K, V>, RecordError>>) -> Self {
        Self {
            items: items.into(),
            fail_after: None,
            yielded: 0,
        }
    }

    /// Create a batch of well-formed records
    pub fn from_records(records: Vec<Record<K, V>>) -> Self {
        Self::new(records.into_iter().map(Ok).collect())
    }

    /// Report `err` from `has_next` once `count` items have been yielded.
    pub fn fail_after(mut self, count: usize, err: SourceError) -> Self {
        self.fail_after = Some((count, err));
        self
    }

    /// Items not yet yielded
    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    /// Append another record result
    pub fn push(&mut self, item: Result<Record<K, V>, RecordError>) {
        self.items.push_back(item);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, V> Default for RecordBatch<K, V> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<K, V> RecordIterator<K, V> for RecordBatch<K, V> {
    fn has_next(&mut self) -> Result<bool, SourceError> {
        if let Some((count, err)) = &self.fail_after {
            if self.yielded >= *count {
                return Err(err.clone());
            }
        }
        Ok(!self.items.is_empty())
    }

    fn next_record(&mut self) -> Result<Record<K, V>, RecordError> {
        self.yielded += 1;
        self.items
            .pop_front()
            .unwrap_or_else(|| Err(RecordError::new("read past end of batch")))
    }
}
