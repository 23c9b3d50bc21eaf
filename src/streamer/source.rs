//! # Source adapter seam
//!
//! A `Source` is a record-iterator factory: each cycle asks it for a fresh
//! cursor. Concrete adapters (files, database cursors, network feeds) live
//! behind this trait; the orchestrator never sees their types.

use serde_json::Value;

use crate::container::{RecordIterator, SourceError};

/// A record iterator that can cross into the blocking load task
pub type BoxedRecordIterator<K, V> = Box<dyn RecordIterator<K, V> + Send>;

/// Factory of record iterators for base and incremental cycles.
pub trait Source<K, V>: Send + Sync {
    /// Short adapter label for logs ("local_file", "mongo", ...)
    fn kind(&self) -> &'static str;

    /// Cursor over the full data set.
    ///
    /// `Ok(None)` means there is nothing new to load this cycle.
    fn open_base(&self, params: Option<&Value>) -> Result<Option<BoxedRecordIterator<K, V>>, SourceError>;

    /// Cursor over changes since the last cycle. Sources without an
    /// incremental feed keep the default.
    fn open_inc(&self, _params: Option<&Value>) -> Result<Option<BoxedRecordIterator<K, V>>, SourceError> {
        Ok(None)
    }
}
