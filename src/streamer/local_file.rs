//! # Local file source
//!
//! Reads a text file line by line through a [`LineParser`].
//!
//! Change detection uses the file's modification time. A file counts as
//! loaded only once its cursor reached end of file, so a read interrupted by
//! an I/O error is picked up again on the next cycle.
//!
//! Reading the base file to its end clears the incremental file's mark, so
//! the next incremental cycle replays the incremental file onto the new
//! generation.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::Deserialize;
use serde_json::Value;

use super::errors::{StreamerError, StreamerResult};
use super::parser::LineParser;
use super::source::{BoxedRecordIterator, Source};
use crate::container::{Record, RecordError, RecordIterator, SourceError};

/// When a file is (re)loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Load once, ignore later changes
    Static,
    /// Reload whenever the modification time advances
    #[default]
    Dynamic,
}

#[derive(Debug, Default)]
struct FileMark {
    loaded: bool,
    modified: Option<SystemTime>,
}

/// File-backed [`Source`]
pub struct LocalFileSource<K, V> {
    path: PathBuf,
    inc_path: Option<PathBuf>,
    mode: UpdateMode,
    parser: Arc<dyn LineParser<K, V>>,
    base_mark: Arc<Mutex<FileMark>>,
    inc_mark: Arc<Mutex<FileMark>>,
}

impl<K, V> LocalFileSource<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Create a source over `path`. The file must exist.
    pub fn new(path: impl AsRef<Path>, parser: impl LineParser<K, V> + 'static) -> StreamerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = fs::metadata(&path).map_err(|e| {
            StreamerError::config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(StreamerError::config(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }

        Ok(Self {
            path,
            inc_path: None,
            mode: UpdateMode::default(),
            parser: Arc::new(parser),
            base_mark: Arc::new(Mutex::new(FileMark::default())),
            inc_mark: Arc::new(Mutex::new(FileMark::default())),
        })
    }

    /// Set how base file changes are picked up.
    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Incremental feed file. It may appear later; a missing file means
    /// there is nothing to merge.
    pub fn with_inc_path(mut self, path: impl AsRef<Path>) -> Self {
        self.inc_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// The base file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How base file changes are picked up
    pub fn update_mode(&self) -> UpdateMode {
        self.mode
    }

    fn open(
        &self,
        path: &Path,
        mark: &Arc<Mutex<FileMark>>,
        mode: UpdateMode,
        resets: Option<&Arc<Mutex<FileMark>>>,
    ) -> Result<Option<BoxedRecordIterator<K, V>>, SourceError> {
        let modified = {
            let current = mark.lock().unwrap_or_else(PoisonError::into_inner);
            if current.loaded && mode == UpdateMode::Static {
                return Ok(None);
            }
            let modified = fs::metadata(path)?.modified()?;
            if current.loaded && current.modified.map_or(false, |seen| modified <= seen) {
                return Ok(None);
            }
            modified
        };

        let file = File::open(path)?;
        Ok(Some(Box::new(LineIterator {
            reader: BufReader::new(file),
            parser: Arc::clone(&self.parser),
            line: Vec::new(),
            line_no: 0,
            pending: VecDeque::new(),
            mark: Arc::clone(mark),
            resets: resets.map(Arc::clone),
            modified,
        })))
    }
}

impl<K, V> Source<K, V> for LocalFileSource<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    fn kind(&self) -> &'static str {
        "local_file"
    }

    fn open_base(&self, _params: Option<&Value>) -> Result<Option<BoxedRecordIterator<K, V>>, SourceError> {
        let resets = self.inc_path.as_ref().map(|_| &self.inc_mark);
        self.open(&self.path, &self.base_mark, self.mode, resets)
    }

    fn open_inc(&self, _params: Option<&Value>) -> Result<Option<BoxedRecordIterator<K, V>>, SourceError> {
        match &self.inc_path {
            Some(path) if path.exists() => self.open(path, &self.inc_mark, UpdateMode::Dynamic, None),
            _ => Ok(None),
        }
    }
}

struct LineIterator<K, V> {
    reader: BufReader<File>,
    parser: Arc<dyn LineParser<K, V>>,
    line: Vec<u8>,
    line_no: u64,
    pending: VecDeque<Record<K, V>>,
    mark: Arc<Mutex<FileMark>>,
    resets: Option<Arc<Mutex<FileMark>>>,
    modified: SystemTime,
}

impl<K, V> LineIterator<K, V> {
    fn commit(&self) {
        let mut mark = self.mark.lock().unwrap_or_else(PoisonError::into_inner);
        mark.loaded = true;
        mark.modified = Some(self.modified);

        if let Some(dependent) = &self.resets {
            *dependent.lock().unwrap_or_else(PoisonError::into_inner) = FileMark::default();
        }
    }
}

impl<K, V> RecordIterator<K, V> for LineIterator<K, V> {
    fn has_next(&mut self) -> Result<bool, SourceError> {
        if !self.pending.is_empty() {
            return Ok(true);
        }

        loop {
            self.line.clear();
            let read = self.reader.read_until(b'\n', &mut self.line)?;
            if read == 0 {
                self.commit();
                return Ok(false);
            }
            self.line_no += 1;

            let trimmed = self.line.trim_ascii();
            if trimmed.is_empty() || trimmed.starts_with(b"#") {
                continue;
            }
            return Ok(true);
        }
    }

    fn next_record(&mut self) -> Result<Record<K, V>, RecordError> {
        if let Some(record) = self.pending.pop_front() {
            return Ok(record);
        }

        let line = std::str::from_utf8(&self.line)
            .map_err(|_| RecordError::new(format!("line {}: invalid utf-8", self.line_no)))?
            .trim_end_matches(['\r', '\n']);

        let mut records: VecDeque<_> = self
            .parser
            .parse(line)
            .map_err(|e| RecordError::new(format!("line {}: {}", self.line_no, e.message())))?
            .into();

        let first = records
            .pop_front()
            .ok_or_else(|| RecordError::new(format!("line {}: no records", self.line_no)))?;
        self.pending = records;
        Ok(first)
    }
}
