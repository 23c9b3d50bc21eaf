//! Configuration file
//!
//! ```json
//! {
//!   "log_level": "info",
//!   "dictionaries": [
//!     { "name": "geo", "path": "/data/geo.tsv", "base_interval_secs": 300, "tolerance": 0.01 }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::container::Tolerance;
use crate::observability::Severity;
use crate::streamer::{
    Cadence, JsonLinesParser, LocalFileSource, SchedInfo, Source, StreamerConfig, TsvParser,
    UpdateMode,
};

use super::errors::{CliError, CliResult};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Minimum log severity (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub dictionaries: Vec<DictConfig>,
}

/// Line format of a dictionary file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Tsv,
    Jsonl,
}

/// Container variant backing a dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// One value per key
    #[default]
    Kmap,
    /// All values per key, base loads only
    Klist,
}

/// One dictionary
#[derive(Debug, Clone, Deserialize)]
pub struct DictConfig {
    pub name: String,

    pub path: PathBuf,

    #[serde(default)]
    pub format: Format,

    /// Field delimiter for `tsv` (default tab)
    #[serde(default)]
    pub delimiter: Option<char>,

    #[serde(default)]
    pub container: ContainerKind,

    #[serde(default)]
    pub update_mode: UpdateMode,

    /// Fixed base reload interval, 0 = never
    #[serde(default)]
    pub base_interval_secs: u64,

    /// Cron expression for base reloads (exclusive with `base_interval_secs`)
    #[serde(default)]
    pub base_cron: Option<String>,

    /// Incremental feed file
    #[serde(default)]
    pub inc_path: Option<PathBuf>,

    #[serde(default)]
    pub inc_interval_secs: u64,

    /// Bootstrap synchronously before serving (default true)
    #[serde(default = "default_sync")]
    pub sync: bool,

    /// Tolerated fraction of bad records (default 0.0)
    #[serde(default)]
    pub tolerance: f64,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_sync() -> bool {
    true
}
fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration JSON
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        self.severity()?;

        if self.dictionaries.is_empty() {
            return Err(CliError::config_error("no dictionaries configured"));
        }

        let mut seen = HashSet::new();
        for dict in &self.dictionaries {
            if !seen.insert(dict.name.as_str()) {
                return Err(CliError::config_error(format!(
                    "duplicate dictionary name '{}'",
                    dict.name
                )));
            }
            dict.validate()?;
        }

        Ok(())
    }

    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(|_| CliError::config_error(format!("Invalid log_level: '{}'", self.log_level)))
    }

    pub fn dictionary(&self, name: &str) -> CliResult<&DictConfig> {
        self.dictionaries
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CliError::config_error(format!("unknown dictionary '{}'", name)))
    }
}

impl DictConfig {
    fn validate(&self) -> CliResult<()> {
        self.tolerance()?;
        self.streamer_config()?;

        if self.container == ContainerKind::Klist && self.inc_path.is_some() {
            return Err(CliError::config_error(format!(
                "dictionary '{}': klist containers do not support incremental loads",
                self.name
            )));
        }
        if self.inc_interval_secs > 0 && self.inc_path.is_none() {
            return Err(CliError::config_error(format!(
                "dictionary '{}': inc_interval_secs needs inc_path",
                self.name
            )));
        }

        Ok(())
    }

    pub fn tolerance(&self) -> CliResult<Tolerance> {
        Tolerance::new(self.tolerance).ok_or_else(|| {
            CliError::config_error(format!(
                "dictionary '{}': tolerance must be within [0, 1], got {}",
                self.name, self.tolerance
            ))
        })
    }

    fn base_cadence(&self) -> CliResult<Cadence> {
        match (&self.base_cron, self.base_interval_secs) {
            (Some(_), secs) if secs > 0 => Err(CliError::config_error(format!(
                "dictionary '{}': base_cron and base_interval_secs are exclusive",
                self.name
            ))),
            (Some(expr), _) => Ok(Cadence::cron(expr.as_str())?),
            (None, secs) => Ok(Cadence::every_secs(secs)),
        }
    }

    pub fn streamer_config(&self) -> CliResult<StreamerConfig> {
        let sched = SchedInfo::base_only(self.base_cadence()?)
            .with_inc(Cadence::every_secs(self.inc_interval_secs))
            .with_sync_bootstrap(self.sync);

        let config = StreamerConfig::new(self.name.as_str(), Cadence::Disabled)
            .with_sched(sched)
            .with_retries(self.retries, Duration::from_millis(self.retry_backoff_ms));
        config.validate()?;
        Ok(config)
    }

    /// File source for this dictionary. Keys are strings, values JSON.
    pub fn source(&self) -> CliResult<Arc<dyn Source<String, Value>>> {
        let mut source: LocalFileSource<String, Value> = match self.format {
            Format::Tsv => {
                let parser = self.delimiter.map_or_else(TsvParser::new, TsvParser::with_delimiter);
                LocalFileSource::new(&self.path, parser)?
            }
            Format::Jsonl => LocalFileSource::new(&self.path, JsonLinesParser::new())?,
        };

        source = source.with_update_mode(self.update_mode);
        if let Some(inc) = &self.inc_path {
            source = source.with_inc_path(inc);
        }

        let source: Arc<dyn Source<String, Value>> = Arc::new(source);
        Ok(source)
    }
}
