//! CLI command implementations
//!
//! Every command loads the config, builds one streamer per dictionary and
//! answers with a single JSON object on stdout (`watch` answers periodically).
//! Keys are strings; values are JSON.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::{KListContainer, KMapContainer};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::registry::{Registry, RegistryError};
use crate::streamer::{Info, LoadOutcome, LoadReport, LoadStreamer, Streamer};

use super::args::Command;
use super::config::{Config, ContainerKind, DictConfig};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

type MapStreamer = LoadStreamer<String, Value, Value>;
type ListStreamer = LoadStreamer<String, Value, Vec<Value>>;

/// A configured dictionary of either container variant
enum Dictionary {
    Map(Arc<MapStreamer>),
    List(Arc<ListStreamer>),
}

impl Dictionary {
    fn build(dict: &DictConfig) -> CliResult<Self> {
        let config = dict.streamer_config()?;
        let source = dict.source()?;
        let tolerance = dict.tolerance()?;

        Ok(match dict.container {
            ContainerKind::Kmap => Dictionary::Map(Arc::new(
                LoadStreamer::new(config, source)?
                    .with_container(Arc::new(KMapContainer::new(tolerance))),
            )),
            ContainerKind::Klist => Dictionary::List(Arc::new(
                LoadStreamer::new(config, source)?
                    .with_container(Arc::new(KListContainer::new(tolerance))),
            )),
        })
    }

    fn run_base_cycle(&self) -> LoadReport {
        match self {
            Dictionary::Map(s) => s.run_base_cycle(),
            Dictionary::List(s) => s.run_base_cycle(),
        }
    }

    fn info(&self) -> Info {
        match self {
            Dictionary::Map(s) => s.info(),
            Dictionary::List(s) => s.info(),
        }
    }

    fn start(&self, token: CancellationToken) -> CliResult<JoinHandle<()>> {
        let handle = match self {
            Dictionary::Map(s) => Arc::clone(s).update_data(token)?,
            Dictionary::List(s) => Arc::clone(s).update_data(token)?,
        };
        Ok(handle)
    }
}

/// Every configured dictionary, registered by name
struct Dictionaries {
    maps: Registry<String, Value, Value>,
    lists: Registry<String, Value, Vec<Value>>,
    all: Vec<Dictionary>,
}

impl Dictionaries {
    /// Build the dictionaries of `config`, or only `only` if given.
    fn build(config: &Config, only: Option<&str>) -> CliResult<Self> {
        let mut dicts = Dictionaries {
            maps: Registry::new(),
            lists: Registry::new(),
            all: Vec::new(),
        };

        let selected: Vec<&DictConfig> = match only {
            Some(name) => vec![config.dictionary(name)?],
            None => config.dictionaries.iter().collect(),
        };

        for dict in selected {
            let built = Dictionary::build(dict)?;
            match &built {
                Dictionary::Map(s) => dicts.maps.register(dict.name.as_str(), s.clone())?,
                Dictionary::List(s) => dicts.lists.register(dict.name.as_str(), s.clone())?,
            }
            dicts.all.push(built);
        }

        Ok(dicts)
    }

    fn lookup(&self, name: &str, key: &str) -> CliResult<Value> {
        let key = key.to_string();
        match self.maps.get(name, &key) {
            Err(RegistryError::StreamerNotFound(_)) => {
                Ok(Value::Array(self.lists.get(name, &key)?))
            }
            other => Ok(other?),
        }
    }

    fn infos(&self) -> Vec<Info> {
        let mut infos = self.maps.infos();
        infos.extend(self.lists.infos());
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command. Failures are
/// reported as a JSON error object before being returned.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let result = run_command(cli.command);
    if let Err(e) = &result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { config } => check(&config),
        Command::Get { config, name, key } => get(&config, &name, &key),
        Command::Watch {
            config,
            report_secs,
        } => watch(&config, report_secs),
    }
}

fn load_config(path: &Path) -> CliResult<Config> {
    let config = Config::load(path)?;
    Logger::set_min_severity(config.severity()?);

    let count = config.dictionaries.len().to_string();
    let path = path.display().to_string();
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", path.as_str()), ("dictionaries", count.as_str())],
    );
    Ok(config)
}

fn report_json(report: &LoadReport, info: &Info) -> Value {
    let outcome = match &report.outcome {
        LoadOutcome::Applied(_) => "applied",
        LoadOutcome::Unchanged => "unchanged",
        LoadOutcome::Vetoed => "vetoed",
        LoadOutcome::Failed(_) => "failed",
    };

    let mut value = json!({
        "outcome": outcome,
        "attempts": report.attempts,
        "info": info,
    });
    if let Some(err) = report.outcome.error() {
        value["error"] = json!({ "code": err.code(), "message": err.to_string() });
    }
    value
}

/// Base-load every dictionary once and print the results.
///
/// Fails if any dictionary failed to load.
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let dicts = Dictionaries::build(&config, None)?;

    let mut failed = 0;
    let mut results = Vec::with_capacity(dicts.all.len());
    for dict in &dicts.all {
        let report = dict.run_base_cycle();
        if report.outcome.is_failed() {
            failed += 1;
        }
        results.push(report_json(&report, &dict.info()));
    }

    write_response(json!({ "dictionaries": results }))?;

    if failed > 0 {
        return Err(CliError::load_failed(format!(
            "{} of {} dictionaries failed to load",
            failed,
            results.len()
        )));
    }
    Ok(())
}

/// Load one dictionary and print the value stored under `key`.
pub fn get(config_path: &Path, name: &str, key: &str) -> CliResult<()> {
    let config = load_config(config_path)?;
    let dicts = Dictionaries::build(&config, Some(name))?;

    for dict in &dicts.all {
        if let LoadOutcome::Failed(err) = dict.run_base_cycle().outcome {
            return Err(err.into());
        }
    }

    let value = dicts.lookup(name, key)?;
    write_response(json!({ "name": name, "key": key, "value": value }))
}

/// Keep every dictionary fresh until Ctrl-C, reporting health periodically.
pub fn watch(config_path: &Path, report_secs: u64) -> CliResult<()> {
    let config = load_config(config_path)?;
    let dicts = Dictionaries::build(&config, None)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_error(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let token = CancellationToken::new();
        let mut handles = Vec::with_capacity(dicts.all.len());
        for dict in &dicts.all {
            match dict.start(token.child_token()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    token.cancel();
                    return Err(e);
                }
            }
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(report_secs.max(1)));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                res = &mut ctrl_c => {
                    res?;
                    break;
                }
                _ = ticker.tick() => {
                    write_response(json!({ "dictionaries": dicts.infos() }))?;
                }
            }
        }

        token.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                return Err(CliError::runtime_error(format!("refresh task failed: {}", e)));
            }
        }

        write_response(json!({ "dictionaries": dicts.infos() }))
    })
}
