//! # Streamer
//!
//! Load orchestration around a container:
//! - schedule (`SchedInfo`, `Cadence`)
//! - source seam (`Source`) and the local file adapter
//! - load hooks and cycle reports
//! - health snapshot (`Info`)
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized -> Bootstrapping -> Ready <-> Reloading
//!                                     \-> Cancelled
//! ```
//!
//! A failed cycle never replaces served data. Cancellation is observed
//! between cycles; an in-flight cycle finishes first.

mod config;
mod errors;
mod hooks;
mod info;
mod load_streamer;
pub mod local_file;
mod parser;
mod sched;
mod source;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::Container;

pub use config::StreamerConfig;
pub use errors::{StreamerError, StreamerResult};
pub use hooks::{AfterHook, BeforeHook, BeforeLoad, LoadKind, LoadOutcome, LoadReport, StreamerHooks};
pub use info::{Info, StreamerState};
pub use load_streamer::LoadStreamer;
pub use local_file::{LocalFileSource, UpdateMode};
pub use parser::{JsonLinesParser, LineParser, TsvParser};
pub use sched::{Cadence, SchedInfo};
pub use source::{BoxedRecordIterator, Source};

/// A container shared between a streamer and its readers
pub type SharedContainer<K, V, O> = Arc<dyn Container<K, V, Output = O>>;

/// Binds a container to a data source and keeps it fresh.
pub trait Streamer<K, V, O>: Send + Sync {
    fn name(&self) -> &str;

    /// Bind (or replace) the container this streamer loads into
    fn set_container(&self, container: SharedContainer<K, V, O>);

    fn container(&self) -> Option<SharedContainer<K, V, O>>;

    fn sched_info(&self) -> SchedInfo;

    /// Start loading.
    ///
    /// With a synchronous bootstrap the first base load runs on the calling
    /// thread and its failure is returned. The refresh loop then runs on the
    /// current tokio runtime until `token` is cancelled. On a current-thread
    /// runtime the bootstrap holds the only worker while it runs.
    fn update_data(self: Arc<Self>, token: CancellationToken) -> StreamerResult<JoinHandle<()>>;

    fn info(&self) -> Info;
}
