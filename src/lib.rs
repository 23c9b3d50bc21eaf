//! hotdict - hot-reloadable in-memory dictionaries
//!
//! - `container`: key/value containers with atomic base reloads
//! - `streamer`: load orchestration (scheduling, retries, hooks, health)
//! - `registry`: name → streamer lookup
//! - `observability`: structured JSON logging
//! - `cli`: the `hotdict` binary

pub mod cli;
pub mod container;
pub mod observability;
pub mod registry;
pub mod streamer;
