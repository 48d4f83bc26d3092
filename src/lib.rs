//! Wind farm digital twin: wake-interaction simulation feeding an
//! incremental Bronze, Silver and Gold telemetry pipeline.

pub mod config;
pub mod error;
/// File exports of Gold tables.
pub mod io;
pub mod logging;
/// Layout, wind, wake and power curve models.
pub mod models;
/// Silver and Gold stages and the incremental runner.
pub mod pipeline;
pub mod records;
pub mod report;
/// Scenario runs and the simulation engine.
pub mod sim;
pub mod state;
pub mod store;

pub use error::{ErrorKind, PipelineError, Result};
