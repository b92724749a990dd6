//! Command-line front end for chunked silence removal.
//!
//! This crate provides:
//! - Argument parsing and environment-driven defaults
//! - Tracing setup and run-scoped logging
//! - Ctrl-C cancellation wired into the pipeline

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

pub use app::{build_tool, execute, format_summary, run};
pub use cli::Args;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, RunLogger};
