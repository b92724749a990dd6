//! Tracing setup and structured run logging.

use hushcut_media::RunStats;
use hushcut_models::{PipelineStage, ProgressEvent};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: LevelFilter) -> String {
    format!("warn,hushcut={}", level)
}

/// Install the global subscriber. JSON lines when `json`, coloured text otherwise.
/// Logs go to stderr so stdout stays free for the run summary.
pub fn init_tracing(level: LevelFilter, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Run logger for structured logging with consistent fields.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    input: String,
}

impl RunLogger {
    pub fn new(input: &std::path::Path) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            input: input.display().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, input = %self.input, "Run started: {}", message);
    }

    /// Log a pipeline progress event. Per-chunk events go to debug.
    pub fn log_progress(&self, event: &ProgressEvent) {
        match (event.stage, event.chunk_index) {
            (PipelineStage::Failed, chunk) => warn!(
                run_id = %self.run_id,
                stage = %event.stage,
                chunk = ?chunk,
                "{}", event.message
            ),
            (stage, Some(chunk)) => debug!(
                run_id = %self.run_id,
                stage = %stage,
                chunk,
                total = event.total_chunks,
                "{}", event.message
            ),
            (stage, None) => info!(
                run_id = %self.run_id,
                stage = %stage,
                total = event.total_chunks,
                "{}", event.message
            ),
        }
    }

    pub fn log_completion(&self, stats: &RunStats) {
        info!(
            run_id = %self.run_id,
            chunks = stats.total_chunks,
            removed = format!("{:.2}s", stats.removed_duration),
            elapsed = format!("{:.2}s", stats.elapsed.as_secs_f64()),
            "Run completed"
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, input = %self.input, "Run failed: {}", message);
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}
