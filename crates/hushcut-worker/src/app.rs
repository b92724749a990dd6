//! One silence removal run, from parsed arguments to published files.

use hushcut_media::{
    cancel_pair, progress_channel, remove_silence, CancelToken, FfmpegRunner, FfmpegTool,
    MediaTool, RemovalOutcome, RemovalRequest, RunStats, SilenceRemovalConfig,
};
use hushcut_models::format_hms;
use tracing::{info, Instrument};

use crate::cli::Args;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::RunLogger;

/// Build the FFmpeg-backed tool for `config`.
pub fn build_tool(config: &SilenceRemovalConfig, cancel: CancelToken) -> FfmpegTool {
    let runner = FfmpegRunner::new()
        .with_cancel(cancel)
        .with_timeout(config.tool_timeout_secs);
    FfmpegTool::new(runner)
        .with_encoding(config.encoding.clone())
        .with_max_inline_segments(config.max_inline_segments)
}

/// Run the CLI: Ctrl-C cancels the pipeline.
pub async fn run(args: Args, worker: WorkerConfig) -> WorkerResult<RemovalOutcome> {
    let config = args.apply(&worker.removal);
    let request = args.request();

    let (handle, cancel) = cancel_pair();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            handle.cancel();
        }
    });

    let tool = build_tool(&config, cancel.clone());
    let result = execute(&tool, &request, &config, worker.progress_capacity, &cancel).await;

    signal_task.abort();
    result
}

/// Run the pipeline with `tool`, logging progress as it arrives.
pub async fn execute<T: MediaTool + ?Sized>(
    tool: &T,
    request: &RemovalRequest,
    config: &SilenceRemovalConfig,
    progress_capacity: usize,
    cancel: &CancelToken,
) -> WorkerResult<RemovalOutcome> {
    let logger = RunLogger::new(&request.input);
    let span = logger.create_span();
    logger.log_start(&format!("{} -> {}", request.input.display(), request.output.display()));

    let (progress, mut events) = progress_channel(progress_capacity);
    let progress_logger = logger.clone();
    let consumer = tokio::spawn(
        async move {
            while let Some(event) = events.recv().await {
                progress_logger.log_progress(&event);
            }
        }
        .instrument(span.clone()),
    );

    let result = remove_silence(tool, request, config, &progress, cancel)
        .instrument(span)
        .await;

    // Closing the sender lets the consumer drain and stop
    drop(progress);
    let _ = consumer.await;

    match result {
        Ok(outcome) => {
            logger.log_completion(&outcome.stats);
            Ok(outcome)
        }
        Err(e) => {
            logger.log_error(&e.to_string());
            Err(e.into())
        }
    }
}

/// Human-readable run summary for stdout.
pub fn format_summary(outcome: &RemovalOutcome) -> String {
    let stats: &RunStats = &outcome.stats;
    let ratio = if stats.source_duration > 0.0 {
        stats.removed_duration / stats.source_duration * 100.0
    } else {
        0.0
    };

    let mut lines = vec![
        format!("Output:    {}", outcome.output_path.display()),
        format!(
            "Duration:  {} -> {} ({:.2}s removed, {:.1}%)",
            format_hms(stats.source_duration),
            format_hms(stats.output_duration()),
            stats.removed_duration,
            ratio
        ),
        format!(
            "Chunks:    {} ({} with silence, {} fully silent)",
            stats.total_chunks, stats.chunks_with_silence, stats.placeholder_chunks
        ),
    ];
    if let Some(path) = &outcome.adjusted_timestamps_path {
        lines.push(format!(
            "Events:    {} remapped into {}",
            stats.events_remapped,
            path.display()
        ));
    }
    lines.push(format!("Elapsed:   {:.1}s", stats.elapsed.as_secs_f64()));
    lines.join("\n")
}
