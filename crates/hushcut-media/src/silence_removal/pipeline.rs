//! End-to-end silence removal.
//!
//! ```text
//! split ──► [detect ─► edit] × N (bounded) ──► join ──┬──► assemble ──► publish
//!                                                     └──► remap ─────► publish
//! ```
//!
//! Workers return values; nothing is aggregated until every chunk finished.
//! The output file and the adjusted timestamp file are published together or
//! not at all.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::future::join_all;
use hushcut_models::{Chunk, EditedChunk, PipelineStage, SilenceReport, TimestampEvent};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::assembler::assemble;
use super::chunker::split;
use super::config::SilenceRemovalConfig;
use super::detector::SilenceDetector;
use super::editor::{EditKind, SegmentEditor};
use super::remap::{cross_check, read_events, remap_events, write_events, CumulativeSilenceMap};
use super::scratch::ScratchDir;
use crate::cancel::CancelToken;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{discard, move_file};
use crate::metrics;
use crate::progress::ProgressSender;
use crate::tool::MediaTool;

/// What to process and where to put the results.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Event file on the original timeline.
    pub timestamps: Option<PathBuf>,
    /// Where remapped events are written. Required when `timestamps` is set.
    pub adjusted_timestamps: Option<PathBuf>,
}

impl RemovalRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            timestamps: None,
            adjusted_timestamps: None,
        }
    }

    /// Remap events from `timestamps`. Without an explicit destination the
    /// adjusted file goes next to the input as `<stem>_no_silence_timestamps.txt`.
    pub fn with_timestamps(
        mut self,
        timestamps: impl Into<PathBuf>,
        adjusted: Option<PathBuf>,
    ) -> Self {
        let adjusted = adjusted.unwrap_or_else(|| default_timestamps_output_path(&self.input));
        self.adjusted_timestamps = Some(adjusted);
        self.timestamps = Some(timestamps.into());
        self
    }

    /// Reject requests before any tool runs.
    pub fn validate(&self) -> MediaResult<()> {
        if !self.input.is_file() {
            return Err(MediaError::FileNotFound(self.input.clone()));
        }
        if same_file(&self.input, &self.output) {
            return Err(MediaError::validation("output path must differ from the input"));
        }
        match (&self.timestamps, &self.adjusted_timestamps) {
            (Some(timestamps), Some(adjusted)) => {
                if !timestamps.is_file() {
                    return Err(MediaError::FileNotFound(timestamps.clone()));
                }
                if same_file(timestamps, adjusted) || same_file(&self.output, adjusted) {
                    return Err(MediaError::validation(
                        "adjusted timestamps path must differ from the other paths",
                    ));
                }
            }
            (Some(_), None) => {
                return Err(MediaError::validation("adjusted timestamps path is required"));
            }
            (None, _) => {}
        }
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `<dir>/<stem>_no_silence.<ext>`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_no_silence.{}", stem, ext.to_string_lossy()),
        None => format!("{}_no_silence", stem),
    };
    input.with_file_name(name)
}

/// `<dir>/<stem>_no_silence_timestamps.txt`
pub fn default_timestamps_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_no_silence_timestamps.txt", stem))
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total_chunks: usize,
    pub chunks_with_silence: usize,
    pub placeholder_chunks: usize,
    pub silence_intervals: usize,
    /// Summed probed chunk durations.
    pub source_duration: f64,
    pub removed_duration: f64,
    pub events_remapped: usize,
    pub elapsed: Duration,
}

impl RunStats {
    /// Expected output duration, ignoring placeholder clips.
    pub fn output_duration(&self) -> f64 {
        (self.source_duration - self.removed_duration).max(0.0)
    }
}

/// Published results of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalOutcome {
    pub output_path: PathBuf,
    pub adjusted_timestamps_path: Option<PathBuf>,
    pub stats: RunStats,
}

struct ChunkResult {
    report: SilenceReport,
    edited: EditedChunk,
    kind: EditKind,
}

/// Remove silence from `request.input` and publish the edited media (and
/// remapped timestamps, when requested).
///
/// Configuration and request are validated and the tool is checked before
/// any work starts. The scratch directory is removed afterwards unless
/// `config.keep_scratch` is set, whatever the outcome.
pub async fn remove_silence<T: MediaTool + ?Sized>(
    tool: &T,
    request: &RemovalRequest,
    config: &SilenceRemovalConfig,
    progress: &ProgressSender,
    cancel: &CancelToken,
) -> MediaResult<RemovalOutcome> {
    let started = Instant::now();

    let result: MediaResult<RemovalOutcome> = async {
        config.validate()?;
        request.validate()?;
        tool.preflight().await?;

        let events = match &request.timestamps {
            Some(path) => Some(read_events(path).await?),
            None => None,
        };

        let scratch = ScratchDir::create(config.scratch_parent.as_deref(), &request.input)?;
        let result = run(tool, request, config, events, &scratch, progress, cancel).await;
        if let Some(kept) = scratch.finish(config.keep_scratch) {
            info!("Scratch files kept in {}", kept.display());
        }
        result
    }
    .await;

    match result {
        Ok(mut outcome) => {
            outcome.stats.elapsed = started.elapsed();
            metrics::record_run(true);
            info!(
                chunks = outcome.stats.total_chunks,
                removed = format!("{:.2}s", outcome.stats.removed_duration),
                elapsed = format!("{:.2}s", outcome.stats.elapsed.as_secs_f64()),
                output = %outcome.output_path.display(),
                "Silence removal complete"
            );
            progress.complete(
                outcome.stats.total_chunks,
                format!("Removed {:.1}s of silence", outcome.stats.removed_duration),
            );
            Ok(outcome)
        }
        Err(e) => {
            metrics::record_run(false);
            progress.failed(e.chunk_index(), 0, e.to_string());
            Err(e)
        }
    }
}

async fn run<T: MediaTool + ?Sized>(
    tool: &T,
    request: &RemovalRequest,
    config: &SilenceRemovalConfig,
    events: Option<Vec<TimestampEvent>>,
    scratch: &ScratchDir,
    progress: &ProgressSender,
    cancel: &CancelToken,
) -> MediaResult<RemovalOutcome> {
    ensure_not_cancelled(cancel)?;
    progress.stage(PipelineStage::Chunking, 0, "Splitting source into chunks");

    let chunks = split(tool, &request.input, config.chunk_duration_secs, scratch).await?;
    let total = chunks.len();

    let results = process_chunks(tool, &chunks, config, scratch, progress, cancel).await?;
    ensure_not_cancelled(cancel)?;

    let mut stats = RunStats {
        total_chunks: total,
        source_duration: chunks.iter().map(|c| c.duration).sum(),
        ..RunStats::default()
    };
    let mut reports = Vec::with_capacity(total);
    let mut edited = Vec::with_capacity(total);
    for result in results {
        if result.report.has_silence() {
            stats.chunks_with_silence += 1;
        }
        if result.kind == EditKind::Placeholder {
            stats.placeholder_chunks += 1;
        }
        stats.silence_intervals += result.report.intervals.len();
        stats.removed_duration += result.edited.removed_duration;
        reports.push(result.report);
        edited.push(result.edited);
    }

    let map = CumulativeSilenceMap::from_reports(&chunks, &reports)?;
    cross_check(&map, &edited);

    progress.stage(PipelineStage::Assembling, total, "Assembling edited chunks");
    let staging = scratch.assembled_path();
    let staged_timestamps = scratch.adjusted_timestamps_path();

    let remap = async {
        match &events {
            Some(events) => {
                progress.stage(PipelineStage::Remapping, total, "Remapping timestamps");
                let remapped = remap_events(events, &map);
                write_events(&staged_timestamps, &remapped).await?;
                Ok::<_, MediaError>(Some(remapped.len()))
            }
            None => Ok(None),
        }
    };

    let (assembled, remapped) = tokio::join!(
        assemble(tool, edited, &staging, &request.output),
        remap
    );

    let output_path = assembled?;

    let adjusted_timestamps_path = match (remapped, &request.adjusted_timestamps) {
        (Ok(Some(count)), Some(destination)) => {
            if let Err(e) = move_file(&staged_timestamps, destination).await {
                discard(&output_path).await;
                return Err(e);
            }
            stats.events_remapped = count;
            Some(destination.clone())
        }
        (Ok(_), _) => None,
        (Err(e), _) => {
            discard(&output_path).await;
            return Err(e);
        }
    };

    Ok(RemovalOutcome {
        output_path,
        adjusted_timestamps_path,
        stats,
    })
}

/// Detect and edit every chunk on a bounded pool, then report the first
/// failure in chunk order. Sibling chunks run to completion either way.
async fn process_chunks<T: MediaTool + ?Sized>(
    tool: &T,
    chunks: &[Chunk],
    config: &SilenceRemovalConfig,
    scratch: &ScratchDir,
    progress: &ProgressSender,
    cancel: &CancelToken,
) -> MediaResult<Vec<ChunkResult>> {
    let total = chunks.len();
    let detector = SilenceDetector::from_config(config);
    let editor = SegmentEditor::new(config.placeholder_secs);
    let semaphore = Semaphore::new(config.parallelism);

    let futures: Vec<_> = chunks
        .iter()
        .map(|chunk| {
            let detector = &detector;
            let editor = &editor;
            let semaphore = &semaphore;

            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| MediaError::internal("chunk semaphore closed"))?;
                ensure_not_cancelled(cancel)?;

                progress.chunk(PipelineStage::Detecting, chunk.index, total, "Detecting silence");
                let report = detector.detect(tool, chunk).await?;
                ensure_not_cancelled(cancel)?;

                progress.chunk(PipelineStage::Editing, chunk.index, total, "Removing silence");
                let output = scratch.processed_chunk_path(chunk.index);
                let (edited, kind) = editor.edit(tool, chunk, &report, &output).await?;

                metrics::record_chunk_processed(kind.as_str(), edited.removed_duration);
                info!(
                    chunk = chunk.index,
                    total = total,
                    outcome = kind.as_str(),
                    removed = format!("{:.2}s", edited.removed_duration),
                    "Chunk processed"
                );

                Ok::<_, MediaError>(ChunkResult {
                    report,
                    edited,
                    kind,
                })
            }
        })
        .collect();

    let results = join_all(futures).await;

    let mut first_error = None;
    let mut processed = Vec::with_capacity(total);
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(result) => processed.push(result),
            Err(e) if e.is_cancelled() => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                error!(chunk = index, "Chunk failed: {}", e);
                if let Some(stderr) = e.stderr() {
                    warn!(chunk = index, "Tool stderr:\n{}", stderr);
                }
                first_error.get_or_insert(e);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(MediaError::Cancelled);
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(processed),
    }
}

fn ensure_not_cancelled(cancel: &CancelToken) -> MediaResult<()> {
    if cancel.is_cancelled() {
        return Err(MediaError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::progress::{channel, noop_sender};
    use crate::silence_removal::testing::FakeTool;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        scratch_parent: PathBuf,
        request: RemovalRequest,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("talk.mp4");
        tokio::fs::write(&input, b"source").await.unwrap();
        let scratch_parent = dir.path().join("scratch");
        let request = RemovalRequest::new(&input, default_output_path(&input));
        Fixture {
            dir,
            scratch_parent,
            request,
        }
    }

    fn config(scratch_parent: &Path) -> SilenceRemovalConfig {
        SilenceRemovalConfig {
            buffer_secs: 0.0,
            min_silence_secs: 0.0,
            parallelism: 2,
            scratch_parent: Some(scratch_parent.to_path_buf()),
            ..SilenceRemovalConfig::default()
        }
    }

    const CHUNK_ONE_SILENCE: &str = "[silencedetect @ 0x1] silence_start: 10\n\
                                     [silencedetect @ 0x1] silence_end: 15 | silence_duration: 5\n";

    #[test]
    fn test_default_paths() {
        let input = Path::new("/videos/stream.mkv");
        assert_eq!(
            default_output_path(input),
            PathBuf::from("/videos/stream_no_silence.mkv")
        );
        assert_eq!(
            default_timestamps_output_path(input),
            PathBuf::from("/videos/stream_no_silence_timestamps.txt")
        );
    }

    #[tokio::test]
    async fn test_two_chunk_run_with_timestamps() {
        let f = fixture().await;
        let chapters = f.dir.path().join("chapters.txt");
        tokio::fs::write(&chapters, "00:05 Intro\n02:50 Demo\n02:42 Aside\n")
            .await
            .unwrap();
        let request = f.request.clone().with_timestamps(&chapters, None);
        let tool = FakeTool::new(vec![150.0, 150.0]).with_detection(1, CHUNK_ONE_SILENCE);

        let outcome = remove_silence(
            &tool,
            &request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.output_path, f.dir.path().join("talk_no_silence.mp4"));
        let assembled = tokio::fs::read_to_string(&outcome.output_path).await.unwrap();
        assert!(assembled.starts_with("chunk 0|trimmed"));

        // [160,165] on the original timeline
        let adjusted_path = outcome.adjusted_timestamps_path.unwrap();
        assert_eq!(
            adjusted_path,
            f.dir.path().join("talk_no_silence_timestamps.txt")
        );
        assert_eq!(
            tokio::fs::read_to_string(&adjusted_path).await.unwrap(),
            "00:00:05 Intro\n00:02:45 Demo\n00:02:40 Aside\n"
        );

        assert_eq!(outcome.stats.total_chunks, 2);
        assert_eq!(outcome.stats.chunks_with_silence, 1);
        assert_eq!(outcome.stats.removed_duration, 5.0);
        assert_eq!(outcome.stats.output_duration(), 295.0);
        assert_eq!(outcome.stats.events_remapped, 3);

        let mut leftovers = tokio::fs::read_dir(&f.scratch_parent).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chunk_failure_fails_run_without_output() {
        let f = fixture().await;
        let chapters = f.dir.path().join("chapters.txt");
        tokio::fs::write(&chapters, "00:05 Intro\n").await.unwrap();
        let request = f.request.clone().with_timestamps(&chapters, None);
        let mut tool = FakeTool::new(vec![150.0, 150.0, 150.0]);
        tool.fail_detect.insert(1);
        tool.fail_detect.insert(2);

        let err = remove_silence(
            &tool,
            &request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();

        match err {
            MediaError::ToolInvocation { chunk_index, .. } => assert_eq!(chunk_index, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
        // Siblings still ran
        assert!(tool.calls().iter().any(|c| c.starts_with("detect chunk_002")));
        assert!(!request.output.exists());
        assert!(!request.adjusted_timestamps.unwrap().exists());
    }

    #[tokio::test]
    async fn test_assembly_failure_publishes_nothing() {
        let f = fixture().await;
        let chapters = f.dir.path().join("chapters.txt");
        tokio::fs::write(&chapters, "00:05 Intro\n").await.unwrap();
        let request = f.request.clone().with_timestamps(&chapters, None);
        let mut tool = FakeTool::new(vec![150.0, 150.0]);
        tool.fail_concat = true;

        let err = remove_silence(
            &tool,
            &request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::ToolInvocation { .. }));
        assert!(!request.output.exists());
        assert!(!request.adjusted_timestamps.unwrap().exists());
    }

    #[tokio::test]
    async fn test_silent_chunk_becomes_placeholder() {
        let f = fixture().await;
        let tool = FakeTool::new(vec![150.0, 30.0]).with_detection(
            1,
            "silence_start: 0\nsilence_end: 30 | silence_duration: 30\n",
        );

        let outcome = remove_silence(
            &tool,
            &f.request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stats.placeholder_chunks, 1);
        assert!(outcome.adjusted_timestamps_path.is_none());
        let assembled = tokio::fs::read_to_string(&outcome.output_path).await.unwrap();
        assert_eq!(assembled, "chunk 0|placeholder 0.1");
    }

    #[tokio::test]
    async fn test_cancelled_run_does_no_work() {
        let f = fixture().await;
        let tool = FakeTool::new(vec![150.0]);
        let (handle, token) = cancel_pair();
        handle.cancel();

        let err = remove_silence(
            &tool,
            &f.request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &token,
        )
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(tool.calls().is_empty());
        assert!(!f.request.output.exists());
    }

    #[tokio::test]
    async fn test_cancel_during_detection_stops_dispatch() {
        let f = fixture().await;
        let (handle, token) = cancel_pair();
        let tool = FakeTool {
            cancel_on_detect: Some((1, handle)),
            ..FakeTool::new(vec![150.0, 150.0, 150.0])
        };
        let config = config(&f.scratch_parent).with_parallelism(1);
        let (sender, mut receiver) = channel(64);

        let err = remove_silence(&tool, &f.request, &config, &sender, &token)
            .await
            .unwrap_err();
        drop(sender);

        assert!(err.is_cancelled());
        let calls = tool.calls();
        assert!(calls.iter().any(|c| c.starts_with("detect chunk_001")));
        assert!(!calls.iter().any(|c| c.starts_with("detect chunk_002")));
        assert!(!calls.iter().any(|c| c.starts_with("trim") || c.starts_with("concat")));
        assert!(!f.request.output.exists());

        let mut last = None;
        while let Some(event) = receiver.recv().await {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.stage, PipelineStage::Failed);
        assert_eq!(last.chunk_index, None);

        let mut leftovers = tokio::fs::read_dir(&f.scratch_parent).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_timestamp_publish_removes_output() {
        let f = fixture().await;
        let chapters = f.dir.path().join("chapters.txt");
        tokio::fs::write(&chapters, "00:05 Intro
").await.unwrap();
        // A regular file where the destination's directory should be
        let blocker = f.dir.path().join("blocker");
        tokio::fs::write(&blocker, b"not a directory").await.unwrap();
        let request = f
            .request
            .clone()
            .with_timestamps(&chapters, Some(blocker.join("adjusted.txt")));
        let tool = FakeTool::new(vec![150.0, 150.0]);

        let err = remove_silence(
            &tool,
            &request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::Io(_)));
        assert!(tool.calls().iter().any(|c| c.starts_with("concat")));
        assert!(!request.output.exists());
    }

    #[tokio::test]
    async fn test_chunk_failure_event_names_the_chunk() {
        let f = fixture().await;
        let mut tool = FakeTool::new(vec![150.0, 150.0]);
        tool.fail_detect.insert(1);
        let (sender, mut receiver) = channel(64);

        remove_silence(
            &tool,
            &f.request,
            &config(&f.scratch_parent),
            &sender,
            &CancelToken::never(),
        )
        .await
        .unwrap_err();
        drop(sender);

        let mut failures = Vec::new();
        while let Some(event) = receiver.recv().await {
            if event.stage == PipelineStage::Failed {
                failures.push(event);
            }
        }
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].chunk_index, Some(1));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_tools() {
        let f = fixture().await;
        let tool = FakeTool::new(vec![150.0]);
        let config = config(&f.scratch_parent).with_buffer(-1.0);

        let err = remove_silence(&tool, &f.request, &config, &noop_sender(), &CancelToken::never())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Validation(_)));
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let f = fixture().await;
        let tool = FakeTool {
            unavailable: true,
            ..FakeTool::new(vec![150.0])
        };

        let err = remove_silence(
            &tool,
            &f.request,
            &config(&f.scratch_parent),
            &noop_sender(),
            &CancelToken::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_progress_events() {
        let f = fixture().await;
        let tool = FakeTool::new(vec![150.0, 150.0]);
        let (sender, mut receiver) = channel(64);

        remove_silence(
            &tool,
            &f.request,
            &config(&f.scratch_parent),
            &sender,
            &CancelToken::never(),
        )
        .await
        .unwrap();
        drop(sender);

        let mut stages = Vec::new();
        while let Some(event) = receiver.recv().await {
            stages.push(event.stage);
        }

        assert_eq!(stages.first(), Some(&PipelineStage::Chunking));
        assert_eq!(stages.last(), Some(&PipelineStage::Complete));
        assert_eq!(
            stages.iter().filter(|s| **s == PipelineStage::Detecting).count(),
            2
        );
        assert!(!stages.contains(&PipelineStage::Remapping));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let f = fixture().await;

        let same = RemovalRequest::new(&f.request.input, &f.request.input);
        assert!(matches!(same.validate(), Err(MediaError::Validation(_))));

        let missing = RemovalRequest::new(f.dir.path().join("nope.mp4"), "out.mp4");
        assert!(matches!(missing.validate(), Err(MediaError::FileNotFound(_))));

        let no_chapters = f
            .request
            .clone()
            .with_timestamps(f.dir.path().join("missing.txt"), None);
        assert!(matches!(no_chapters.validate(), Err(MediaError::FileNotFound(_))));
    }
}
