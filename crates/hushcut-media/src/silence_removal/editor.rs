//! Cut silence out of a single chunk.

use std::path::Path;

use hushcut_models::{Chunk, EditedChunk, SilenceReport};
use tracing::{debug, info};

use super::segmenter::{compute_segment_stats, keep_intervals};
use crate::error::MediaResult;
use crate::fs_utils::copy_file;
use crate::tool::MediaTool;

/// How a chunk was turned into its edited form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// No silence; the chunk was copied unchanged.
    Copied,
    /// Keep intervals were trimmed and spliced.
    Trimmed { segments: usize },
    /// Nothing to keep; a short blank clip stands in for the chunk.
    Placeholder,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Copied => "copied",
            EditKind::Trimmed { .. } => "trimmed",
            EditKind::Placeholder => "placeholder",
        }
    }
}

/// Produces edited chunks from silence reports.
#[derive(Debug, Clone)]
pub struct SegmentEditor {
    placeholder_secs: f64,
}

impl SegmentEditor {
    pub fn new(placeholder_secs: f64) -> Self {
        Self { placeholder_secs }
    }

    /// Edit `chunk` according to `report`, writing to `output`.
    pub async fn edit<T: MediaTool + ?Sized>(
        &self,
        tool: &T,
        chunk: &Chunk,
        report: &SilenceReport,
        output: &Path,
    ) -> MediaResult<(EditedChunk, EditKind)> {
        self.edit_inner(tool, chunk, report, output)
            .await
            .map_err(|e| e.for_chunk(chunk.index))
    }

    async fn edit_inner<T: MediaTool + ?Sized>(
        &self,
        tool: &T,
        chunk: &Chunk,
        report: &SilenceReport,
        output: &Path,
    ) -> MediaResult<(EditedChunk, EditKind)> {
        if !report.has_silence() {
            copy_file(&chunk.path, output).await?;
            debug!(chunk = chunk.index, "No silence, chunk copied");
            return Ok((edited(chunk, output, 0.0), EditKind::Copied));
        }

        let keep = keep_intervals(&report.intervals, report.chunk_duration);
        let stats = compute_segment_stats(&keep, &report.intervals);
        let removed = stats.cut_secs;
        let layout = tool.probe(&chunk.path).await?.layout();

        if keep.is_empty() {
            tool.placeholder(&layout, self.placeholder_secs, output).await?;
            info!(
                chunk = chunk.index,
                removed = format!("{:.2}s", removed),
                "Chunk is entirely silent, emitted placeholder"
            );
            return Ok((edited(chunk, output, removed), EditKind::Placeholder));
        }

        tool.trim_and_concat(&chunk.path, &keep, &layout, output)
            .await?;

        debug!(
            chunk = chunk.index,
            keep_segments = stats.keep_count,
            cut_segments = stats.cut_count,
            keep_ratio = format!("{:.1}%", stats.keep_ratio * 100.0),
            "Chunk trimmed"
        );

        Ok((
            edited(chunk, output, removed),
            EditKind::Trimmed {
                segments: keep.len(),
            },
        ))
    }
}

fn edited(chunk: &Chunk, output: &Path, removed_duration: f64) -> EditedChunk {
    EditedChunk {
        chunk_index: chunk.index,
        path: output.to_path_buf(),
        removed_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silence_removal::testing::FakeTool;
    use hushcut_models::TimeInterval;
    use tempfile::TempDir;

    async fn setup(duration: f64) -> (TempDir, Chunk) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunk_000.mp4");
        let payload: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 251) as u8).collect();
        tokio::fs::write(&path, payload).await.unwrap();
        let chunk = Chunk {
            index: 0,
            path,
            start_offset: 0.0,
            duration,
        };
        (dir, chunk)
    }

    #[tokio::test]
    async fn test_empty_report_copies_bytes() {
        let tool = FakeTool::new(vec![30.0]);
        let (dir, chunk) = setup(30.0).await;
        let output = dir.path().join("processed_chunk_000.mp4");

        let (edited, kind) = SegmentEditor::new(0.1)
            .edit(&tool, &chunk, &SilenceReport::empty(0, 30.0), &output)
            .await
            .unwrap();

        assert_eq!(kind, EditKind::Copied);
        assert_eq!(edited.removed_duration, 0.0);
        assert_eq!(
            tokio::fs::read(&output).await.unwrap(),
            tokio::fs::read(&chunk.path).await.unwrap()
        );
        assert!(tool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_silence_is_trimmed() {
        let tool = FakeTool::new(vec![30.0]);
        let (dir, chunk) = setup(30.0).await;
        let output = dir.path().join("processed_chunk_000.mp4");
        let report = SilenceReport {
            chunk_index: 0,
            intervals: vec![TimeInterval::new(5.0, 10.0), TimeInterval::new(20.0, 22.5)],
            chunk_duration: 30.0,
        };

        let (edited, kind) = SegmentEditor::new(0.1)
            .edit(&tool, &chunk, &report, &output)
            .await
            .unwrap();

        assert_eq!(kind, EditKind::Trimmed { segments: 3 });
        assert_eq!(edited.removed_duration, 7.5);
        assert!(tool.calls().contains(&"trim chunk_000.mp4 3".to_string()));
    }

    #[tokio::test]
    async fn test_fully_silent_chunk_gets_placeholder() {
        let tool = FakeTool::new(vec![30.0]);
        let (dir, chunk) = setup(30.0).await;
        let output = dir.path().join("processed_chunk_000.mp4");
        let report = SilenceReport {
            chunk_index: 0,
            intervals: vec![TimeInterval::new(0.0, 30.0)],
            chunk_duration: 30.0,
        };

        let (edited, kind) = SegmentEditor::new(0.1)
            .edit(&tool, &chunk, &report, &output)
            .await
            .unwrap();

        assert_eq!(kind, EditKind::Placeholder);
        assert_eq!(edited.removed_duration, 30.0);
        let written = tokio::fs::read(&output).await.unwrap();
        assert!(!written.is_empty());
        assert!(tool.calls().contains(&"placeholder 0.1".to_string()));
    }
}
