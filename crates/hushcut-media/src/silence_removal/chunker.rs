//! Split the source into bounded time windows.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use hushcut_models::Chunk;
use tracing::{debug, info, warn};

use super::config::{is_valid_chunk_duration, MIN_CHUNK_DURATION_SECS};
use super::scratch::ScratchDir;
use crate::command::FFMPEG;
use crate::error::{MediaError, MediaResult};
use crate::tool::MediaTool;

/// Drift between the chunk sum and the source duration that is still
/// considered contiguous.
const CONTIGUITY_TOLERANCE_SECS: f64 = 1.0;

/// Split `source` into chunks of at most `chunk_duration` seconds.
///
/// Chunks are stream-copied into the scratch directory. Durations come from
/// probing each chunk file; offsets are the running sum of those durations,
/// so keyframe-aligned cuts never drift the original timeline.
pub async fn split<T: MediaTool + ?Sized>(
    tool: &T,
    source: &Path,
    chunk_duration: f64,
    scratch: &ScratchDir,
) -> MediaResult<Vec<Chunk>> {
    if !is_valid_chunk_duration(chunk_duration) {
        return Err(MediaError::validation(format!(
            "chunk duration must be >= {} seconds, got {}",
            MIN_CHUNK_DURATION_SECS, chunk_duration
        )));
    }

    let source_info = tool.probe(source).await?;
    debug!(
        source = %source.display(),
        duration = format!("{:.2}s", source_info.duration),
        "Splitting source into {:.0}s chunks",
        chunk_duration
    );

    let paths = tool
        .segment(source, chunk_duration, &scratch.chunk_pattern())
        .await?;
    if paths.is_empty() {
        return Err(MediaError::tool_failed(
            FFMPEG,
            "segmentation produced no chunks",
            None,
            None,
        ));
    }

    let durations = try_join_all(paths.iter().map(|path| async move {
        tool.probe(path).await.map(|info| info.duration)
    }))
    .await?;

    let chunks = assign_offsets(paths, &durations);

    if let Some(drift) = contiguity_drift(&chunks, source_info.duration) {
        warn!(
            drift = format!("{:.2}s", drift),
            "Chunk durations do not add up to the source duration"
        );
    }

    info!(
        chunks = chunks.len(),
        duration = format!("{:.2}s", source_info.duration),
        "Source split into chunks"
    );

    Ok(chunks)
}

/// Pair chunk files with probed durations; `start_offset` is the sum of all
/// earlier durations.
pub fn assign_offsets(paths: Vec<PathBuf>, durations: &[f64]) -> Vec<Chunk> {
    let mut offset = 0.0;
    paths
        .into_iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (path, &duration))| {
            let chunk = Chunk {
                index,
                path,
                start_offset: offset,
                duration,
            };
            offset += duration;
            chunk
        })
        .collect()
}

/// Signed drift between the summed chunk durations and the source duration,
/// when it exceeds tolerance.
pub fn contiguity_drift(chunks: &[Chunk], source_duration: f64) -> Option<f64> {
    let covered = chunks.last().map(Chunk::end_offset).unwrap_or(0.0);
    let drift = covered - source_duration;
    (drift.abs() > CONTIGUITY_TOLERANCE_SECS).then_some(drift)
}
