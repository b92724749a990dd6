//! Join edited chunks into the final output.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use hushcut_models::EditedChunk;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{copy_file, discard, move_file};
use crate::tool::{ConcatMode, MediaTool};

/// Sort edited chunks by index, requiring each of `0..n` exactly once.
pub fn order_chunks(mut edited: Vec<EditedChunk>) -> MediaResult<Vec<EditedChunk>> {
    if edited.is_empty() {
        return Err(MediaError::MissingChunk { index: 0 });
    }

    edited.sort_by_key(|e| e.chunk_index);

    for (expected, chunk) in edited.iter().enumerate() {
        if chunk.chunk_index == expected {
            continue;
        }
        if expected > 0 && chunk.chunk_index == expected - 1 {
            return Err(MediaError::DuplicateChunk {
                index: chunk.chunk_index,
            });
        }
        return Err(MediaError::MissingChunk { index: expected });
    }

    Ok(edited)
}

/// Concatenate `edited` in index order into `output`.
///
/// The result is built at `staging` (inside the scratch directory) and only
/// moved onto `output` once the tool succeeded. On failure nothing is left
/// at either path.
pub async fn assemble<T: MediaTool + ?Sized>(
    tool: &T,
    edited: Vec<EditedChunk>,
    staging: &Path,
    output: &Path,
) -> MediaResult<PathBuf> {
    let ordered = order_chunks(edited)?;

    if let Err(e) = build(tool, &ordered, staging).await {
        discard(staging).await;
        return Err(e);
    }

    move_file(staging, output).await?;
    info!(
        chunks = ordered.len(),
        output = %output.display(),
        "Output assembled"
    );
    Ok(output.to_path_buf())
}

async fn build<T: MediaTool + ?Sized>(
    tool: &T,
    ordered: &[EditedChunk],
    staging: &Path,
) -> MediaResult<()> {
    let paths: Vec<PathBuf> = ordered.iter().map(|e| e.path.clone()).collect();

    if let [only] = paths.as_slice() {
        copy_file(only, staging).await?;
        return Ok(());
    }

    let infos = try_join_all(paths.iter().map(|path| tool.probe(path))).await?;
    let first = &infos[0];

    let mut mode = ConcatMode::StreamCopy;
    for (index, info) in infos.iter().enumerate().skip(1) {
        let mismatches = first.concat_mismatches(info);
        if !mismatches.is_empty() {
            warn!(
                chunk = index,
                "Edited chunk layout differs ({}), re-encoding during assembly",
                mismatches.join(", ")
            );
            mode = ConcatMode::Reencode;
            break;
        }
    }

    tool.concat(&paths, staging, mode, &first.layout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silence_removal::testing::FakeTool;
    use tempfile::TempDir;

    fn edited(index: usize) -> EditedChunk {
        EditedChunk {
            chunk_index: index,
            path: PathBuf::from(format!("processed_chunk_{:03}.mp4", index)),
            removed_duration: 0.0,
        }
    }

    async fn write_chunks(dir: &Path, count: usize) -> Vec<EditedChunk> {
        let mut chunks = Vec::new();
        for index in 0..count {
            let path = dir.join(format!("processed_chunk_{:03}.mp4", index));
            tokio::fs::write(&path, format!("c{}", index)).await.unwrap();
            chunks.push(EditedChunk {
                chunk_index: index,
                path,
                removed_duration: 0.0,
            });
        }
        chunks
    }

    #[test]
    fn test_order_sorts_by_index() {
        let ordered = order_chunks(vec![edited(2), edited(0), edited(1)]).unwrap();
        let indices: Vec<_> = ordered.iter().map(|e| e.chunk_index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn test_order_detects_missing_and_duplicates() {
        let err = order_chunks(vec![edited(0), edited(2)]).unwrap_err();
        assert!(matches!(err, MediaError::MissingChunk { index: 1 }));

        let err = order_chunks(vec![edited(0), edited(1), edited(1)]).unwrap_err();
        assert!(matches!(err, MediaError::DuplicateChunk { index: 1 }));

        let err = order_chunks(vec![edited(1)]).unwrap_err();
        assert!(matches!(err, MediaError::MissingChunk { index: 0 }));

        let err = order_chunks(vec![]).unwrap_err();
        assert!(matches!(err, MediaError::MissingChunk { index: 0 }));
    }

    #[tokio::test]
    async fn test_assemble_in_index_order_with_stream_copy() {
        let dir = TempDir::new().unwrap();
        let mut chunks = write_chunks(dir.path(), 3).await;
        chunks.reverse();
        let tool = FakeTool::default();
        let output = dir.path().join("out").join("final.mp4");

        let published = assemble(&tool, chunks, &dir.path().join("assembled.mp4"), &output)
            .await
            .unwrap();

        assert_eq!(published, output);
        assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "c0|c1|c2");
        assert_eq!(*tool.concat_modes.lock().unwrap(), [ConcatMode::StreamCopy]);
        assert!(!dir.path().join("assembled.mp4").exists());
    }

    #[tokio::test]
    async fn test_layout_mismatch_reencodes() {
        let dir = TempDir::new().unwrap();
        let chunks = write_chunks(dir.path(), 2).await;
        let mut tool = FakeTool::default();
        tool.odd_layout.insert(1);

        assemble(&tool, chunks, &dir.path().join("assembled.mp4"), &dir.path().join("final.mp4"))
            .await
            .unwrap();

        assert_eq!(*tool.concat_modes.lock().unwrap(), [ConcatMode::Reencode]);
    }

    #[tokio::test]
    async fn test_failed_concat_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let chunks = write_chunks(dir.path(), 2).await;
        let tool = FakeTool {
            fail_concat: true,
            ..FakeTool::default()
        };
        let staging = dir.path().join("assembled.mp4");
        let output = dir.path().join("final.mp4");

        let err = assemble(&tool, chunks, &staging, &output).await.unwrap_err();

        assert!(matches!(err, MediaError::ToolInvocation { .. }));
        assert!(!staging.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_single_chunk_is_copied() {
        let dir = TempDir::new().unwrap();
        let chunks = write_chunks(dir.path(), 1).await;
        let tool = FakeTool::default();
        let output = dir.path().join("final.mp4");

        assemble(&tool, chunks, &dir.path().join("assembled.mp4"), &output)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "c0");
        assert!(tool.calls().is_empty());
    }
}
