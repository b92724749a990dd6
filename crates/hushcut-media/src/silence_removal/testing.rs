//! Scripted in-memory media tool for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use hushcut_models::TimeInterval;

use crate::cancel::CancelHandle;
use crate::error::{MediaError, MediaResult};
use crate::probe::{MediaInfo, StreamInfo, StreamKind, StreamLayout};
use crate::tool::{ConcatMode, MediaTool};

/// Fake tool. Files it "produces" contain a short text description so tests
/// can inspect what was spliced together.
#[derive(Debug, Default)]
pub struct FakeTool {
    /// Duration reported for the source file.
    pub source_duration: f64,
    /// Duration of each chunk file produced by `segment`.
    pub chunk_durations: Vec<f64>,
    /// Detector text per chunk index.
    pub detector_output: HashMap<usize, String>,
    /// Chunk indices whose detection fails.
    pub fail_detect: HashSet<usize>,
    /// Fail the final concatenation.
    pub fail_concat: bool,
    /// Report a different sample rate for processed chunks with these indices.
    pub odd_layout: HashSet<usize>,
    /// Pretend ffmpeg is missing.
    pub unavailable: bool,
    /// Cancel the run while detecting this chunk index.
    pub cancel_on_detect: Option<(usize, CancelHandle)>,
    pub calls: Mutex<Vec<String>>,
    pub concat_modes: Mutex<Vec<ConcatMode>>,
}

impl FakeTool {
    pub fn new(chunk_durations: Vec<f64>) -> Self {
        Self {
            source_duration: chunk_durations.iter().sum(),
            chunk_durations,
            ..Self::default()
        }
    }

    pub fn with_detection(mut self, index: usize, output: &str) -> Self {
        self.detector_output.insert(index, output.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn media_info(duration: f64, sample_rate: u32) -> MediaInfo {
        MediaInfo {
            duration,
            size: 0,
            bitrate: 0,
            streams: vec![
                StreamInfo {
                    kind: StreamKind::Video,
                    codec: "h264".to_string(),
                    width: Some(1280),
                    height: Some(720),
                    frame_rate: Some(30.0),
                    sample_rate: None,
                    channels: None,
                    channel_layout: None,
                },
                StreamInfo {
                    kind: StreamKind::Audio,
                    codec: "aac".to_string(),
                    width: None,
                    height: None,
                    frame_rate: None,
                    sample_rate: Some(sample_rate),
                    channels: Some(2),
                    channel_layout: Some("stereo".to_string()),
                },
            ],
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Index encoded in `chunk_007.mp4` or `processed_chunk_007.mp4`.
fn index_after(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.split('.').next()?.parse().ok()
}

#[async_trait]
impl MediaTool for FakeTool {
    async fn preflight(&self) -> MediaResult<()> {
        if self.unavailable {
            return Err(MediaError::tool_unavailable("ffmpeg"));
        }
        Ok(())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let name = file_name(path);
        self.record(format!("probe {}", name));

        if let Some(index) = index_after(&name, "processed_chunk_") {
            let rate = if self.odd_layout.contains(&index) {
                48000
            } else {
                44100
            };
            return Ok(Self::media_info(1.0, rate));
        }
        if let Some(index) = index_after(&name, "chunk_") {
            let duration = self
                .chunk_durations
                .get(index)
                .copied()
                .ok_or_else(|| MediaError::invalid_media(format!("unknown chunk {}", index)))?;
            return Ok(Self::media_info(duration, 44100));
        }
        Ok(Self::media_info(self.source_duration, 44100))
    }

    async fn segment(
        &self,
        source: &Path,
        chunk_secs: f64,
        pattern: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        self.record(format!("segment {} {}", file_name(source), chunk_secs));
        let dir = pattern.parent().unwrap();
        let ext = pattern.extension().unwrap().to_string_lossy().into_owned();

        let mut paths = Vec::new();
        for index in 0..self.chunk_durations.len() {
            let path = dir.join(format!("chunk_{:03}.{}", index, ext));
            tokio::fs::write(&path, format!("chunk {}", index)).await?;
            paths.push(path);
        }
        Ok(paths)
    }

    async fn detect_silence(
        &self,
        path: &Path,
        noise_db: f64,
        min_secs: f64,
    ) -> MediaResult<String> {
        let name = file_name(path);
        self.record(format!("detect {} {} {}", name, noise_db, min_secs));
        let index = index_after(&name, "chunk_").unwrap_or_default();

        if let Some((at, handle)) = &self.cancel_on_detect {
            if *at == index {
                handle.cancel();
            }
        }

        if self.fail_detect.contains(&index) {
            return Err(MediaError::tool_failed(
                "ffmpeg",
                "exited with exit status: 1",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }
        Ok(self.detector_output.get(&index).cloned().unwrap_or_default())
    }

    async fn trim_and_concat(
        &self,
        path: &Path,
        keep: &[TimeInterval],
        _layout: &StreamLayout,
        output: &Path,
    ) -> MediaResult<()> {
        self.record(format!("trim {} {}", file_name(path), keep.len()));
        let spans: Vec<String> = keep.iter().map(|k| k.to_string()).collect();
        tokio::fs::write(output, format!("trimmed {}", spans.join(","))).await?;
        Ok(())
    }

    async fn placeholder(
        &self,
        _layout: &StreamLayout,
        duration: f64,
        output: &Path,
    ) -> MediaResult<()> {
        self.record(format!("placeholder {}", duration));
        tokio::fs::write(output, format!("placeholder {}", duration)).await?;
        Ok(())
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        mode: ConcatMode,
        _layout: &StreamLayout,
    ) -> MediaResult<()> {
        self.record(format!("concat {}", inputs.len()));
        self.concat_modes.lock().unwrap().push(mode);

        // Leave a partial file behind to check it gets discarded.
        tokio::fs::write(output, b"partial").await?;
        if self.fail_concat {
            return Err(MediaError::tool_failed("ffmpeg", "concat failed", None, Some(1)));
        }

        let mut joined = Vec::new();
        for input in inputs {
            joined.push(tokio::fs::read_to_string(input).await?);
        }
        tokio::fs::write(output, joined.join("|")).await?;
        Ok(())
    }
}
