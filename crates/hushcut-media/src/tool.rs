//! The external media tool seam.
//!
//! The pipeline only talks to FFmpeg through [`MediaTool`], so tests can
//! drive it with a scripted fake. [`FfmpegTool`] is the production
//! implementation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hushcut_models::{EncodingSettings, TimeInterval};
use tracing::debug;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_media, MediaInfo, StreamLayout};

/// Keep-interval count above which the filter graph goes to a script file.
pub const DEFAULT_MAX_INLINE_SEGMENTS: usize = 100;

/// How the assembler joins edited chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    /// Concat demuxer with stream copy. Requires identical stream layouts.
    StreamCopy,
    /// Concat filter graph with re-encoding.
    Reencode,
}

/// Operations the silence-removal pipeline needs from a media tool.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Fail with `ToolUnavailable` when the tool is not installed.
    async fn preflight(&self) -> MediaResult<()>;

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Split `source` into stream-copied segments of `chunk_secs` each.
    ///
    /// `pattern` is a printf-style file pattern such as
    /// `/tmp/x/chunk_%03d.mp4`. Returns the produced files in order.
    async fn segment(
        &self,
        source: &Path,
        chunk_secs: f64,
        pattern: &Path,
    ) -> MediaResult<Vec<PathBuf>>;

    /// Run silence detection and return the raw detector event text.
    async fn detect_silence(&self, path: &Path, noise_db: f64, min_secs: f64)
        -> MediaResult<String>;

    /// Cut `keep` intervals out of `path` and splice them into `output`.
    async fn trim_and_concat(
        &self,
        path: &Path,
        keep: &[TimeInterval],
        layout: &StreamLayout,
        output: &Path,
    ) -> MediaResult<()>;

    /// Write a silent, blank clip of `duration` seconds matching `layout`.
    async fn placeholder(&self, layout: &StreamLayout, duration: f64, output: &Path)
        -> MediaResult<()>;

    /// Join `inputs` in order into `output`.
    ///
    /// In `Reencode` mode every input is conformed to `layout` first.
    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        mode: ConcatMode,
        layout: &StreamLayout,
    ) -> MediaResult<()>;
}

/// [`MediaTool`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    runner: FfmpegRunner,
    encoding: EncodingSettings,
    max_inline_segments: usize,
}

impl FfmpegTool {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            encoding: EncodingSettings::default(),
            max_inline_segments: DEFAULT_MAX_INLINE_SEGMENTS,
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingSettings) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_max_inline_segments(mut self, max: usize) -> Self {
        self.max_inline_segments = max;
        self
    }

    fn encode(&self, mut cmd: FfmpegCommand, layout: &StreamLayout) -> FfmpegCommand {
        if layout.has_video {
            cmd = cmd.output_args(self.encoding.video_args()).output_args(["-pix_fmt", "yuv420p"]);
        }
        if layout.has_audio {
            cmd = cmd.output_args(self.encoding.audio_args());
        }
        cmd
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn preflight(&self) -> MediaResult<()> {
        let ffmpeg = check_ffmpeg()?;
        let ffprobe = check_ffprobe()?;
        debug!("Using {} and {}", ffmpeg.display(), ffprobe.display());
        Ok(())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(&self.runner, path).await
    }

    async fn segment(
        &self,
        source: &Path,
        chunk_secs: f64,
        pattern: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        let cmd = FfmpegCommand::new(source, pattern)
            .map("0:v?")
            .map("0:a?")
            .stream_copy()
            .format("segment")
            .output_args(["-segment_time".to_string(), format!("{:.3}", chunk_secs)])
            .output_args(["-reset_timestamps", "1"]);

        self.runner.run(&cmd).await?;
        list_segments(pattern).await
    }

    async fn detect_silence(
        &self,
        path: &Path,
        noise_db: f64,
        min_secs: f64,
    ) -> MediaResult<String> {
        let cmd = FfmpegCommand::new(path, "-")
            .log_level("info")
            .no_video()
            .audio_filter(silencedetect_filter(noise_db, min_secs))
            .format("null");

        // silencedetect reports on stderr
        let output = self.runner.run(&cmd).await?;
        Ok(output.stderr)
    }

    async fn trim_and_concat(
        &self,
        path: &Path,
        keep: &[TimeInterval],
        layout: &StreamLayout,
        output: &Path,
    ) -> MediaResult<()> {
        if keep.is_empty() {
            return Err(MediaError::internal("trim_and_concat called without keep intervals"));
        }
        if !layout.has_video && !layout.has_audio {
            return Err(MediaError::invalid_media(format!(
                "{} has no audio or video stream",
                path.display()
            )));
        }

        let graph = build_trim_concat_filter(keep, layout.has_video, layout.has_audio);
        let mut cmd = FfmpegCommand::new(path, output);

        if keep.len() > self.max_inline_segments {
            let script = output.with_extension("filtergraph");
            tokio::fs::write(&script, &graph).await?;
            debug!(
                "Filter graph for {} keep intervals written to {}",
                keep.len(),
                script.display()
            );
            cmd = cmd.filter_complex_script(&script);
        } else {
            cmd = cmd.filter_complex(&graph);
        }

        if layout.has_video {
            cmd = cmd.map("[outv]");
        }
        if layout.has_audio {
            cmd = cmd.map("[outa]");
        }
        let cmd = self.encode(cmd, layout);

        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn placeholder(
        &self,
        layout: &StreamLayout,
        duration: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::without_input(output);
        if layout.has_audio {
            cmd = cmd.lavfi_input(format!(
                "anullsrc=channel_layout={}:sample_rate={}",
                layout.channel_layout(),
                layout.sample_rate
            ));
        }
        if layout.has_video || !layout.has_audio {
            cmd = cmd.lavfi_input(format!(
                "color=c=black:s={}x{}:r={}",
                layout.width,
                layout.height,
                layout.frame_rate_arg()
            ));
        }

        let cmd = self.encode(cmd.duration(duration), layout);
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        mode: ConcatMode,
        layout: &StreamLayout,
    ) -> MediaResult<()> {
        if inputs.is_empty() {
            return Err(MediaError::internal("nothing to concatenate"));
        }

        let cmd = match mode {
            ConcatMode::StreamCopy => {
                let list = output.with_extension("concat.txt");
                tokio::fs::write(&list, concat_list(inputs)).await?;

                FfmpegCommand::without_input(output)
                    .add_input_with(["-f", "concat", "-safe", "0"], list.as_os_str())
                    .stream_copy()
                    .faststart()
            }
            ConcatMode::Reencode => {
                let mut cmd = FfmpegCommand::without_input(output);
                for input in inputs {
                    cmd = cmd.add_input(input);
                }
                cmd = cmd.filter_complex(build_conform_concat_filter(inputs.len(), layout));
                if layout.has_video {
                    cmd = cmd.map("[outv]");
                }
                if layout.has_audio {
                    cmd = cmd.map("[outa]");
                }
                self.encode(cmd, layout).faststart()
            }
        };

        self.runner.run(&cmd).await?;
        Ok(())
    }
}

/// `silencedetect` audio filter expression.
pub fn silencedetect_filter(noise_db: f64, min_secs: f64) -> String {
    format!("silencedetect=noise={}dB:d={}", noise_db, min_secs)
}

/// Filter graph trimming each keep interval and concatenating the pieces.
pub fn build_trim_concat_filter(keep: &[TimeInterval], has_video: bool, has_audio: bool) -> String {
    let mut graph = String::new();

    for (i, interval) in keep.iter().enumerate() {
        if has_video {
            graph.push_str(&format!(
                "[0:v]trim=start={:.6}:end={:.6},setpts=PTS-STARTPTS[v{}];",
                interval.start, interval.end, i
            ));
        }
        if has_audio {
            graph.push_str(&format!(
                "[0:a]atrim=start={:.6}:end={:.6},asetpts=PTS-STARTPTS[a{}];",
                interval.start, interval.end, i
            ));
        }
    }

    push_concat(&mut graph, keep.len(), has_video, has_audio);
    graph
}

/// Filter graph scaling, padding and resampling every input to `layout`
/// before concatenation.
pub fn build_conform_concat_filter(count: usize, layout: &StreamLayout) -> String {
    let mut graph = String::new();

    for i in 0..count {
        if layout.has_video {
            graph.push_str(&format!(
                "[{i}:v:0]scale={w}:{h}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}[v{i}];",
                i = i,
                w = layout.width,
                h = layout.height,
                fps = layout.frame_rate_arg()
            ));
        }
        if layout.has_audio {
            graph.push_str(&format!(
                "[{i}:a:0]aformat=sample_rates={sr}:channel_layouts={cl}[a{i}];",
                i = i,
                sr = layout.sample_rate,
                cl = layout.channel_layout()
            ));
        }
    }

    push_concat(&mut graph, count, layout.has_video, layout.has_audio);
    graph
}

fn push_concat(graph: &mut String, count: usize, has_video: bool, has_audio: bool) {
    for i in 0..count {
        if has_video {
            graph.push_str(&format!("[v{}]", i));
        }
        if has_audio {
            graph.push_str(&format!("[a{}]", i));
        }
    }

    graph.push_str(&format!(
        "concat=n={}:v={}:a={}",
        count,
        u8::from(has_video),
        u8::from(has_audio)
    ));
    if has_video {
        graph.push_str("[outv]");
    }
    if has_audio {
        graph.push_str("[outa]");
    }
}

/// Concat demuxer list file body.
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", escape_concat_path(p)))
        .collect()
}

/// Quote a path for the concat demuxer: `'` becomes `'\''`.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Files produced by a segment pattern, in index order.
async fn list_segments(pattern: &Path) -> MediaResult<Vec<PathBuf>> {
    let dir = pattern
        .parent()
        .ok_or_else(|| MediaError::internal("segment pattern has no directory"))?;
    let file_pattern = pattern
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MediaError::internal("segment pattern has no file name"))?;
    let (prefix, rest) = file_pattern
        .split_once('%')
        .ok_or_else(|| MediaError::internal("segment pattern has no index placeholder"))?;
    let suffix = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == 'd');

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name: OsString = entry.file_name();
        let name = name.to_string_lossy();
        let index = name
            .strip_prefix(prefix)
            .and_then(|n| n.strip_suffix(suffix))
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(index) = index {
            found.push((index, entry.path()));
        }
    }

    found.sort_by_key(|(index, _)| *index);
    Ok(found.into_iter().map(|(_, path)| path).collect())
}
