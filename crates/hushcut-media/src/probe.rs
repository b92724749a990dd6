//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

use crate::command::{FfmpegRunner, FFPROBE};
use crate::error::{MediaError, MediaResult};

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// One stream of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub kind: StreamKind,
    pub codec: String,
    /// Width in pixels (video)
    pub width: Option<u32>,
    /// Height in pixels (video)
    pub height: Option<u32>,
    /// Frames per second (video)
    pub frame_rate: Option<f64>,
    /// Samples per second (audio)
    pub sample_rate: Option<u32>,
    /// Channel count (audio)
    pub channels: Option<u32>,
    /// Channel layout name such as "stereo" (audio)
    pub channel_layout: Option<String>,
}

/// Media file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub streams: Vec<StreamInfo>,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
}

impl MediaInfo {
    /// First video stream.
    pub fn video(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    /// First audio stream.
    pub fn audio(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Audio)
    }

    pub fn has_video(&self) -> bool {
        self.video().is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio().is_some()
    }

    /// Differences that prevent stream-copy concatenation with `other`.
    ///
    /// Empty when both files share codecs, resolution, frame rate, sample rate
    /// and channel count for their first video and audio streams.
    pub fn concat_mismatches(&self, other: &MediaInfo) -> Vec<String> {
        let mut mismatches = Vec::new();

        match (self.video(), other.video()) {
            (Some(a), Some(b)) => {
                if a.codec != b.codec {
                    mismatches.push(format!("video codec {} vs {}", a.codec, b.codec));
                }
                if a.width != b.width || a.height != b.height {
                    mismatches.push(format!(
                        "resolution {}x{} vs {}x{}",
                        a.width.unwrap_or(0),
                        a.height.unwrap_or(0),
                        b.width.unwrap_or(0),
                        b.height.unwrap_or(0)
                    ));
                }
                if !same_rate(a.frame_rate, b.frame_rate) {
                    mismatches.push(format!(
                        "frame rate {:.3} vs {:.3}",
                        a.frame_rate.unwrap_or(0.0),
                        b.frame_rate.unwrap_or(0.0)
                    ));
                }
            }
            (None, None) => {}
            _ => mismatches.push("video stream present in only one file".to_string()),
        }

        match (self.audio(), other.audio()) {
            (Some(a), Some(b)) => {
                if a.codec != b.codec {
                    mismatches.push(format!("audio codec {} vs {}", a.codec, b.codec));
                }
                if a.sample_rate != b.sample_rate {
                    mismatches.push(format!(
                        "sample rate {} vs {}",
                        a.sample_rate.unwrap_or(0),
                        b.sample_rate.unwrap_or(0)
                    ));
                }
                if a.channels != b.channels {
                    mismatches.push(format!(
                        "channels {} vs {}",
                        a.channels.unwrap_or(0),
                        b.channels.unwrap_or(0)
                    ));
                }
            }
            (None, None) => {}
            _ => mismatches.push("audio stream present in only one file".to_string()),
        }

        mismatches
    }
}

/// Placeholder layout used when a stream reports no geometry or rate.
const FALLBACK_WIDTH: u32 = 1280;
const FALLBACK_HEIGHT: u32 = 720;
const FALLBACK_FRAME_RATE: f64 = 30.0;
const FALLBACK_SAMPLE_RATE: u32 = 44100;
const FALLBACK_CHANNELS: u32 = 2;

/// Stream layout a generated or re-encoded clip must reproduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamLayout {
    pub has_video: bool,
    pub has_audio: bool,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub sample_rate: u32,
    pub channels: u32,
}

impl StreamLayout {
    /// FFmpeg channel layout name for the channel count.
    pub fn channel_layout(&self) -> String {
        match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{}c", n),
        }
    }

    /// Frame rate formatted for filter arguments.
    pub fn frame_rate_arg(&self) -> String {
        let rounded = self.frame_rate.round();
        if (self.frame_rate - rounded).abs() < 1e-6 {
            format!("{}", rounded as u64)
        } else {
            format!("{:.3}", self.frame_rate)
        }
    }
}

impl MediaInfo {
    /// Layout of the first video and audio streams, with fallbacks for
    /// values ffprobe did not report.
    pub fn layout(&self) -> StreamLayout {
        let video = self.video();
        let audio = self.audio();
        StreamLayout {
            has_video: video.is_some(),
            has_audio: audio.is_some(),
            width: video.and_then(|v| v.width).unwrap_or(FALLBACK_WIDTH),
            height: video.and_then(|v| v.height).unwrap_or(FALLBACK_HEIGHT),
            frame_rate: video
                .and_then(|v| v.frame_rate)
                .unwrap_or(FALLBACK_FRAME_RATE),
            sample_rate: audio
                .and_then(|a| a.sample_rate)
                .unwrap_or(FALLBACK_SAMPLE_RATE),
            channels: audio.and_then(|a| a.channels).unwrap_or(FALLBACK_CHANNELS),
        }
    }
}

fn same_rate(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() < 0.01,
        (None, None) => true,
        _ => false,
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    duration: Option<String>,
}

/// Probe a media file for information.
pub async fn probe_media(runner: &FfmpegRunner, path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let mut args: Vec<OsString> = [
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_os_string());

    let output = runner.run_program(FFPROBE, args).await?;
    parse_probe_output(&output.stdout)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let streams: Vec<StreamInfo> = probe.streams.iter().map(convert_stream).collect();

    let format = probe.format.as_ref();
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref())
                .filter_map(|d| d.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::invalid_media("no duration reported by ffprobe"))?;

    let size = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let bitrate = format
        .and_then(|f| f.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaInfo {
        duration,
        streams,
        size,
        bitrate,
    })
}

fn convert_stream(stream: &FfprobeStream) -> StreamInfo {
    let kind = match stream.codec_type.as_deref() {
        Some("video") => StreamKind::Video,
        Some("audio") => StreamKind::Audio,
        _ => StreamKind::Other,
    };

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    StreamInfo {
        kind,
        codec: stream.codec_name.clone().unwrap_or_default(),
        width: stream.width,
        height: stream.height,
        frame_rate,
        sample_rate: stream.sample_rate.as_deref().and_then(|r| r.parse().ok()),
        channels: stream.channels,
        channel_layout: stream.channel_layout.clone(),
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|r: &f64| *r > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
             "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000",
             "channels": 2, "channel_layout": "stereo"}
        ],
        "format": {"duration": "150.016000", "size": "1048576", "bit_rate": "5000000"}
    }"#;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert!((info.duration - 150.016).abs() < 1e-6);
        assert_eq!(info.size, 1_048_576);

        let video = info.video().unwrap();
        assert_eq!(video.codec, "h264");
        assert_eq!(video.width, Some(1920));
        assert!((video.frame_rate.unwrap() - 29.97).abs() < 0.01);

        let audio = info.audio().unwrap();
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.channels, Some(2));
        assert_eq!(audio.channel_layout.as_deref(), Some("stereo"));
    }

    #[test]
    fn test_duration_falls_back_to_streams() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "aac", "duration": "12.5"}],
                       "format": {}}"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!(info.duration, 12.5);
        assert!(!info.has_video());
    }

    #[test]
    fn test_missing_duration_is_invalid() {
        let json = r#"{"streams": [], "format": {}}"#;
        let err = parse_probe_output(json.as_bytes()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
    }

    #[test]
    fn test_concat_mismatches() {
        let a = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        let mut b = a.clone();
        assert!(a.concat_mismatches(&b).is_empty());

        b.streams[1].sample_rate = Some(44100);
        let mismatches = a.concat_mismatches(&b);
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("sample rate"));
    }

    #[test]
    fn test_layout_uses_probed_values() {
        let layout = parse_probe_output(SAMPLE.as_bytes()).unwrap().layout();
        assert!(layout.has_video && layout.has_audio);
        assert_eq!((layout.width, layout.height), (1920, 1080));
        assert_eq!(layout.sample_rate, 48000);
        assert_eq!(layout.channel_layout(), "stereo");
        assert_eq!(layout.frame_rate_arg(), "29.970");
    }

    #[test]
    fn test_layout_fallbacks_for_audio_only() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3", "channels": 1}],
                       "format": {"duration": "3.0"}}"#;
        let layout = parse_probe_output(json.as_bytes()).unwrap().layout();
        assert!(!layout.has_video);
        assert_eq!(layout.sample_rate, 44100);
        assert_eq!(layout.channel_layout(), "mono");
        assert_eq!(layout.frame_rate_arg(), "30");
    }
}
