//! FFmpeg command builder and runner.
//!
//! Commands are always built as argument vectors and spawned directly, never
//! through a shell, so paths need no quoting.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{MediaError, MediaResult};
use crate::metrics;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Lines of stderr kept on tool failures.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
struct FfmpegInput {
    /// Arguments placed before this input's `-i`
    args: Vec<OsString>,
    source: OsString,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: OsString,
    /// Output arguments (after all inputs)
    output_args: Vec<OsString>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a command with a single file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::without_input(output).add_input(input)
    }

    /// Create a command whose inputs are added later.
    pub fn without_input(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().as_os_str().to_os_string(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a file input.
    pub fn add_input(self, input: impl AsRef<Path>) -> Self {
        self.add_input_with(Vec::<OsString>::new(), input.as_ref().as_os_str())
    }

    /// Add an input preceded by input-specific arguments.
    pub fn add_input_with<I, S>(mut self, args: I, source: impl AsRef<OsStr>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            source: source.as_ref().to_os_string(),
        });
        self
    }

    /// Add a libavfilter source graph as an input (e.g. `anullsrc`).
    pub fn lavfi_input(self, graph: impl Into<String>) -> Self {
        let graph: String = graph.into();
        self.add_input_with(["-f", "lavfi"], graph)
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl AsRef<OsStr>) -> Self {
        self.output_arg("-af").output_arg(filter.as_ref())
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl AsRef<OsStr>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter.as_ref())
    }

    /// Read the filter complex from a script file.
    pub fn filter_complex_script(self, path: impl AsRef<Path>) -> Self {
        self.output_arg("-filter_complex_script")
            .output_arg(path.as_ref().as_os_str())
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, stream: impl AsRef<OsStr>) -> Self {
        self.output_arg("-map").output_arg(stream.as_ref())
    }

    /// Copy all selected streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Force the output container format.
    pub fn format(self, format: impl AsRef<OsStr>) -> Self {
        self.output_arg("-f").output_arg(format.as_ref())
    }

    /// Drop video streams from the output.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if self.overwrite {
            args.push("-y".into());
        }

        args.push("-hide_banner".into());
        args.push("-nostats".into());

        args.push("-v".into());
        args.push(self.log_level.clone().into());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".into());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// Captured output of a finished tool process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Runner for FFmpeg/FFprobe with cancellation and timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel: Option<CancelToken>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set per-invocation timeout.
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<ToolOutput> {
        self.run_program(FFMPEG, cmd.build_args()).await
    }

    /// Run any tool with an argument vector, capturing stdout and stderr.
    pub async fn run_program(&self, program: &str, args: Vec<OsString>) -> MediaResult<ToolOutput> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(MediaError::Cancelled);
        }

        debug!(
            "Running {} {}",
            program,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let started = Instant::now();
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::tool_unavailable(program),
                _ => MediaError::Io(e),
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        // Drain both pipes concurrently so a chatty stderr cannot block the child
        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });
        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = self.wait_for_completion(program, &mut child).await;

        let stdout = join_pipe(stdout_handle).await?;
        let stderr = String::from_utf8_lossy(&join_pipe(stderr_handle).await?).into_owned();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                metrics::record_tool_invocation(program, started.elapsed().as_secs_f64(), false);
                return Err(e);
            }
        };

        metrics::record_tool_invocation(program, started.elapsed().as_secs_f64(), status.success());

        if status.success() {
            Ok(ToolOutput { stdout, stderr })
        } else {
            Err(MediaError::tool_failed(
                program,
                format!("exited with {}", status),
                Some(stderr_tail(&stderr, STDERR_TAIL_LINES)),
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, program: &str, child: &mut Child) -> MediaResult<ExitStatus> {
        let cancel = self.cancel.clone();
        let cancelled = async move {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let timeout_secs = self.timeout_secs;
        let timed_out = async move {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancelled => {
                info!("{} cancelled, killing process", program);
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = timed_out => {
                let secs = timeout_secs.unwrap_or_default();
                warn!("{} timed out after {} seconds, killing process", program, secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        }
    }
}

async fn join_pipe(
    handle: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> MediaResult<Vec<u8>> {
    handle
        .await
        .map_err(|e| MediaError::internal(format!("pipe reader panicked: {}", e)))?
        .map_err(MediaError::from)
}

/// Last `lines` lines of tool stderr.
pub fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which(FFMPEG).map_err(|_| MediaError::tool_unavailable(FFMPEG))
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which(FFPROBE).map_err(|_| MediaError::tool_unavailable(FFPROBE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_as_strings(cmd: &FfmpegCommand) -> Vec<String> {
        cmd.build_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .duration(30.0)
            .stream_copy();

        let args = args_as_strings(&cmd);
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.contains(&"-t".to_string()));
        assert!(args.contains(&"30.000".to_string()));
        assert!(args.contains(&"copy".to_string()));
        assert!(args.contains(&"-nostats".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_paths_are_single_arguments() {
        let cmd = FfmpegCommand::new("my video; rm -rf ~.mp4", "out 'quoted'.mp4");
        let args = args_as_strings(&cmd);

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_pos + 1], "my video; rm -rf ~.mp4");
        assert_eq!(args.last().unwrap(), "out 'quoted'.mp4");
    }

    #[test]
    fn test_multiple_inputs_keep_their_args() {
        let cmd = FfmpegCommand::without_input("out.mp4")
            .lavfi_input("anullsrc=channel_layout=stereo:sample_rate=48000")
            .add_input("b.mp4");
        let args = args_as_strings(&cmd);

        let first_i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(&args[first_i - 2..first_i], ["-f", "lavfi"]);
        let second_i = args.iter().rposition(|a| a == "-i").unwrap();
        assert_eq!(args[second_i + 1], "b.mp4");
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = "a\nb\nc\nd";
        assert_eq!(stderr_tail(stderr, 2), "c\nd");
        assert_eq!(stderr_tail(stderr, 10), "a\nb\nc\nd");
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let runner = FfmpegRunner::new();
        let err = runner
            .run_program("hushcut-definitely-not-a-tool", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_runner_refuses_to_start() {
        let (handle, token) = crate::cancel::cancel_pair();
        handle.cancel();
        let runner = FfmpegRunner::new().with_cancel(token);
        let err = runner.run_program(FFMPEG, vec![]).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_running_child() {
        let (handle, token) = crate::cancel::cancel_pair();
        let runner = FfmpegRunner::new().with_cancel(token);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let err = runner
            .run_program("sleep", vec!["30".into()])
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
        canceller.await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_running_child() {
        let runner = FfmpegRunner::new().with_timeout(Some(1));

        let started = Instant::now();
        let err = runner
            .run_program("sleep", vec!["30".into()])
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Timeout(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
